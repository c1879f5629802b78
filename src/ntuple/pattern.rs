use std::fmt::Write as _;
use std::io::{Read, Write};

use crate::engine::Board;

use super::weight::{self, WeightBudget, WeightError, WeightTable};

/// Longest supported tuple. A 7-tuple already needs 2^28 weights (1 GiB).
pub const MAX_TUPLE: usize = 7;

/// Number of board symmetries (4 rotations × optional reflection).
pub const ISOMORPHISMS: usize = 8;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("no pattern defined")]
    Empty,
    #[error("{0}-tuple exceeds the supported maximum of {max}", max = MAX_TUPLE)]
    TooLong(usize),
    #[error("cell position {0} is off the board")]
    PositionOutOfRange(usize),
    #[error("isomorphism count {0} not in 1..=8")]
    Isomorphism(usize),
}

/// Cell positions of `positions` under each of the 8 board symmetries.
///
/// Order is fixed: rotations 0..3 clockwise, then the same four rotations
/// applied after a horizontal reflection. Entry `i` lists, for each pattern
/// cell, which cell of the untransformed board lands there after symmetry `i`;
/// reading those cells from a board equals reading `positions` from the
/// transformed board.
///
/// ```
/// use tdl_2048::ntuple::isomorphisms;
/// let iso = isomorphisms(&[0, 1, 2, 3]);
/// assert_eq!(iso[0], vec![0, 1, 2, 3]);
/// assert_eq!(iso[1], vec![12, 8, 4, 0]);
/// ```
pub fn isomorphisms(positions: &[usize]) -> [Vec<usize>; ISOMORPHISMS] {
    std::array::from_fn(|i| {
        let mut idx = Board::IDENTITY;
        if i >= 4 {
            idx.mirror();
        }
        idx.rotate(i as i32);
        positions.iter().map(|&p| idx.at(p) as usize).collect()
    })
}

/// Pack the ranks at `positions` into an index, position `i` filling bits `[4i, 4i + 4)`.
#[inline]
pub fn index_of(positions: &[usize], board: &Board) -> usize {
    positions
        .iter()
        .enumerate()
        .fold(0, |index, (i, &p)| index | ((board.at(p) as usize) << (4 * i)))
}

/// An n-tuple feature with symmetric weight sharing.
///
/// Owns one weight table of `16^K` entries; every active isomorphism indexes
/// into that same table.
#[derive(Debug)]
pub struct Pattern {
    isomorphic: [Vec<usize>; ISOMORPHISMS],
    iso_last: usize,
    weights: WeightTable,
}

impl Pattern {
    /// Build a pattern over `positions` using the first `iso` isomorphisms,
    /// allocating its table from `budget`.
    pub fn new(positions: &[usize], iso: usize, budget: &mut WeightBudget) -> Result<Self, super::NtupleError> {
        validate(positions, iso)?;
        let weights = budget.allocate(1 << (4 * positions.len()))?;
        Ok(Self { isomorphic: isomorphisms(positions), iso_last: iso, weights })
    }

    /// The untransformed cell positions.
    #[inline]
    pub fn positions(&self) -> &[usize] { &self.isomorphic[0] }

    /// All 8 isomorphic position lists, in generation order.
    #[inline]
    pub fn isomorphic(&self) -> &[Vec<usize>; ISOMORPHISMS] { &self.isomorphic }

    #[inline]
    pub fn isomorphism(&self) -> usize { self.iso_last }

    /// Set how many of the 8 isomorphisms are used.
    /// 1: none, 4: rotations, 8: rotations and reflections.
    pub fn set_isomorphism(&mut self, iso: usize) -> Result<(), PatternError> {
        if !(1..=ISOMORPHISMS).contains(&iso) {
            return Err(PatternError::Isomorphism(iso));
        }
        self.iso_last = iso;
        Ok(())
    }

    #[inline]
    pub fn weights(&self) -> &WeightTable { &self.weights }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut WeightTable { &mut self.weights }

    /// Sum of the weights selected by each active isomorphism.
    pub fn estimate(&self, board: &Board) -> f32 {
        self.isomorphic[..self.iso_last]
            .iter()
            .map(|iso| self.weights[index_of(iso, board)])
            .sum()
    }

    /// Spread `delta` evenly over the active isomorphic entries and return the
    /// updated estimate.
    pub fn update(&mut self, board: &Board, delta: f32) -> f32 {
        let split = delta / self.iso_last as f32;
        for iso in &self.isomorphic[..self.iso_last] {
            self.weights[index_of(iso, board)] += split;
        }
        self.estimate(board)
    }

    /// e.g. `"4-tuple pattern 0123"`.
    pub fn name(&self) -> String {
        format!("{}-tuple pattern {}", self.isomorphic[0].len(), hex_positions(&self.isomorphic[0]))
    }

    /// One line per active isomorphism: positions, packed ranks and weight.
    pub fn dump(&self, board: &Board) -> String {
        let mut out = String::new();
        for (i, iso) in self.isomorphic[..self.iso_last].iter().enumerate() {
            let index = index_of(iso, board);
            let ranks: String = (0..iso.len()).map(|t| format!("{:x}", (index >> (4 * t)) & 0xf)).collect();
            let _ = writeln!(out, "#{i}:{}({ranks}) = {}", hex_positions(iso), self.weights[index]);
        }
        out
    }

    /// Write this pattern as a named feature record.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), WeightError> {
        weight::write_name(out, &self.name())?;
        self.weights.write_to(out)
    }

    /// Read a feature record into this pattern. The stored name and element
    /// count must match this pattern exactly.
    pub fn read_from<R: Read>(&mut self, input: &mut R) -> Result<(), WeightError> {
        let expected = self.name();
        let found = weight::read_name(input)?;
        if found != expected {
            return Err(WeightError::NameMismatch { found, expected });
        }
        self.weights.read_into(input, &expected)
    }
}

fn validate(positions: &[usize], iso: usize) -> Result<(), PatternError> {
    if positions.is_empty() {
        return Err(PatternError::Empty);
    }
    if positions.len() > MAX_TUPLE {
        return Err(PatternError::TooLong(positions.len()));
    }
    if let Some(&p) = positions.iter().find(|&&p| p >= 16) {
        return Err(PatternError::PositionOutOfRange(p));
    }
    if !(1..=ISOMORPHISMS).contains(&iso) {
        return Err(PatternError::Isomorphism(iso));
    }
    Ok(())
}

fn hex_positions(positions: &[usize]) -> String {
    positions.iter().map(|p| format!("{p:x}")).collect()
}
