//! Dense f32 weight tables, the allocation budget they are drawn from, and
//! their binary record format.
//!
//! Binary layout (little-endian):
//! - Table record: `element_count: u64`, then `element_count` × `f32`
//! - Feature record: `name_len: i32`, `name_len` bytes of UTF-8 name, then a table record
//!
//! A weight file is a plain concatenation of feature records.

use std::io::{self, Read, Write};
use std::ops::{Index, IndexMut};

/// Default ceiling for all weight tables drawn from one budget (1 GiB).
pub const DEFAULT_BUDGET_BYTES: usize = 1 << 30;

const FLOAT_BYTES: usize = std::mem::size_of::<f32>();
const MAX_NAME_LEN: i32 = 4096;

#[derive(thiserror::Error, Debug)]
pub enum WeightError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("memory limit exceeded: {requested} floats requested with {allocated} of {limit} already allocated")]
    BudgetExceeded { requested: usize, allocated: usize, limit: usize },
    #[error("unexpected weight: {found} ({expected} is expected)")]
    NameMismatch { found: String, expected: String },
    #[error("unexpected size {found} for {name} ({expected} is expected)")]
    SizeMismatch { name: String, found: u64, expected: u64 },
    #[error("malformed record: {0}")]
    Malformed(&'static str),
}

/// Running total of floats handed out to weight tables, checked against a ceiling.
///
/// The total is cumulative: it models a bounded-memory deployment where every
/// table allocated over the process lifetime counts, including reloads.
///
/// ```
/// use tdl_2048::ntuple::WeightBudget;
/// let mut budget = WeightBudget::new(64 * 4);
/// assert!(budget.allocate(48).is_ok());
/// assert!(budget.allocate(32).is_err());
/// assert_eq!(budget.allocated(), 48);
/// ```
#[derive(Debug, Clone)]
pub struct WeightBudget {
    limit: usize,
    total: usize,
}

impl Default for WeightBudget {
    fn default() -> Self { Self::new(DEFAULT_BUDGET_BYTES) }
}

impl WeightBudget {
    /// A budget of `limit_bytes` bytes of f32 weights.
    pub fn new(limit_bytes: usize) -> Self {
        Self { limit: limit_bytes / FLOAT_BYTES, total: 0 }
    }

    /// Ceiling in floats.
    #[inline]
    pub fn limit(&self) -> usize { self.limit }

    /// Floats allocated so far.
    #[inline]
    pub fn allocated(&self) -> usize { self.total }

    /// Allocate a zero-filled table of `len` floats, or fail once the ceiling would be exceeded.
    pub fn allocate(&mut self, len: usize) -> Result<WeightTable, WeightError> {
        let total = self
            .total
            .checked_add(len)
            .filter(|&t| t <= self.limit)
            .ok_or(WeightError::BudgetExceeded { requested: len, allocated: self.total, limit: self.limit })?;
        self.total = total;
        log::debug!("allocated weight table of {len} floats ({total}/{} in use)", self.limit);
        Ok(WeightTable { values: vec![0.0f32; len].into_boxed_slice() })
    }
}

/// A dense weight array. Only obtainable through [`WeightBudget::allocate`].
#[derive(Debug, PartialEq)]
pub struct WeightTable {
    values: Box<[f32]>,
}

impl WeightTable {
    #[inline]
    pub fn len(&self) -> usize { self.values.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    #[inline]
    pub fn as_slice(&self) -> &[f32] { &self.values }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] { &mut self.values }

    /// Write this table as a table record.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), WeightError> {
        out.write_all(&(self.values.len() as u64).to_le_bytes())?;
        write_floats(out, &self.values)?;
        Ok(())
    }

    /// Read a table record, allocating from `budget` with the stored element count.
    pub fn read_from<R: Read>(input: &mut R, budget: &mut WeightBudget) -> Result<WeightTable, WeightError> {
        let count = read_u64(input)?;
        let len = usize::try_from(count).map_err(|_| WeightError::Malformed("element count overflows usize"))?;
        let mut table = budget.allocate(len)?;
        read_floats(input, &mut table.values)?;
        Ok(table)
    }

    /// Read a table record into this table, which must already have the stored size.
    pub(crate) fn read_into<R: Read>(&mut self, input: &mut R, name: &str) -> Result<(), WeightError> {
        let count = read_u64(input)?;
        if count != self.values.len() as u64 {
            return Err(WeightError::SizeMismatch {
                name: name.to_string(),
                found: count,
                expected: self.values.len() as u64,
            });
        }
        read_floats(input, &mut self.values)?;
        Ok(())
    }
}

impl Index<usize> for WeightTable {
    type Output = f32;
    #[inline]
    fn index(&self, i: usize) -> &f32 { &self.values[i] }
}

impl IndexMut<usize> for WeightTable {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut f32 { &mut self.values[i] }
}

/// Write a length-prefixed feature name.
pub fn write_name<W: Write>(out: &mut W, name: &str) -> Result<(), WeightError> {
    let len = i32::try_from(name.len()).map_err(|_| WeightError::Malformed("name too long"))?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(name.as_bytes())?;
    Ok(())
}

/// Read a length-prefixed feature name.
pub fn read_name<R: Read>(input: &mut R) -> Result<String, WeightError> {
    let mut len_bytes = [0u8; 4];
    input.read_exact(&mut len_bytes)?;
    decode_name(input, i32::from_le_bytes(len_bytes))
}

/// Read one feature record from a weight file, or `None` at a clean end of file.
///
/// The stored element count is trusted and allocated from `budget`.
pub fn read_record<R: Read>(input: &mut R, budget: &mut WeightBudget) -> Result<Option<(String, WeightTable)>, WeightError> {
    let mut len_bytes = [0u8; 4];
    let mut filled = 0;
    while filled < len_bytes.len() {
        match input.read(&mut len_bytes[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(WeightError::Malformed("truncated name length")),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    let name = decode_name(input, i32::from_le_bytes(len_bytes))?;
    let table = WeightTable::read_from(input, budget)?;
    Ok(Some((name, table)))
}

fn decode_name<R: Read>(input: &mut R, len: i32) -> Result<String, WeightError> {
    if !(0..=MAX_NAME_LEN).contains(&len) {
        return Err(WeightError::Malformed("name length out of range"));
    }
    let mut name = vec![0u8; len as usize];
    input.read_exact(&mut name)?;
    String::from_utf8(name).map_err(|_| WeightError::Malformed("name is not utf-8"))
}

#[inline]
fn read_u64<R: Read>(input: &mut R) -> io::Result<u64> {
    let mut bytes = [0u8; 8];
    input.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

fn write_floats<W: Write>(out: &mut W, values: &[f32]) -> io::Result<()> {
    if cfg!(target_endian = "little") {
        out.write_all(bytemuck::cast_slice(values))
    } else {
        let mut buf = Vec::with_capacity(values.len() * FLOAT_BYTES);
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        out.write_all(&buf)
    }
}

fn read_floats<R: Read>(input: &mut R, values: &mut [f32]) -> io::Result<()> {
    input.read_exact(bytemuck::cast_slice_mut(values))?;
    if cfg!(target_endian = "big") {
        for v in values.iter_mut() {
            *v = f32::from_bits(u32::from_le(v.to_bits()));
        }
    }
    Ok(())
}
