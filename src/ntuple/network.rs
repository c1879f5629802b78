use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::engine::Board;

use super::pattern::{Pattern, PatternError};
use super::weight::{WeightBudget, WeightError};
use super::NtupleError;

/// A set of pattern features whose estimates are summed.
///
/// The network owns the [`WeightBudget`] every pattern table is drawn from.
#[derive(Debug)]
pub struct Network {
    budget: WeightBudget,
    patterns: Vec<Pattern>,
}

impl Network {
    pub fn new(budget: WeightBudget) -> Self {
        Self { budget, patterns: Vec::new() }
    }

    /// Build a network from a list of position sets sharing one isomorphism count.
    pub fn with_patterns<P: AsRef<[usize]>>(budget: WeightBudget, patterns: &[P], iso: usize) -> Result<Self, NtupleError> {
        let mut net = Self::new(budget);
        for p in patterns {
            net.add_pattern(p.as_ref(), iso)?;
        }
        Ok(net)
    }

    pub fn add_pattern(&mut self, positions: &[usize], iso: usize) -> Result<&mut Pattern, NtupleError> {
        let pattern = Pattern::new(positions, iso, &mut self.budget)?;
        log::debug!("added {} ({} weights, iso {iso})", pattern.name(), pattern.weights().len());
        self.patterns.push(pattern);
        let last = self.patterns.len() - 1;
        Ok(&mut self.patterns[last])
    }

    #[inline]
    pub fn patterns(&self) -> &[Pattern] { &self.patterns }

    #[inline]
    pub fn patterns_mut(&mut self) -> &mut [Pattern] { &mut self.patterns }

    #[inline]
    pub fn len(&self) -> usize { self.patterns.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.patterns.is_empty() }

    #[inline]
    pub fn budget(&self) -> &WeightBudget { &self.budget }

    pub fn set_isomorphism(&mut self, iso: usize) -> Result<(), PatternError> {
        self.patterns.iter_mut().try_for_each(|p| p.set_isomorphism(iso))
    }

    /// Sum of every pattern's estimate.
    pub fn estimate(&self, board: &Board) -> f32 {
        self.patterns.iter().map(|p| p.estimate(board)).sum()
    }

    /// Apply `delta` to every pattern and return the sum of their updated estimates.
    pub fn update(&mut self, board: &Board, delta: f32) -> f32 {
        self.patterns.iter_mut().map(|p| p.update(board, delta)).sum()
    }

    /// Write every pattern as a feature record, in order.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), WeightError> {
        self.patterns.iter().try_for_each(|p| p.write_to(out))
    }

    /// Read one feature record per pattern, in order.
    pub fn read_from<R: Read>(&mut self, input: &mut R) -> Result<(), WeightError> {
        self.patterns.iter_mut().try_for_each(|p| p.read_from(input))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), WeightError> {
        let path = path.as_ref();
        let mut out = BufWriter::new(fs::File::create(path)?);
        self.write_to(&mut out)?;
        out.flush()?;
        log::info!("saved {} feature(s) to {}", self.patterns.len(), path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), WeightError> {
        let path = path.as_ref();
        let mut input = BufReader::new(fs::File::open(path)?);
        self.read_from(&mut input)?;
        log::info!("loaded {} feature(s) from {}", self.patterns.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn small_net() -> Network {
        Network::with_patterns(WeightBudget::default(), &[vec![0, 1, 2, 3], vec![0, 1, 4, 5]], 8).unwrap()
    }

    #[test]
    fn estimate_sums_patterns_and_update_returns_sum() {
        let mut net = small_net();
        let b = Board::IDENTITY;
        assert_eq!(net.estimate(&b), 0.0);
        let v = net.update(&b, 0.5);
        assert_eq!(v, 1.0);
        assert_eq!(net.estimate(&b), 1.0);
        assert_eq!(net.patterns()[0].estimate(&b), 0.5);
    }

    #[test]
    fn save_then_load_reproduces_weights() {
        let mut net = small_net();
        net.update(&Board::IDENTITY, 3.0);
        net.update(&Board::IDENTITY.rotated(1), -1.0);
        let tmp = NamedTempFile::new().unwrap();
        net.save(tmp.path()).unwrap();

        let mut loaded = small_net();
        loaded.load(tmp.path()).unwrap();
        for (a, b) in net.patterns().iter().zip(loaded.patterns()) {
            assert_eq!(a.weights(), b.weights());
        }
        assert_eq!(loaded.estimate(&Board::IDENTITY), net.estimate(&Board::IDENTITY));
    }

    #[test]
    fn load_with_different_pattern_order_fails() {
        let net = small_net();
        let mut bytes = Vec::new();
        net.write_to(&mut bytes).unwrap();
        let mut swapped =
            Network::with_patterns(WeightBudget::default(), &[vec![0, 1, 4, 5], vec![0, 1, 2, 3]], 8).unwrap();
        assert!(matches!(
            swapped.read_from(&mut bytes.as_slice()),
            Err(WeightError::NameMismatch { .. })
        ));
    }

    #[test]
    fn load_of_truncated_file_fails() {
        let net = small_net();
        let mut bytes = Vec::new();
        net.write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() / 2);
        let mut fresh = small_net();
        assert!(matches!(fresh.read_from(&mut bytes.as_slice()), Err(WeightError::Io(_))));
    }

    #[test]
    fn patterns_share_the_network_budget() {
        let mut net = Network::new(WeightBudget::new(4 * 256));
        net.add_pattern(&[0, 1], 8).unwrap();
        assert_eq!(net.budget().allocated(), 256);
        assert!(net.add_pattern(&[2], 8).is_err());
        assert_eq!(net.len(), 1);
    }

    #[test]
    fn isomorphism_applies_to_every_pattern() {
        let mut net = small_net();
        net.set_isomorphism(4).unwrap();
        assert!(net.patterns().iter().all(|p| p.isomorphism() == 4));
        assert!(net.set_isomorphism(9).is_err());
    }
}
