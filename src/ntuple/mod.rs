//! N-tuple network: pattern features over the board, their weight tables,
//! and the binary format they are saved in.
//!
//! Quick start
//! ```
//! use tdl_2048::engine::Board;
//! use tdl_2048::ntuple::{Network, WeightBudget};
//!
//! let mut net = Network::new(WeightBudget::default());
//! net.add_pattern(&[0, 1, 2, 3], 8).unwrap();
//! net.add_pattern(&[4, 5, 6, 7], 8).unwrap();
//!
//! let b = Board::IDENTITY;
//! let v = net.update(&b, 1.0);
//! assert_eq!(v, 2.0); // every pattern moved by the full delta
//! assert_eq!(net.estimate(&b), v);
//! ```

mod network;
mod pattern;
mod weight;

pub use network::Network;
pub use pattern::{index_of, isomorphisms, Pattern, PatternError, ISOMORPHISMS, MAX_TUPLE};
pub use weight::{read_name, read_record, write_name, WeightBudget, WeightError, WeightTable, DEFAULT_BUDGET_BYTES};

/// The four 6-tuples of Yeh et al., a common starting point for 2048.
pub const DEFAULT_PATTERNS: [[usize; 6]; 4] = [
    [0, 1, 2, 3, 4, 5],
    [4, 5, 6, 7, 8, 9],
    [0, 1, 2, 4, 5, 6],
    [4, 5, 6, 8, 9, 10],
];

#[derive(thiserror::Error, Debug)]
pub enum NtupleError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Weight(#[from] WeightError),
}
