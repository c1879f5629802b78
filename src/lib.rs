//! tdl-2048: a 2048 engine and an n-tuple network trained by TD(0)
//!
//! This crate provides:
//! - A packed `Board` with table-driven slides and the eight board symmetries (`engine`)
//! - `Action`s with their packed and text encodings (`action`)
//! - Pattern features, weight tables and the weight file format (`ntuple`)
//! - Agents: a random tile placer, a greedy slider and the TD learner (`agent`)
//! - Episodes, their log format and running statistics (`episode`, `statistic`)
//! - Parallel self-play feeding a single learner (`selfplay`)
//!
//! Quick start:
//! ```
//! use tdl_2048::agent::{RandomPlacer, TdAgent};
//! use tdl_2048::episode::play_episode;
//!
//! let mut play = TdAgent::new("alpha=0.1 iso=8 patterns=0123,4567 budget=1048576").unwrap();
//! let mut evil = RandomPlacer::new("seed=42").unwrap();
//!
//! // The agent trains on its own trajectory when the episode closes.
//! let ep = play_episode(&mut play, &mut evil);
//! assert!(ep.state().is_game_over());
//! assert!(ep.score() > 0);
//! ```
//!
pub mod action;
pub mod agent;
pub mod config;
pub mod engine;
pub mod episode;
pub mod ntuple;
pub mod selfplay;
pub mod statistic;
