//! Players and environments.
//!
//! Every participant in an episode implements [`Agent`]: the player slides
//! (`role=play`), the environment places tiles (`role=evil`).

mod greedy;
mod random;
mod td;

use crate::action::Action;
use crate::config::{AgentConfig, ConfigError};
use crate::engine::Board;
use crate::ntuple::{NtupleError, WeightError};

pub use greedy::GreedySlider;
pub use random::RandomPlacer;
pub use td::{select_afterstate, train_episode, Step, TdAgent, TdPolicy};

#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("n-tuple network: {0}")]
    Ntuple(#[from] NtupleError),
    #[error("weights: {0}")]
    Weights(#[from] WeightError),
}

pub trait Agent {
    fn name(&self) -> &str;

    fn role(&self) -> &str;

    fn open_episode(&mut self, _flag: &str) {}

    fn close_episode(&mut self, _flag: &str) {}

    /// Choose the next action, or `None` when nothing can be done.
    fn take_action(&mut self, board: &Board) -> Option<Action>;

    fn check_for_win(&self, _board: &Board) -> bool { false }

    /// Flush anything that must outlive the run, e.g. learned weights.
    fn finalize(&mut self) -> Result<(), AgentError> { Ok(()) }
}

/// Name, role and optional win rank shared by the concrete agents.
#[derive(Debug, Clone)]
pub(crate) struct Profile {
    config: AgentConfig,
    win: Option<u8>,
}

impl Profile {
    pub(crate) fn new(config: AgentConfig) -> Result<Self, ConfigError> {
        let win = config.win_rank()?;
        Ok(Self { config, win })
    }

    pub(crate) fn name(&self) -> &str { self.config.name() }

    pub(crate) fn role(&self) -> &str { self.config.role() }

    pub(crate) fn config(&self) -> &AgentConfig { &self.config }

    pub(crate) fn reached_win(&self, board: &Board) -> bool {
        self.win.is_some_and(|rank| board.max_rank() >= rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_reads_name_role_and_win() {
        let p = Profile::new(AgentConfig::with_defaults("name=x role=play", "win=3")).unwrap();
        assert_eq!(p.name(), "x");
        assert_eq!(p.role(), "play");
        let mut ranks = [0u8; 16];
        ranks[5] = 2;
        assert!(!p.reached_win(&Board::from_ranks(ranks)));
        ranks[5] = 3;
        assert!(p.reached_win(&Board::from_ranks(ranks)));
    }

    #[test]
    fn profile_without_win_never_wins() {
        let p = Profile::new("name=x".parse().unwrap()).unwrap();
        assert!(!p.reached_win(&Board::IDENTITY));
    }
}
