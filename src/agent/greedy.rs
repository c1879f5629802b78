use crate::action::Action;
use crate::config::{AgentConfig, ConfigError};
use crate::engine::{Board, Direction};

use super::{Agent, Profile};

/// Player that takes the slide with the largest immediate merge reward.
///
/// Ties go to the first direction in `Up, Right, Down, Left` order.
#[derive(Debug, Clone)]
pub struct GreedySlider {
    profile: Profile,
}

impl GreedySlider {
    pub fn new(args: &str) -> Result<Self, ConfigError> {
        let config = AgentConfig::with_defaults("name=greedy role=play", args);
        Ok(Self { profile: Profile::new(config)? })
    }
}

impl Agent for GreedySlider {
    fn name(&self) -> &str { self.profile.name() }

    fn role(&self) -> &str { self.profile.role() }

    fn take_action(&mut self, board: &Board) -> Option<Action> {
        let mut best: Option<(Direction, u32)> = None;
        for dir in Direction::ALL {
            let (after, reward) = board.shift(dir);
            if after == *board {
                continue;
            }
            if best.map_or(true, |(_, r)| reward > r) {
                best = Some((dir, reward));
            }
        }
        best.map(|(dir, _)| Action::slide(dir))
    }

    fn check_for_win(&self, board: &Board) -> bool { self.profile.reached_win(board) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(rows: [[u8; 4]; 4]) -> Board {
        let mut ranks = [0u8; 16];
        for (r, row) in rows.iter().enumerate() {
            ranks[4 * r..4 * r + 4].copy_from_slice(row);
        }
        Board::from_ranks(ranks)
    }

    #[test]
    fn picks_the_largest_merge() {
        // Vertical 8+8 beats horizontal 2+2.
        let b = board([[1, 1, 0, 0], [0, 0, 0, 3], [0, 0, 0, 3], [0, 0, 0, 0]]);
        let mut play = GreedySlider::new("").unwrap();
        assert_eq!(play.take_action(&b), Some(Action::slide(Direction::Up)));
    }

    #[test]
    fn skips_illegal_directions() {
        // Only Right and Down move anything; neither merges, Right comes first.
        let b = board([[1, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]]);
        let mut play = GreedySlider::new("").unwrap();
        assert_eq!(play.take_action(&b), Some(Action::slide(Direction::Right)));
    }

    #[test]
    fn no_action_when_stuck() {
        let b = board([[1, 2, 1, 2], [2, 1, 2, 1], [1, 2, 1, 2], [2, 1, 2, 1]]);
        let mut play = GreedySlider::new("name=p").unwrap();
        assert_eq!(play.take_action(&b), None);
        assert_eq!(play.name(), "p");
    }

    #[test]
    fn win_check_uses_configured_rank() {
        let play = GreedySlider::new("win=11").unwrap();
        assert!(!play.check_for_win(&board([[10, 0, 0, 0], [0; 4], [0; 4], [0; 4]])));
        assert!(play.check_for_win(&board([[11, 0, 0, 0], [0; 4], [0; 4], [0; 4]])));
    }
}
