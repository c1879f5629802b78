use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::action::Action;
use crate::config::{AgentConfig, ConfigError};
use crate::engine::Board;

use super::{Agent, Profile};

/// Environment that drops a 2-tile (90%) or a 4-tile (10%) on a random empty cell.
///
/// Configure with `seed=N` for reproducible games.
#[derive(Debug, Clone)]
pub struct RandomPlacer {
    profile: Profile,
    rng: StdRng,
}

impl RandomPlacer {
    pub fn new(args: &str) -> Result<Self, ConfigError> {
        let config = AgentConfig::with_defaults("name=random role=evil", args);
        let rng = match config.seed()? {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { profile: Profile::new(config)?, rng })
    }
}

impl Agent for RandomPlacer {
    fn name(&self) -> &str { self.profile.name() }

    fn role(&self) -> &str { self.profile.role() }

    fn take_action(&mut self, board: &Board) -> Option<Action> {
        let empty = board.empty_cells();
        let &position = empty.choose(&mut self.rng)?;
        let tile = if self.rng.gen_range(0..10) < 9 { 1 } else { 2 };
        Action::place(position as u8, tile).ok()
    }

    fn check_for_win(&self, board: &Board) -> bool { self.profile.reached_win(board) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn places_only_on_empty_cells() {
        let mut evil = RandomPlacer::new("seed=7").unwrap();
        let mut board = Board::EMPTY;
        for _ in 0..16 {
            let action = evil.take_action(&board).unwrap();
            assert_eq!(action.apply(&mut board), 0);
        }
        assert_eq!(board.count_empty(), 0);
        assert_eq!(evil.take_action(&board), None);
    }

    #[test]
    fn tiles_are_mostly_twos() {
        let mut evil = RandomPlacer::new("seed=1").unwrap();
        let mut twos = 0;
        for _ in 0..10_000 {
            match evil.take_action(&Board::EMPTY) {
                Some(Action::Place { tile: 1, .. }) => twos += 1,
                Some(Action::Place { tile: 2, .. }) => {}
                other => panic!("unexpected action {other:?}"),
            }
        }
        assert!((8700..9300).contains(&twos), "{twos}");
    }

    #[test]
    fn same_seed_same_game() {
        let mut a = RandomPlacer::new("seed=99").unwrap();
        let mut b = RandomPlacer::new("seed=99").unwrap();
        for _ in 0..32 {
            assert_eq!(a.take_action(&Board::EMPTY), b.take_action(&Board::EMPTY));
        }
        assert_eq!(a.name(), "random");
        assert_eq!(a.role(), "evil");
    }

    #[test]
    fn bad_seed_is_a_config_error() {
        assert!(RandomPlacer::new("seed=x").is_err());
    }
}
