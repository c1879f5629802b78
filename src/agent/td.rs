use std::mem;
use std::path::PathBuf;

use crate::action::Action;
use crate::config::{AgentConfig, TdConfig};
use crate::engine::{Board, Direction, Reward, ILLEGAL};
use crate::ntuple::{Network, WeightBudget};

use super::{Agent, AgentError, Profile};

/// One player decision: the board it saw, the afterstate it chose and the
/// immediate reward. A terminal step with no legal slide has `reward == ILLEGAL`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub before: Board,
    pub after: Board,
    pub action: Action,
    pub reward: Reward,
}

impl Step {
    #[inline]
    pub fn is_legal(&self) -> bool { self.reward != ILLEGAL }
}

/// Pick the slide maximizing `reward + V(afterstate)`.
///
/// Always returns a step; when no slide changes the board the step is the
/// illegal terminal one (`after == before`, `reward == ILLEGAL`).
pub fn select_afterstate(net: &Network, board: &Board) -> Step {
    let mut best: Option<(Step, f32)> = None;
    for dir in Direction::ALL {
        let (after, reward) = board.shift(dir);
        if after == *board {
            continue;
        }
        let value = reward as f32 + net.estimate(&after);
        if best.map_or(true, |(_, v)| value > v) {
            let step = Step { before: *board, after, action: Action::slide(dir), reward: reward as Reward };
            best = Some((step, value));
        }
    }
    match best {
        Some((step, _)) => step,
        None => Step { before: *board, after: *board, action: Action::slide(Direction::Up), reward: ILLEGAL },
    }
}

/// Backward TD(0) over one finished episode, newest step first.
///
/// A trailing illegal step is dropped. Each afterstate is pulled towards the
/// target built from the steps after it:
/// `V(s) += alpha * (target - V(s))`, then `target = V'(s) + r`.
/// Returns the number of steps trained on.
pub fn train_episode(net: &mut Network, mut path: Vec<Step>, alpha: f32) -> usize {
    if path.last().is_some_and(|s| !s.is_legal()) {
        path.pop();
    }
    let trained = path.len();
    let mut target = 0.0f32;
    while let Some(step) = path.pop() {
        let error = target - net.estimate(&step.after);
        let updated = net.update(&step.after, error * alpha);
        target = updated + step.reward as f32;
    }
    trained
}

/// The learning player.
///
/// Plays greedily on `reward + V(afterstate)`, records every decision and
/// trains on the recorded path when the episode closes. Recognised keys:
/// `alpha`, `iso`, `patterns`, `budget`, `load`, `save` (see [`TdConfig`]).
#[derive(Debug)]
pub struct TdAgent {
    profile: Profile,
    net: Network,
    alpha: f32,
    save: Option<PathBuf>,
    history: Vec<Step>,
}

impl TdAgent {
    pub fn new(args: &str) -> Result<Self, AgentError> {
        let config = AgentConfig::with_defaults("name=td role=play", args);
        let td = TdConfig::from_agent_config(&config)?;
        let budget = WeightBudget::new(td.budget_bytes);
        let mut net = Network::with_patterns(budget, &td.patterns, td.isomorphism)?;
        if let Some(path) = &td.load {
            net.load(path)?;
        }
        if td.alpha == 0.0 {
            log::warn!("alpha=0: {} will not learn", config.name());
        }
        Ok(Self { profile: Profile::new(config)?, net, alpha: td.alpha, save: td.save, history: Vec::new() })
    }

    #[inline]
    pub fn network(&self) -> &Network { &self.net }

    #[inline]
    pub fn network_mut(&mut self) -> &mut Network { &mut self.net }

    #[inline]
    pub fn alpha(&self) -> f32 { self.alpha }

    /// Decisions recorded since the episode opened.
    pub fn history(&self) -> &[Step] { &self.history }

    /// A read-only player over this agent's network, for parallel self-play.
    pub fn policy(&self) -> TdPolicy<'_> { TdPolicy::new(&self.net) }

    pub fn config(&self) -> &AgentConfig { self.profile.config() }
}

impl Agent for TdAgent {
    fn name(&self) -> &str { self.profile.name() }

    fn role(&self) -> &str { self.profile.role() }

    fn open_episode(&mut self, _flag: &str) {
        self.history.clear();
        self.history.reserve(20_000);
    }

    fn close_episode(&mut self, _flag: &str) {
        let path = mem::take(&mut self.history);
        if self.alpha == 0.0 || path.is_empty() {
            return;
        }
        let trained = train_episode(&mut self.net, path, self.alpha);
        log::debug!("{}: trained on {trained} step(s)", self.profile.name());
    }

    fn take_action(&mut self, board: &Board) -> Option<Action> {
        let step = select_afterstate(&self.net, board);
        self.history.push(step);
        step.is_legal().then_some(step.action)
    }

    fn check_for_win(&self, board: &Board) -> bool { self.profile.reached_win(board) }

    fn finalize(&mut self) -> Result<(), AgentError> {
        if let Some(path) = &self.save {
            self.net.save(path)?;
        }
        Ok(())
    }
}

/// Non-learning player borrowing a shared network. Many policies can play
/// concurrently; their trajectories are handed to a single learner afterwards.
#[derive(Debug)]
pub struct TdPolicy<'a> {
    net: &'a Network,
    history: Vec<Step>,
}

impl<'a> TdPolicy<'a> {
    pub fn new(net: &'a Network) -> Self {
        Self { net, history: Vec::new() }
    }

    pub fn into_trajectory(self) -> Vec<Step> { self.history }
}

impl Agent for TdPolicy<'_> {
    fn name(&self) -> &str { "td" }

    fn role(&self) -> &str { "play" }

    fn take_action(&mut self, board: &Board) -> Option<Action> {
        let step = select_afterstate(self.net, board);
        self.history.push(step);
        step.is_legal().then_some(step.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::RandomPlacer;
    use tempfile::NamedTempFile;

    fn cell0(rank: u8) -> Board {
        let mut ranks = [0u8; 16];
        ranks[0] = rank;
        Board::from_ranks(ranks)
    }

    fn single_cell_net() -> Network {
        Network::with_patterns(WeightBudget::default(), &[vec![0]], 1).unwrap()
    }

    fn two_ply_path() -> Vec<Step> {
        let slide = Action::slide(Direction::Left);
        vec![
            Step { before: Board::EMPTY, after: cell0(1), action: slide, reward: 4 },
            Step { before: cell0(1), after: cell0(2), action: slide, reward: 8 },
            Step { before: cell0(3), after: cell0(3), action: slide, reward: ILLEGAL },
        ]
    }

    #[test]
    fn backward_pass_matches_hand_computation() {
        let mut net = single_cell_net();
        let w = |net: &Network, r: usize| net.patterns()[0].weights()[r];

        // Pass 1: second afterstate has target 0, error 0 -> target 8.
        // First afterstate: error 8, u 4 -> w[1] = 4.
        assert_eq!(train_episode(&mut net, two_ply_path(), 0.5), 2);
        assert_eq!(w(&net, 1), 4.0);
        assert_eq!(w(&net, 2), 0.0);
        assert_eq!(w(&net, 3), 0.0);

        // Pass 2: target for the first afterstate is again 0 + 8; error 4, u 2.
        train_episode(&mut net, two_ply_path(), 0.5);
        assert_eq!(w(&net, 1), 6.0);
        assert_eq!(w(&net, 2), 0.0);
    }

    #[test]
    fn legal_terminal_step_is_kept() {
        let mut net = single_cell_net();
        let mut path = two_ply_path();
        path.pop();
        assert_eq!(train_episode(&mut net, path, 1.0), 2);
        assert_eq!(net.patterns()[0].weights()[1], 8.0);
    }

    #[test]
    fn afterstate_selection_uses_value_plus_reward() {
        let mut net = single_cell_net();
        // Row [1, 1, 0, 0]: Left gives cell 0 rank 2 (reward 4), Right leaves it empty.
        let b = Board::from_ranks([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let step = select_afterstate(&net, &b);
        assert_eq!(step.reward, 4);
        assert!(matches!(step.action, Action::Slide(Direction::Right)));

        net.update(&Board::EMPTY, 100.0);
        let step = select_afterstate(&net, &b);
        assert!(matches!(step.action, Action::Slide(Direction::Right)));

        net.update(&Board::EMPTY, -200.0);
        let step = select_afterstate(&net, &b);
        assert_eq!(step.after.at(0), 2);
    }

    #[test]
    fn stuck_board_yields_illegal_step() {
        let net = single_cell_net();
        let b = Board::from_ranks([1, 2, 1, 2, 2, 1, 2, 1, 1, 2, 1, 2, 2, 1, 2, 1]);
        let step = select_afterstate(&net, &b);
        assert!(!step.is_legal());
        assert_eq!(step.after, b);
    }

    #[test]
    fn agent_records_and_learns_on_close() {
        let mut play = TdAgent::new("alpha=0.1 iso=8 patterns=0123,4567 budget=1048576").unwrap();
        let mut evil = RandomPlacer::new("seed=3").unwrap();
        play.open_episode("");
        let mut board = Board::EMPTY;
        for _ in 0..2 {
            evil.take_action(&board).unwrap().apply(&mut board);
        }
        while let Some(action) = play.take_action(&board) {
            assert!(action.apply(&mut board) >= 0);
            match evil.take_action(&board) {
                Some(put) => put.apply(&mut board),
                None => break,
            };
        }
        assert!(!play.history().is_empty());
        play.close_episode("");
        assert!(play.history().is_empty());
        let touched = play.network().patterns().iter().flat_map(|p| p.weights().as_slice()).any(|&w| w != 0.0);
        assert!(touched);
    }

    #[test]
    fn finalize_saves_and_new_loads() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().display().to_string();
        let mut a = TdAgent::new(&format!("iso=1 patterns=01 save={path}")).unwrap();
        a.network_mut().update(&Board::IDENTITY, 2.5);
        a.finalize().unwrap();

        let b = TdAgent::new(&format!("iso=1 patterns=01 load={path}")).unwrap();
        assert_eq!(b.network().estimate(&Board::IDENTITY), 2.5);

        let wrong = TdAgent::new(&format!("iso=1 patterns=02 load={path}"));
        assert!(matches!(wrong, Err(AgentError::Weights(_))));
    }

    #[test]
    fn policy_collects_a_trajectory() {
        let agent = TdAgent::new("iso=1 patterns=0123 budget=1048576").unwrap();
        let mut policy = agent.policy();
        let b = Board::from_ranks([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(policy.take_action(&b).is_some());
        let path = policy.into_trajectory();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].before, b);
    }
}
