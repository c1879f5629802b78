//! Parallel self-play with a single learner.
//!
//! A batch of episodes is played concurrently by [`TdPolicy`] players that
//! only read the network. The trajectories are then applied to the network
//! one after another, in seed order, by the caller's `&mut Network`.

use std::ops::Range;

use rayon::prelude::*;

use crate::agent::{train_episode, RandomPlacer, Step, TdPolicy};
use crate::config::ConfigError;
use crate::episode::{play_episode, Episode};
use crate::ntuple::Network;

/// Play one episode per seed in parallel. `evil_args` configures the
/// [`RandomPlacer`]; its `seed` is replaced by the episode's seed.
pub fn play_batch(net: &Network, seeds: Range<u64>, evil_args: &str) -> Result<Vec<(Episode, Vec<Step>)>, ConfigError> {
    seeds
        .into_par_iter()
        .map(|seed| {
            let mut evil = RandomPlacer::new(&format!("{evil_args} seed={seed}"))?;
            let mut play = TdPolicy::new(net);
            let ep = play_episode(&mut play, &mut evil);
            Ok((ep, play.into_trajectory()))
        })
        .collect()
}

/// Train on every trajectory in order and hand back the episodes.
pub fn learn_batch(net: &mut Network, batch: Vec<(Episode, Vec<Step>)>, alpha: f32) -> Vec<Episode> {
    batch
        .into_iter()
        .map(|(ep, path)| {
            if alpha != 0.0 {
                train_episode(net, path, alpha);
            }
            ep
        })
        .collect()
}

/// Play and learn from `episodes` games in batches of `batch`, calling
/// `on_episode` for every finished game. Seeds run from `first_seed` upwards.
pub fn train_parallel<F>(
    net: &mut Network,
    alpha: f32,
    episodes: u64,
    batch: u64,
    first_seed: u64,
    evil_args: &str,
    mut on_episode: F,
) -> Result<(), ConfigError>
where
    F: FnMut(Episode),
{
    let batch = batch.max(1);
    let mut next = first_seed;
    let end = first_seed.saturating_add(episodes);
    while next < end {
        let stop = next.saturating_add(batch).min(end);
        let played = play_batch(net, next..stop, evil_args)?;
        let steps: usize = played.iter().map(|(_, path)| path.len()).sum();
        log::debug!("batch {next}..{stop}: {steps} decision(s)");
        learn_batch(net, played, alpha).into_iter().for_each(&mut on_episode);
        next = stop;
    }
    Ok(())
}
