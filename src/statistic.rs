//! Running statistics over played episodes.
//!
//! Every `block` episodes a summary of the last block is logged:
//!
//! ```text
//! 1000   avg = 273901, max = 382324, ops = 241563 (170543|896715)
//!        512     100%    (0.3%)
//!        1024    99.7%   (0.2%)
//!        2048    99.5%   (1.1%)
//! ```
//!
//! `ops` is plies per second overall, then for slides and placements. Each
//! tile row gives the share of games that reached the tile and, in
//! parentheses, the share that ended with it as the largest tile.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::action::ActionKind;
use crate::episode::Episode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRate {
    /// Tile value (`2^rank`, 0 for an empty board).
    pub tile: u32,
    /// Percentage of games whose largest tile was at least `tile`.
    pub reach: f64,
    /// Percentage of games whose largest tile was exactly `tile`.
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Episodes played so far.
    pub index: usize,
    /// Episodes covered by this summary.
    pub episodes: usize,
    pub avg: u64,
    pub max: u64,
    pub ops: f64,
    pub ops_slide: f64,
    pub ops_place: f64,
    pub tiles: Vec<TileRate>,
}

impl Summary {
    fn over<'a>(index: usize, eps: impl Iterator<Item = &'a Episode>) -> Self {
        let mut ends = [0usize; 16];
        let (mut n, mut sum, mut max) = (0usize, 0u64, 0u64);
        let (mut sop, mut pop, mut eop) = (0usize, 0usize, 0usize);
        let (mut sdu, mut pdu, mut edu) = (Duration::ZERO, Duration::ZERO, Duration::ZERO);
        for ep in eps {
            n += 1;
            sum += ep.score();
            max = max.max(ep.score());
            ends[ep.state().max_rank() as usize] += 1;
            sop += ep.step(None);
            pop += ep.step(Some(ActionKind::Slide));
            eop += ep.step(Some(ActionKind::Place));
            sdu += ep.time(None);
            pdu += ep.time(Some(ActionKind::Slide));
            edu += ep.time(Some(ActionKind::Place));
        }

        let mut tiles = Vec::new();
        if n > 0 {
            for (rank, &count) in ends.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                let reached: usize = ends[rank..].iter().sum();
                tiles.push(TileRate {
                    tile: if rank == 0 { 0 } else { 1 << rank },
                    reach: reached as f64 * 100.0 / n as f64,
                    end: count as f64 * 100.0 / n as f64,
                });
            }
        }

        Self {
            index,
            episodes: n,
            avg: if n > 0 { sum / n as u64 } else { 0 },
            max,
            ops: rate(sop, sdu),
            ops_slide: rate(pop, pdu),
            ops_place: rate(eop, edu),
            tiles,
        }
    }
}

fn rate(ops: usize, time: Duration) -> f64 {
    let secs = time.as_secs_f64();
    if secs > 0.0 { ops as f64 / secs } else { 0.0 }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\tavg = {}, max = {}, ops = {:.0} ({:.0}|{:.0})",
            self.index, self.avg, self.max, self.ops, self.ops_slide, self.ops_place
        )?;
        for t in &self.tiles {
            write!(f, "\n\t{}\t{}%\t({}%)", t.tile, trim(t.reach), trim(t.end))?;
        }
        Ok(())
    }
}

/// At most one decimal, without a trailing `.0`.
fn trim(pct: f64) -> String {
    let s = format!("{pct:.1}");
    s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
}

/// Collects episodes and reports on them.
///
/// `total` is the number of episodes to play, `block` the summary interval
/// and `limit` how many episodes are kept in memory (`0` means `total`).
#[derive(Debug, Clone)]
pub struct Statistic {
    total: usize,
    block: usize,
    limit: usize,
    count: usize,
    data: VecDeque<Episode>,
}

impl Statistic {
    pub fn new(total: usize, block: usize, limit: usize) -> Self {
        Self {
            total,
            block: if block > 0 { block } else { total.max(1) },
            limit: if limit > 0 { limit } else { total },
            count: 0,
            data: VecDeque::new(),
        }
    }

    #[inline]
    pub fn is_finished(&self) -> bool { self.count >= self.total }

    #[inline]
    pub fn count(&self) -> usize { self.count }

    #[inline]
    pub fn total(&self) -> usize { self.total }

    /// Start a new episode and hand it out for playing.
    pub fn open_episode(&mut self, flag: &str) -> &mut Episode {
        self.make_room();
        self.count += 1;
        let mut ep = Episode::new();
        ep.open_episode(flag);
        self.data.push_back(ep);
        let last = self.data.len() - 1;
        &mut self.data[last]
    }

    /// Close the newest episode; logs a summary at block boundaries.
    pub fn close_episode(&mut self, flag: &str) {
        if let Some(ep) = self.data.back_mut() {
            ep.close_episode(flag);
        }
        self.block_done();
    }

    /// Record an episode that was played elsewhere and already closed.
    pub fn push(&mut self, ep: Episode) {
        self.make_room();
        self.count += 1;
        self.data.push_back(ep);
        self.block_done();
    }

    /// Seed with previously saved episodes. They count towards `total`.
    pub fn preload(&mut self, episodes: Vec<Episode>) {
        self.total = self.total.max(episodes.len());
        self.count = episodes.len();
        self.data = episodes.into();
    }

    pub fn episodes(&self) -> impl Iterator<Item = &Episode> + '_ { self.data.iter() }

    /// Summary over the last `block` episodes.
    pub fn show(&self) -> Summary {
        let blk = self.data.len().min(self.block);
        Summary::over(self.count, self.data.iter().skip(self.data.len() - blk))
    }

    /// Summary over every kept episode.
    pub fn summary(&self) -> Summary { Summary::over(self.count, self.data.iter()) }

    fn make_room(&mut self) {
        if self.count >= self.limit {
            self.data.pop_front();
        }
    }

    fn block_done(&self) {
        if self.count % self.block == 0 {
            log::info!("{}", self.show());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::agent::{GreedySlider, RandomPlacer};
    use crate::episode::play_episode;

    fn scripted(ranks: &[u8]) -> Episode {
        // One placement per rank; the largest placed rank is the final max tile.
        let mut ep = Episode::new();
        ep.open_episode("t");
        for (pos, &r) in ranks.iter().enumerate() {
            assert!(ep.apply_action(Action::place(pos as u8, r).unwrap()));
        }
        ep.close_episode("t");
        ep
    }

    #[test]
    fn tile_rates() {
        let mut stat = Statistic::new(4, 4, 0);
        stat.push(scripted(&[1, 11]));
        stat.push(scripted(&[11]));
        stat.push(scripted(&[12]));
        stat.push(scripted(&[1, 13, 2]));
        assert!(stat.is_finished());
        let s = stat.show();
        assert_eq!(s.episodes, 4);
        assert_eq!(s.index, 4);
        assert_eq!(
            s.tiles,
            vec![
                TileRate { tile: 2048, reach: 100.0, end: 50.0 },
                TileRate { tile: 4096, reach: 50.0, end: 25.0 },
                TileRate { tile: 8192, reach: 25.0, end: 25.0 },
            ]
        );
        assert_eq!(s.avg, 0);
    }

    #[test]
    fn show_covers_last_block_only() {
        let mut stat = Statistic::new(6, 2, 0);
        for r in [3, 3, 3, 3, 5, 6] {
            stat.push(scripted(&[r]));
        }
        let s = stat.show();
        assert_eq!(s.episodes, 2);
        assert_eq!(s.tiles.len(), 2);
        assert_eq!(s.tiles[0].tile, 32);
        assert_eq!(stat.summary().episodes, 6);
    }

    #[test]
    fn limit_bounds_memory() {
        let mut stat = Statistic::new(10, 5, 3);
        for _ in 0..10 {
            stat.push(scripted(&[1]));
        }
        assert_eq!(stat.count(), 10);
        assert_eq!(stat.episodes().count(), 3);
    }

    #[test]
    fn open_and_close_with_agents() {
        let mut play = GreedySlider::new("").unwrap();
        let mut evil = RandomPlacer::new("seed=21").unwrap();
        let mut stat = Statistic::new(3, 0, 0);
        while !stat.is_finished() {
            let ep = stat.open_episode("greedy:random");
            let last = ep.run(&mut play, &mut evil);
            stat.close_episode(&last);
        }
        let s = stat.summary();
        assert_eq!(s.episodes, 3);
        assert!(s.avg > 0);
        assert!(s.max >= s.avg);
        assert!(stat.episodes().all(|ep| ep.closed().flag == "greedy"));
        let reach: Vec<f64> = s.tiles.iter().map(|t| t.reach).collect();
        assert_eq!(reach[0], 100.0);
        assert!(reach.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn preload_counts_towards_total() {
        let mut play = GreedySlider::new("").unwrap();
        let mut evil = RandomPlacer::new("seed=1").unwrap();
        let games: Vec<Episode> = (0..3).map(|_| play_episode(&mut play, &mut evil)).collect();
        let mut stat = Statistic::new(2, 0, 0);
        stat.preload(games);
        assert!(stat.is_finished());
        assert_eq!(stat.total(), 3);
    }

    #[test]
    fn display_format() {
        let s = Summary {
            index: 1000,
            episodes: 1000,
            avg: 273901,
            max: 382324,
            ops: 241563.4,
            ops_slide: 170543.0,
            ops_place: 896715.0,
            tiles: vec![TileRate { tile: 512, reach: 100.0, end: 0.3 }, TileRate { tile: 1024, reach: 99.7, end: 0.2 }],
        };
        assert_eq!(
            s.to_string(),
            "1000\tavg = 273901, max = 382324, ops = 241563 (170543|896715)\n\t512\t100%\t(0.3%)\n\t1024\t99.7%\t(0.2%)"
        );
    }
}
