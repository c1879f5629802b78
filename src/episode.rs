//! One game from the empty board to termination, and the episode log format.
//!
//! Log file layout: repeated frames `[u32 LE len][postcard bytes][u32 LE crc32c]`.
//! A clean end of file between frames ends the log.

use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionKind};
use crate::agent::Agent;
use crate::engine::{Board, Reward, ILLEGAL};

/// Frames larger than this are rejected as malformed.
const MAX_FRAME: u32 = 64 << 20;

#[derive(thiserror::Error, Debug)]
pub enum EpisodeLogError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("checksum mismatch")]
    Checksum,
    #[error("malformed episode log: {0}")]
    Malformed(&'static str),
}

/// An applied action with its reward and the time since the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ply {
    pub action: Action,
    pub reward: Reward,
    pub micros: u64,
}

/// Free-form tag plus wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub flag: String,
    pub unix_ms: u64,
}

impl Stamp {
    fn now(flag: &str) -> Self {
        Self { flag: flag.to_string(), unix_ms: now_unix_millis() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Episode {
    state: Board,
    score: u64,
    plies: Vec<Ply>,
    open: Stamp,
    close: Stamp,
    #[serde(skip)]
    clock: Option<Instant>,
}

impl PartialEq for Episode {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.score == other.score
            && self.plies == other.plies
            && self.open == other.open
            && self.close == other.close
    }
}

impl Episode {
    pub fn new() -> Self { Self::default() }

    /// Reset to the empty board and start the clock.
    pub fn open_episode(&mut self, flag: &str) {
        self.state = Board::EMPTY;
        self.score = 0;
        self.plies.clear();
        self.open = Stamp::now(flag);
        self.close = Stamp::default();
        self.clock = Some(Instant::now());
    }

    pub fn close_episode(&mut self, flag: &str) {
        self.close = Stamp::now(flag);
        self.clock = None;
    }

    /// Apply `action` to the current state. Illegal actions are not recorded
    /// and leave the episode untouched.
    pub fn apply_action(&mut self, action: Action) -> bool {
        let reward = action.apply(&mut self.state);
        if reward == ILLEGAL {
            return false;
        }
        let now = Instant::now();
        let micros = self.clock.map_or(0, |t| now.duration_since(t).as_micros() as u64);
        self.clock = Some(now);
        self.score += reward as u64;
        self.plies.push(Ply { action, reward, micros });
        true
    }

    /// Who moves next: the environment places the first two tiles, then
    /// player and environment alternate.
    pub fn take_turns<'a>(&self, play: &'a mut dyn Agent, evil: &'a mut dyn Agent) -> &'a mut dyn Agent {
        let n = self.plies.len();
        if n >= 2 && n % 2 == 0 {
            play
        } else {
            evil
        }
    }

    /// Drive the game until an agent has nothing to do, an action is illegal
    /// or the mover reports a win. Returns the name of the last mover.
    pub fn run(&mut self, play: &mut dyn Agent, evil: &mut dyn Agent) -> String {
        loop {
            let who = self.take_turns(&mut *play, &mut *evil);
            let Some(action) = who.take_action(&self.state) else {
                return who.name().to_string();
            };
            if !self.apply_action(action) {
                return who.name().to_string();
            }
            if who.check_for_win(&self.state) {
                return who.name().to_string();
            }
        }
    }

    #[inline]
    pub fn state(&self) -> Board { self.state }

    #[inline]
    pub fn score(&self) -> u64 { self.score }

    pub fn plies(&self) -> &[Ply] { &self.plies }

    pub fn opened(&self) -> &Stamp { &self.open }

    pub fn closed(&self) -> &Stamp { &self.close }

    /// Number of recorded plies, optionally of one kind only.
    pub fn step(&self, kind: Option<ActionKind>) -> usize {
        self.plies.iter().filter(|p| kind.map_or(true, |k| p.action.kind() == k)).count()
    }

    /// Time spent producing plies, optionally of one kind only.
    pub fn time(&self, kind: Option<ActionKind>) -> Duration {
        let micros = self
            .plies
            .iter()
            .filter(|p| kind.map_or(true, |k| p.action.kind() == k))
            .map(|p| p.micros)
            .sum();
        Duration::from_micros(micros)
    }

    /// Replay the plies from the empty board and check the stored state and score.
    pub fn verify(&self) -> bool {
        let mut board = Board::EMPTY;
        let mut score = 0u64;
        for ply in &self.plies {
            let reward = ply.action.apply(&mut board);
            if reward == ILLEGAL || reward != ply.reward {
                return false;
            }
            score += reward as u64;
        }
        board == self.state && score == self.score
    }
}

/// Open, run and close one episode with both agents.
pub fn play_episode(play: &mut dyn Agent, evil: &mut dyn Agent) -> Episode {
    let flag = format!("{}:{}", play.name(), evil.name());
    let mut ep = Episode::new();
    ep.open_episode(&flag);
    play.open_episode(&flag);
    evil.open_episode(&flag);
    let last = ep.run(play, evil);
    ep.close_episode(&last);
    play.close_episode(&last);
    evil.close_episode(&last);
    ep
}

/// Appends CRC-checked episode frames to a writer.
pub struct EpisodeWriter<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> EpisodeWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn append(&mut self, ep: &Episode) -> Result<(), EpisodeLogError> {
        let bytes = postcard::to_allocvec(ep)?;
        let len = u32::try_from(bytes.len())
            .ok()
            .filter(|&n| n <= MAX_FRAME)
            .ok_or(EpisodeLogError::Malformed("episode too large"))?;
        self.out.write_all(&len.to_le_bytes())?;
        self.out.write_all(&bytes)?;
        self.out.write_all(&crc32c::crc32c(&bytes).to_le_bytes())?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 { self.written }

    pub fn finish(mut self) -> Result<W, EpisodeLogError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Read the next frame, or `None` at a clean end of input.
pub fn read_episode<R: Read>(input: &mut R) -> Result<Option<Episode>, EpisodeLogError> {
    let mut len = [0u8; 4];
    let mut got = 0;
    while got < len.len() {
        match input.read(&mut len[got..]) {
            Ok(0) if got == 0 => return Ok(None),
            Ok(0) => return Err(EpisodeLogError::Malformed("truncated frame header")),
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    let len = u32::from_le_bytes(len);
    if len > MAX_FRAME {
        return Err(EpisodeLogError::Malformed("frame length out of range"));
    }
    let mut bytes = vec![0u8; len as usize];
    let mut crc = [0u8; 4];
    input.read_exact(&mut bytes)?;
    input.read_exact(&mut crc)?;
    if u32::from_le_bytes(crc) != crc32c::crc32c(&bytes) {
        return Err(EpisodeLogError::Checksum);
    }
    let ep: Episode = postcard::from_bytes(&bytes)?;
    if !ep.verify() {
        return Err(EpisodeLogError::Malformed("plies do not reproduce the final state"));
    }
    Ok(Some(ep))
}

pub fn read_episodes<R: Read>(input: &mut R) -> Result<Vec<Episode>, EpisodeLogError> {
    let mut out = Vec::new();
    while let Some(ep) = read_episode(input)? {
        out.push(ep);
    }
    Ok(out)
}

pub fn save_episodes<'a, P, I>(path: P, episodes: I) -> Result<u64, EpisodeLogError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a Episode>,
{
    let mut writer = EpisodeWriter::new(BufWriter::new(fs::File::create(path.as_ref())?));
    for ep in episodes {
        writer.append(ep)?;
    }
    let n = writer.written();
    writer.finish()?;
    log::info!("saved {n} episode(s) to {}", path.as_ref().display());
    Ok(n)
}

pub fn load_episodes<P: AsRef<Path>>(path: P) -> Result<Vec<Episode>, EpisodeLogError> {
    let mut input = BufReader::new(fs::File::open(path.as_ref())?);
    let episodes = read_episodes(&mut input)?;
    log::info!("loaded {} episode(s) from {}", episodes.len(), path.as_ref().display());
    Ok(episodes)
}

pub fn now_unix_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
