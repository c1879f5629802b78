//! Agent configuration strings and the learner's knobs.
//!
//! Agents are configured with whitespace-separated `key=value` properties,
//! e.g. `"name=td role=play alpha=0.1 load=weights.bin"`. A bare token `key`
//! is read as `key=key`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ntuple::{DEFAULT_BUDGET_BYTES, DEFAULT_PATTERNS, ISOMORPHISMS};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("invalid pattern list {0:?}")]
    Patterns(String),
}

/// Parsed `key=value` properties. Keys are unique; later tokens win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentConfig {
    props: BTreeMap<String, String>,
}

impl AgentConfig {
    /// Parse `defaults`, then apply `overrides` on top.
    pub fn with_defaults(defaults: &str, overrides: &str) -> Self {
        let mut cfg: AgentConfig = defaults.parse().unwrap_or_default();
        for (k, v) in tokens(overrides) {
            cfg.props.insert(k, v);
        }
        cfg
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> { self.props.get(key).map(String::as_str) }

    /// Parse the value of `key`, if present.
    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|v| {
                v.parse::<T>().map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: v.to_string() })
            })
            .transpose()
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.props.insert(key.to_string(), value.to_string());
    }

    pub fn name(&self) -> &str { self.get("name").unwrap_or("unknown") }

    pub fn role(&self) -> &str { self.get("role").unwrap_or("unknown") }

    /// Rank at which `check_for_win` reports a win (`win=11` means the 2048 tile).
    pub fn win_rank(&self) -> Result<Option<u8>, ConfigError> { self.parse("win") }

    pub fn seed(&self) -> Result<Option<u64>, ConfigError> { self.parse("seed") }
}

impl FromStr for AgentConfig {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { props: tokens(s).collect() })
    }
}

impl fmt::Display for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.props {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

fn tokens(s: &str) -> impl Iterator<Item = (String, String)> + '_ {
    s.split_whitespace().map(|tok| match tok.split_once('=') {
        Some((k, v)) => (k.to_string(), v.to_string()),
        None => (tok.to_string(), tok.to_string()),
    })
}

/// Knobs for the TD(0) learner. Defaults follow the usual 2048 setup.
///
/// - `alpha`: learning rate; `0` disables learning.
/// - `isomorphism`: how many of the 8 symmetries each pattern uses.
/// - `patterns`: cell position lists, one per feature.
/// - `budget_bytes`: ceiling for all weight tables together.
/// - `load` / `save`: weight files read at start / written by `finalize`.
#[derive(Debug, Clone, PartialEq)]
pub struct TdConfig {
    pub alpha: f32,
    pub isomorphism: usize,
    pub patterns: Vec<Vec<usize>>,
    pub budget_bytes: usize,
    pub load: Option<PathBuf>,
    pub save: Option<PathBuf>,
}

impl Default for TdConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            isomorphism: ISOMORPHISMS,
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_vec()).collect(),
            budget_bytes: DEFAULT_BUDGET_BYTES,
            load: None,
            save: None,
        }
    }
}

impl TdConfig {
    /// Read `alpha`, `iso`, `patterns`, `budget`, `load` and `save` from `cfg`,
    /// keeping defaults for absent keys.
    ///
    /// ```
    /// use tdl_2048::config::{AgentConfig, TdConfig};
    /// let cfg: AgentConfig = "alpha=0.05 iso=4 patterns=0123,4567".parse().unwrap();
    /// let td = TdConfig::from_agent_config(&cfg).unwrap();
    /// assert_eq!(td.alpha, 0.05);
    /// assert_eq!(td.patterns, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    /// ```
    pub fn from_agent_config(cfg: &AgentConfig) -> Result<Self, ConfigError> {
        let mut td = Self::default();
        if let Some(alpha) = cfg.parse::<f32>("alpha")? {
            if !alpha.is_finite() || alpha < 0.0 {
                return Err(ConfigError::InvalidValue { key: "alpha".into(), value: alpha.to_string() });
            }
            td.alpha = alpha;
        }
        if let Some(iso) = cfg.parse::<usize>("iso")? {
            td.isomorphism = iso;
        }
        if let Some(list) = cfg.get("patterns") {
            td.patterns = parse_patterns(list)?;
        }
        if let Some(budget) = cfg.parse::<usize>("budget")? {
            td.budget_bytes = budget;
        }
        td.load = cfg.get("load").map(PathBuf::from);
        td.save = cfg.get("save").map(PathBuf::from);
        Ok(td)
    }
}

/// Parse `"012345,456789"`: comma separated patterns, one hex digit per cell.
pub fn parse_patterns(list: &str) -> Result<Vec<Vec<usize>>, ConfigError> {
    list.split(',')
        .map(|p| {
            let p = p.trim();
            if p.is_empty() {
                return Err(ConfigError::Patterns(list.to_string()));
            }
            p.chars()
                .map(|c| c.to_digit(16).map(|d| d as usize).ok_or_else(|| ConfigError::Patterns(list.to_string())))
                .collect()
        })
        .collect()
}
