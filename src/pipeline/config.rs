//! Aggregator configuration
//!
//! The ranking-related subset of the runtime configuration, handed to
//! `Aggregator::new` at construction.

use super::metric::Metric;
use std::str::FromStr;

/// Upper bound on the number of table entries kept by purge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxLen {
    /// Keep at most this many entries
    Bounded(usize),
    /// Never purge
    Unbounded,
}

impl FromStr for MaxLen {
    type Err = String;

    /// Parses a positive integer, or `unbounded` / `-1` for no limit
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") || s == "-1" {
            return Ok(MaxLen::Unbounded);
        }
        match s.parse::<usize>() {
            Ok(0) => Err("keep must be positive (use 'unbounded' to disable purging)".to_string()),
            Ok(n) => Ok(MaxLen::Bounded(n)),
            Err(_) => Err(format!("keep must be a positive integer, 'unbounded' or -1, got '{}'", s)),
        }
    }
}

impl std::fmt::Display for MaxLen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxLen::Bounded(n) => write!(f, "{}", n),
            MaxLen::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Construction-time settings of an `Aggregator`
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Metric snapshots are ranked by
    pub sort_order: Metric,

    /// Metric purge ranks by (independent of `sort_order`)
    pub purge_method: Metric,

    /// Table size bound enforced by purge
    pub max_len: MaxLen,

    /// Maximum snapshot length
    pub top_n: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            sort_order: Metric::Sum,
            purge_method: Metric::Decay,
            max_len: MaxLen::Bounded(1000),
            top_n: 10,
        }
    }
}
