//! Per-label aggregate statistics
//!
//! A `Stat` is created on the first observation of a label and updated in
//! place on every later one. Rate and percentage are not stored; they are
//! derived at display time from a `Stat` plus outside context.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

/// Running aggregates for one label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stat {
    /// Label identity (unique key in the table)
    pub element: String,

    /// Running total of observed values
    pub sum: f64,

    /// Incrementally maintained mean
    pub average: f64,

    /// Smallest observed value
    pub min: f64,

    /// Largest observed value
    pub max: f64,

    /// Number of observations
    pub seen: u64,

    /// Time of the most recent observation
    pub last_seen: DateTime<Utc>,

    /// Heat score: +1 per observation, rescaled by the decay task
    pub decay: f64,
}

impl Stat {
    /// Create the stat for a label's first observation
    ///
    /// Min and max are seeded from `value`, never from zero, so a label that
    /// only ever sees positive values does not report `min = 0`.
    pub fn new(element: impl Into<String>, value: f64, at: DateTime<Utc>) -> Self {
        Self {
            element: element.into(),
            sum: value,
            average: value,
            min: value,
            max: value,
            seen: 1,
            last_seen: at,
            decay: 1.0,
        }
    }

    /// Fold one more observation into the aggregates
    pub fn observe(&mut self, value: f64, at: DateTime<Utc>) {
        let seen = self.seen as f64;
        self.average = (self.average * seen + value) / (seen + 1.0);
        self.sum += value;
        self.seen += 1;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        self.last_seen = at;
        self.decay += 1.0;
    }

    /// Observations per rate unit since `started_at`
    ///
    /// The elapsed time is rounded up to whole units (at least one), so the
    /// first partial unit of runtime never divides by zero.
    pub fn rate(&self, started_at: DateTime<Utc>, now: DateTime<Utc>, unit: RateUnit) -> f64 {
        let elapsed = (now - started_at).num_milliseconds().max(0) as f64 / 1000.0;
        let units = (elapsed / unit.seconds()).ceil().max(1.0);
        self.seen as f64 / units
    }

    /// Share of all observations, in percent
    ///
    /// `total_seen` is the sum of `seen` over every entry currently in the
    /// table. Returns 0 for an empty table.
    pub fn percentage(&self, total_seen: u64) -> f64 {
        if total_seen == 0 {
            return 0.0;
        }
        self.seen as f64 / total_seen as f64 * 100.0
    }
}

/// Time unit used when displaying the rate metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateUnit {
    Second,
    #[default]
    Minute,
    Hour,
}

impl RateUnit {
    pub fn seconds(self) -> f64 {
        match self {
            RateUnit::Second => 1.0,
            RateUnit::Minute => 60.0,
            RateUnit::Hour => 3600.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RateUnit::Second => "second",
            RateUnit::Minute => "minute",
            RateUnit::Hour => "hour",
        }
    }
}

impl FromStr for RateUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "second" | "sec" | "s" => Ok(RateUnit::Second),
            "minute" | "min" | "m" => Ok(RateUnit::Minute),
            "hour" | "h" => Ok(RateUnit::Hour),
            other => Err(format!("unknown rate unit '{}'", other)),
        }
    }
}
