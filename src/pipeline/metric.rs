//! Ranking metrics and their comparators
//!
//! The same comparator drives the display sort, the incremental re-rank and
//! purge eviction. Rate and percentage are display views of `seen`, so they
//! rank exactly like `seen`.

use super::stat::Stat;
use std::cmp::Ordering;
use std::str::FromStr;

/// Metric a table can be ranked (and purged) by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Sum,
    Average,
    Seen,
    Rate,
    Percentage,
    Min,
    Max,
    LastSeen,
    Decay,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::Sum,
        Metric::Average,
        Metric::Seen,
        Metric::Rate,
        Metric::Percentage,
        Metric::Min,
        Metric::Max,
        Metric::LastSeen,
        Metric::Decay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Sum => "sum",
            Metric::Average => "average",
            Metric::Seen => "seen",
            Metric::Rate => "rate",
            Metric::Percentage => "percentage",
            Metric::Min => "min",
            Metric::Max => "max",
            Metric::LastSeen => "last_seen",
            Metric::Decay => "decay",
        }
    }

    /// Order two stats so that the better-ranked one comes first
    ///
    /// Everything ranks descending except `min` (ascending). NaN ranks after
    /// every number in either direction, so a NaN sum or average sinks to the
    /// bottom of the display and is the first to be purged.
    pub fn compare(self, a: &Stat, b: &Stat) -> Ordering {
        match self {
            Metric::Sum => descending(a.sum, b.sum),
            Metric::Average => descending(a.average, b.average),
            Metric::Seen | Metric::Rate | Metric::Percentage => b.seen.cmp(&a.seen),
            Metric::Max => descending(a.max, b.max),
            Metric::Min => ascending(a.min, b.min),
            Metric::LastSeen => b.last_seen.cmp(&a.last_seen),
            Metric::Decay => descending(a.decay, b.decay),
        }
    }

    /// Stable sort in rank order; ties keep their input order
    pub fn sort(self, stats: &mut [Stat]) {
        stats.sort_by(|a, b| self.compare(a, b));
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    nan_last(a, b).unwrap_or_else(|| b.total_cmp(&a))
}

fn ascending(a: f64, b: f64) -> Ordering {
    nan_last(a, b).unwrap_or_else(|| a.total_cmp(&b))
}

/// Ordering when at least one side is NaN
fn nan_last(a: f64, b: f64) -> Option<Ordering> {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => None,
        (true, true) => Some(Ordering::Equal),
        (true, false) => Some(Ordering::Greater),
        (false, true) => Some(Ordering::Less),
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricParseError(pub String);

impl std::fmt::Display for MetricParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown metric: {}", self.0)
    }
}

impl std::error::Error for MetricParseError {}

impl FromStr for Metric {
    type Err = MetricParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Metric::Sum),
            "average" => Ok(Metric::Average),
            "seen" => Ok(Metric::Seen),
            "rate" => Ok(Metric::Rate),
            "percentage" => Ok(Metric::Percentage),
            "min" => Ok(Metric::Min),
            "max" => Ok(Metric::Max),
            "last_seen" | "lastseen" => Ok(Metric::LastSeen),
            "decay" => Ok(Metric::Decay),
            other => Err(MetricParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn stat(element: &str, values: &[f64], at_secs: i64) -> Stat {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(at_secs);
        let mut stat = Stat::new(element, values[0], at);
        for v in &values[1..] {
            stat.observe(*v, at);
        }
        stat
    }

    fn order(metric: Metric, mut stats: Vec<Stat>) -> Vec<String> {
        metric.sort(&mut stats);
        stats.into_iter().map(|s| s.element).collect()
    }

    #[test]
    fn test_descending_metrics() {
        let stats = vec![
            stat("low", &[1.0], 0),
            stat("high", &[50.0, 50.0], 2),
            stat("mid", &[10.0], 1),
        ];

        assert_eq!(order(Metric::Sum, stats.clone()), ["high", "mid", "low"]);
        assert_eq!(order(Metric::Average, stats.clone()), ["high", "mid", "low"]);
        assert_eq!(order(Metric::Max, stats.clone()), ["high", "mid", "low"]);
        assert_eq!(order(Metric::LastSeen, stats.clone()), ["high", "mid", "low"]);
        assert_eq!(order(Metric::Decay, stats), ["high", "low", "mid"]);
    }

    #[test]
    fn test_min_is_ascending() {
        let stats = vec![stat("b", &[3.0], 0), stat("a", &[-1.0], 0), stat("c", &[7.0], 0)];
        assert_eq!(order(Metric::Min, stats), ["a", "b", "c"]);
    }

    #[test]
    fn test_rate_and_percentage_rank_by_seen() {
        let stats = vec![
            stat("once", &[100.0], 0),
            stat("thrice", &[1.0, 1.0, 1.0], 0),
            stat("twice", &[1.0, 1.0], 0),
        ];

        for metric in [Metric::Seen, Metric::Rate, Metric::Percentage] {
            assert_eq!(order(metric, stats.clone()), ["thrice", "twice", "once"]);
        }
    }

    #[test]
    fn test_ties_keep_input_order() {
        let stats = vec![stat("x", &[5.0], 0), stat("y", &[5.0], 0), stat("z", &[5.0], 0)];
        assert_eq!(order(Metric::Sum, stats), ["x", "y", "z"]);
    }

    #[test]
    fn test_nan_ranks_last_in_both_directions() {
        let mut stats: Vec<Stat> = (0..200)
            .map(|i| {
                let value = if i % 4 == 0 { f64::NAN } else { ((i * 37) % 101) as f64 };
                stat(&format!("label_{}", i), &[value], 0)
            })
            .collect();

        Metric::Sum.sort(&mut stats);
        let finite = stats.iter().take_while(|s| !s.sum.is_nan()).count();
        assert_eq!(finite, 150);
        assert!(stats[finite..].iter().all(|s| s.sum.is_nan()));
        assert!(stats[..finite].windows(2).all(|w| w[0].sum >= w[1].sum));

        Metric::Min.sort(&mut stats);
        let finite = stats.iter().take_while(|s| !s.min.is_nan()).count();
        assert_eq!(finite, 150);
        assert!(stats[..finite].windows(2).all(|w| w[0].min <= w[1].min));
    }

    #[test]
    fn test_parse_round_trips_names() {
        for metric in Metric::ALL {
            assert_eq!(metric.as_str().parse::<Metric>(), Ok(metric));
        }
        assert_eq!("lastseen".parse::<Metric>(), Ok(Metric::LastSeen));
        assert_eq!(
            "median".parse::<Metric>(),
            Err(MetricParseError("median".to_string()))
        );
    }
}
