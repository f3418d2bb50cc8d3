// Formatting utilities shared by both viewers

use crate::pipeline::{Metric, RateUnit, Stat};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

/// Outside context needed for the derived metrics
#[derive(Debug, Clone, Copy)]
pub struct DisplayContext {
    /// Start of the rate measurement
    pub started_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
    /// Sum of `seen` over the whole table
    pub total_seen: u64,
    pub rate_unit: RateUnit,
}

/// Column heading for a metric
pub fn metric_header(metric: Metric, rate_unit: RateUnit) -> String {
    match metric {
        Metric::Rate => format!("rate/{}", rate_unit.as_str()),
        Metric::Percentage => "%".to_string(),
        Metric::LastSeen => "last seen".to_string(),
        other => other.as_str().to_string(),
    }
}

/// Format one metric cell
pub fn format_metric(metric: Metric, stat: &Stat, ctx: &DisplayContext) -> String {
    match metric {
        Metric::Sum => format!("{:.2}", stat.sum),
        Metric::Average => format!("{:.2}", stat.average),
        Metric::Seen => stat.seen.to_string(),
        Metric::Rate => format!("{:.2}", stat.rate(ctx.started_at, ctx.now, ctx.rate_unit)),
        Metric::Percentage => format!("{:.2}", stat.percentage(ctx.total_seen)),
        Metric::Min => format!("{:.2}", stat.min),
        Metric::Max => format!("{:.2}", stat.max),
        Metric::LastSeen => format_time(stat.last_seen),
        Metric::Decay => format!("{:.2}", stat.decay),
    }
}

/// Local wall-clock time, e.g. `3:04PM`
pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%-I:%M%p").to_string()
}

/// Plain-text line: metrics separated by spaces, then the label
pub fn format_line(stat: &Stat, metrics: &[Metric], ctx: &DisplayContext) -> String {
    let mut line = String::new();
    for metric in metrics {
        line.push_str(&format_metric(*metric, stat, ctx));
        line.push(' ');
    }
    line.push_str(&stat.element);
    line
}

/// JSON line: the stat plus its derived metrics
#[derive(Debug, Serialize)]
pub struct JsonRow<'a> {
    #[serde(flatten)]
    pub stat: &'a Stat,
    pub rate: f64,
    pub percentage: f64,
}

impl<'a> JsonRow<'a> {
    pub fn new(stat: &'a Stat, ctx: &DisplayContext) -> Self {
        Self {
            stat,
            rate: stat.rate(ctx.started_at, ctx.now, ctx.rate_unit),
            percentage: stat.percentage(ctx.total_seen),
        }
    }
}
