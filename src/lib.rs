//! topstat - live top-N statistics over labelled numeric input
//!
//! Reads `value label` lines, keeps running aggregates per label and shows
//! the labels ranked by a chosen metric, either as a full-screen terminal UI
//! or as periodic plain-text dumps.

pub mod config;
pub mod parser;
pub mod pipeline;
pub mod ui;

pub use config::{Config, ConfigError, OutputFormat};
pub use parser::{LineParser, ParseError};
pub use pipeline::{Aggregator, AggregatorConfig, MaxLen, Metric, RateUnit, Stat};
