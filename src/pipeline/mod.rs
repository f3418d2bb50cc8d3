//! # Aggregation and ranking pipeline
//!
//! Turns a stream of `(value, label)` observations into a bounded, ranked
//! view for live display.
//!
//! ## Architecture
//!
//! ```text
//! stdin lines
//!     ↓
//! ingestion task (parse, Aggregator::ingest)
//!     ↓
//! Aggregator  ←── decay task (1s, rescale heat)
//!     │       ←── purge task (refresh interval, evict)
//!     ↓
//! Aggregator::snapshot() → viewer
//! ```
//!
//! ## Module Organization
//!
//! - `stat` - Per-label aggregates and derived display metrics
//! - `metric` - Ranking metrics and comparators
//! - `config` - Aggregator construction settings
//! - `engine` - The `Aggregator`: table, dirty set, incremental top-N
//! - `scheduler` - Decay and purge background tasks
//! - `ingestion` - Line channel consumer feeding the aggregator

pub mod config;
pub mod engine;
pub mod ingestion;
pub mod metric;
pub mod scheduler;
pub mod stat;

pub use config::{AggregatorConfig, MaxLen};
pub use engine::Aggregator;
pub use metric::{Metric, MetricParseError};
pub use scheduler::{spawn_decay_task, spawn_purge_task, DecayClock, TaskHandle};
pub use stat::{RateUnit, Stat};
