//! Aggregator - the aggregation and ranking engine
//!
//! Owns the label → `Stat` table together with the ranking cache, all behind a
//! single exclusive lock. Every call holds the lock only while touching the
//! table; sorting always runs afterwards on a private copy, so a long sort
//! never blocks ingestion.
//!
//! ## Incremental ranking
//!
//! `snapshot()` avoids re-sorting the whole table on every refresh. After a
//! full pass the top-N labels are remembered, and from then on only the union
//! of that cached top-N and the labels touched since (the dirty set) is
//! re-ranked. For metrics that change only through `ingest` every
//! rank-relevant change marks the label dirty, so an entry can only enter the
//! top-N through the dirty set. A cached entry whose value worsens (a negative
//! value lowering its sum, say) keeps competing only against the candidates
//! and may hold its slot against an untouched entry until the next full pass.
//!
//! It is NOT sound for `Metric::Decay`: the decay task rescales every entry
//! without marking anything dirty, so an entry outside the cached top-N can
//! overtake the cached entries and go unnoticed until the next full pass
//! (forced by `set_sort_order`, `set_top_n`, or the cache falling short of N).
//! This is a known limitation of the approach and is kept as is.

use super::config::{AggregatorConfig, MaxLen};
use super::metric::Metric;
use super::stat::Stat;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Everything guarded by the aggregator lock
struct Table {
    /// Label → aggregates
    stats: HashMap<String, Stat>,

    /// Labels changed (or watched) since the last ranking pass
    dirty: HashSet<String>,

    /// Result of the previous ranking pass, in rank order
    top_cache: Vec<Stat>,

    /// Set by configuration changes; demands a full pass
    force_resort: bool,

    /// Bumped by `reset` so an in-flight snapshot does not write back a cache
    /// computed from the old table
    epoch: u64,

    sort_order: Metric,
    purge_method: Metric,
    max_len: MaxLen,
    top_n: usize,
}

/// Aggregation engine shared between ingestion, background tasks and viewers
///
/// Construct one per process and share it behind an `Arc`.
pub struct Aggregator {
    table: Mutex<Table>,

    /// Clock used to stamp `last_seen` (replaceable for tests)
    now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl Aggregator {
    /// Create an aggregator stamping observations with the system clock
    pub fn new(config: AggregatorConfig) -> Self {
        Self::new_with_clock(config, Box::new(Utc::now))
    }

    /// Create an aggregator with a custom clock
    ///
    /// Used for testing with deterministic timestamps.
    pub fn new_with_clock(
        config: AggregatorConfig,
        now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    ) -> Self {
        Self {
            table: Mutex::new(Table {
                stats: HashMap::new(),
                dirty: HashSet::new(),
                top_cache: Vec::new(),
                force_resort: false,
                epoch: 0,
                sort_order: config.sort_order,
                purge_method: config.purge_method,
                max_len: config.max_len,
                top_n: config.top_n,
            }),
            now_fn,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // Every pass rebuilds the cache from the table, so a poisoned guard
        // is still usable.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one observation for `element`, stamped with the aggregator clock
    pub fn ingest(&self, element: &str, value: f64) {
        let now = (self.now_fn)();
        self.ingest_at(element, value, now);
    }

    /// Record one observation with an explicit timestamp
    pub fn ingest_at(&self, element: &str, value: f64, at: DateTime<Utc>) {
        let mut guard = self.lock();
        let table = &mut *guard;

        match table.stats.get_mut(element) {
            Some(stat) => stat.observe(value, at),
            None => {
                table
                    .stats
                    .insert(element.to_string(), Stat::new(element, value, at));
            }
        }

        if !table.dirty.contains(element) {
            table.dirty.insert(element.to_string());
        }
    }

    /// Ranked top-N copy of the table
    ///
    /// Performs a full sort when forced by a configuration change or when the
    /// previous result was shorter than N; otherwise re-ranks only the cached
    /// top-N plus the dirty labels. See the module docs for the decay caveat.
    pub fn snapshot(&self) -> Vec<Stat> {
        let (mut candidates, sort_order, top_n, epoch, full) = {
            let mut table = self.lock();
            let top_n = table.top_n;
            let full = table.force_resort || table.top_cache.len() < top_n;
            let dirty = std::mem::take(&mut table.dirty);

            let candidates: Vec<Stat> = if full {
                table.force_resort = false;
                table.stats.values().cloned().collect()
            } else {
                // Cached entries first and in cached order, so tied entries
                // keep their position between refreshes
                let mut labels: Vec<&str> =
                    table.top_cache.iter().map(|s| s.element.as_str()).collect();
                let cached: HashSet<&str> = labels.iter().copied().collect();
                labels.extend(dirty.iter().map(String::as_str).filter(|l| !cached.contains(l)));

                labels
                    .into_iter()
                    .filter_map(|label| table.stats.get(label).cloned())
                    .collect()
            };

            (candidates, table.sort_order, top_n, table.epoch, full)
        };

        sort_order.sort(&mut candidates);
        candidates.truncate(top_n);

        log::trace!(
            "snapshot: {} pass by {}, {} entries",
            if full { "full" } else { "incremental" },
            sort_order,
            candidates.len()
        );

        let mut table = self.lock();
        if table.epoch == epoch {
            // Keep labels dirtied while we were sorting
            for stat in &candidates {
                if !table.dirty.contains(&stat.element) {
                    table.dirty.insert(stat.element.clone());
                }
            }
            table.top_cache = candidates.clone();
        }

        candidates
    }

    /// Evict everything ranked below `max_len` by the purge metric
    ///
    /// Returns true when at least one entry was removed. Never evicts when the
    /// table is unbounded.
    pub fn purge(&self) -> bool {
        let (mut stats, purge_method, keep) = {
            let table = self.lock();
            let keep = match table.max_len {
                MaxLen::Unbounded => return false,
                MaxLen::Bounded(keep) => keep,
            };
            if table.stats.len() <= keep {
                return false;
            }
            let stats: Vec<Stat> = table.stats.values().cloned().collect();
            (stats, table.purge_method, keep)
        };

        purge_method.sort(&mut stats);
        if stats.len() <= keep {
            return false;
        }

        let mut table = self.lock();
        let mut evicted = 0;
        for stat in &stats[keep..] {
            if table.stats.remove(&stat.element).is_some() {
                evicted += 1;
            }
            table.dirty.remove(&stat.element);
        }

        if evicted > 0 {
            log::debug!(
                "🧹 Purged {} entries by {} (keeping {}, {} remain)",
                evicted,
                purge_method,
                keep,
                table.stats.len()
            );
        }

        evicted > 0
    }

    /// Apply one decay tick to every entry
    ///
    /// `ticks` is the saturating tick count kept by the decay task. Entries
    /// are rescaled in place and deliberately not marked dirty.
    pub fn rescale_decay(&self, ticks: u32) {
        let ticks = f64::from(ticks.max(1));
        let mut table = self.lock();
        for stat in table.stats.values_mut() {
            stat.decay = (1.0 / 3.0 - stat.decay) / ticks;
        }
    }

    /// Change the display metric; the next snapshot re-sorts everything
    pub fn set_sort_order(&self, metric: Metric) {
        let mut table = self.lock();
        table.sort_order = metric;
        table.force_resort = true;
    }

    /// Change the snapshot length; the next snapshot re-sorts everything
    pub fn set_top_n(&self, top_n: usize) {
        let mut table = self.lock();
        table.top_n = top_n;
        table.force_resort = true;
    }

    /// Drop every entry and all ranking state
    pub fn reset(&self) {
        let mut table = self.lock();
        let dropped = table.stats.len();
        table.stats.clear();
        table.dirty.clear();
        table.top_cache.clear();
        table.force_resort = true;
        table.epoch = table.epoch.wrapping_add(1);
        log::info!("🔄 Reset: dropped {} entries", dropped);
    }

    pub fn sort_order(&self) -> Metric {
        self.lock().sort_order
    }

    pub fn purge_method(&self) -> Metric {
        self.lock().purge_method
    }

    pub fn top_n(&self) -> usize {
        self.lock().top_n
    }

    pub fn max_len(&self) -> MaxLen {
        self.lock().max_len
    }

    /// Copy of the current stat for one label
    pub fn get(&self, element: &str) -> Option<Stat> {
        self.lock().stats.get(element).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().stats.is_empty()
    }

    /// Sum of `seen` across all entries (denominator of the percentage metric)
    pub fn total_seen(&self) -> u64 {
        self.lock().stats.values().map(|s| s.seen).sum()
    }
}
