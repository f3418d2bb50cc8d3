//! Background maintenance tasks: decay rescaling and purge eviction
//!
//! Both run on a fixed interval for the life of the process. Each is spawned
//! with a stop signal and handed back as a `TaskHandle`, so callers (and
//! tests) can shut them down cleanly.

use super::engine::Aggregator;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Decay tick period
pub const DECAY_INTERVAL: Duration = Duration::from_secs(1);

/// Tick count at which the decay denominator stops growing
pub const DECAY_MAX_TICKS: u32 = 60;

/// Handle to a spawned background task
pub struct TaskHandle {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    /// Signal the task to stop and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            log::warn!("{} task ended abnormally: {}", self.name, e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Saturating tick counter driving the decay denominator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecayClock {
    ticks: u32,
}

impl DecayClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one tick and return the denominator to use for it
    pub fn advance(&mut self) -> u32 {
        if self.ticks < DECAY_MAX_TICKS {
            self.ticks += 1;
        }
        self.ticks
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

/// Spawn the decay task (one rescale per `DECAY_INTERVAL`)
pub fn spawn_decay_task(aggregator: Arc<Aggregator>) -> TaskHandle {
    spawn_decay_task_with_interval(aggregator, DECAY_INTERVAL)
}

pub fn spawn_decay_task_with_interval(aggregator: Arc<Aggregator>, period: Duration) -> TaskHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        log::info!("🌡️  Decay task started (interval: {}ms)", period.as_millis());

        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick of a tokio interval completes immediately
        timer.tick().await;

        let mut clock = DecayClock::new();
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let ticks = clock.advance();
                    aggregator.rescale_decay(ticks);
                    log::trace!("decay tick {} over {} entries", ticks, aggregator.len());
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }

        log::info!("Decay task stopped");
    });

    TaskHandle {
        name: "decay",
        shutdown_tx,
        handle,
    }
}

/// Spawn the purge task, evicting low-ranked entries every `period`
///
/// Meant to share the display refresh interval.
pub fn spawn_purge_task(aggregator: Arc<Aggregator>, period: Duration) -> TaskHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        log::info!(
            "🧹 Purge task started (interval: {}ms, keep: {}, by: {})",
            period.as_millis(),
            aggregator.max_len(),
            aggregator.purge_method()
        );

        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if aggregator.purge() {
                        log::debug!("Purge pass evicted entries, {} remain", aggregator.len());
                    }
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }

        log::info!("Purge task stopped");
    });

    TaskHandle {
        name: "purge",
        shutdown_tx,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::{AggregatorConfig, MaxLen};
    use crate::pipeline::metric::Metric;

    #[test]
    fn test_decay_clock_saturates() {
        let mut clock = DecayClock::new();
        assert_eq!(clock.ticks(), 0);
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);

        for _ in 0..100 {
            clock.advance();
        }
        assert_eq!(clock.ticks(), DECAY_MAX_TICKS);
        assert_eq!(clock.advance(), DECAY_MAX_TICKS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decay_task_rescales_each_second() {
        let agg = Arc::new(Aggregator::new(AggregatorConfig::default()));
        agg.ingest("a", 1.0);

        let task = spawn_decay_task(agg.clone());

        // Let the task reach its first real tick
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let after_one = (1.0 / 3.0 - 1.0) / 1.0;
        assert!((agg.get("a").unwrap().decay - after_one).abs() < 1e-12);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let after_two = (1.0 / 3.0 - after_one) / 2.0;
        assert!((agg.get("a").unwrap().decay - after_two).abs() < 1e-12);

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_task_trims_table() {
        let config = AggregatorConfig {
            sort_order: Metric::Sum,
            purge_method: Metric::Sum,
            max_len: MaxLen::Bounded(3),
            top_n: 10,
        };
        let agg = Arc::new(Aggregator::new(config));
        for i in 0..10 {
            agg.ingest(&format!("label_{}", i), i as f64);
        }

        let task = spawn_purge_task(agg.clone(), Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(agg.len(), 3);
        for kept in ["label_9", "label_8", "label_7"] {
            assert!(agg.get(kept).is_some());
        }

        task.stop().await;
    }

    #[tokio::test]
    async fn test_stop_ends_task() {
        let agg = Arc::new(Aggregator::new(AggregatorConfig::default()));
        let decay = spawn_decay_task(agg.clone());
        let purge = spawn_purge_task(agg, Duration::from_millis(50));

        assert!(!decay.is_finished());
        tokio::time::timeout(Duration::from_secs(5), async {
            decay.stop().await;
            purge.stop().await;
        })
        .await
        .expect("background tasks did not stop");
    }
}
