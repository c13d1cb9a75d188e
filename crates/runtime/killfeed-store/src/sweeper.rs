//! Periodic retention sweeps
//!
//! Runs on its own timer so records keep aging out while ingestion is
//! stalled or backing off.

use crate::KillStore;
use killfeed_core::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Drives [`KillStore::sweep`] on a fixed period
pub struct SweepScheduler {
    store: Arc<KillStore>,
    clock: Arc<dyn Clock>,
    period: Duration,
}

impl SweepScheduler {
    pub fn new(store: Arc<KillStore>, clock: Arc<dyn Clock>, period: Duration) -> Self {
        Self {
            store,
            clock,
            period,
        }
    }

    /// Sweep until `shutdown` flips to true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(period_ms = self.period.as_millis() as u64, "sweep scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.store.sweep(self.clock.now()).await;
                    if !report.evicted.is_empty() {
                        tracing::info!(
                            evicted = report.evicted.len(),
                            remaining = report.remaining,
                            focus_cleared = report.focus_cleared,
                            "retention sweep"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("sweep scheduler stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use killfeed_core::{KillRecord, ManualClock, RetentionPolicy};

    fn kill(id: u64, received_at: DateTime<Utc>) -> KillRecord {
        KillRecord {
            id,
            occurred_at: received_at,
            received_at,
            actor_id: 1,
            group_id: 1,
            alliance_id: None,
            category_id: 1,
            location_id: 1,
            position: None,
            reference_url: killfeed_core::default_reference_url(id),
            raw_value: 0.0,
            scaled_value: 1.0,
            npc: false,
            solo: false,
        }
    }

    #[tokio::test]
    async fn test_sweeps_on_period() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let store = Arc::new(KillStore::new(RetentionPolicy::new(1_000)));
        store.insert(kill(1, t0)).await;

        let (tx, rx) = watch::channel(false);
        let handle =
            SweepScheduler::new(store.clone(), clock.clone(), Duration::from_millis(10)).spawn(rx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.len().await, 1);

        clock.advance(chrono::Duration::seconds(2));
        let mut waited = 0;
        while !store.is_empty().await && waited < 100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert!(store.is_empty().await);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stops_when_sender_dropped() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(KillStore::default());

        let (tx, rx) = watch::channel(false);
        let handle = SweepScheduler::new(store, clock, Duration::from_secs(60)).spawn(rx);
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
