//! Kill ingestion loop
//!
//! Polls forever until cancelled. Failures are logged and cooled down,
//! never returned.

use crate::{Heartbeat, PollSource, Result};
use killfeed_core::{KillDecoder, KillId};
use killfeed_store::KillStore;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// What one poll cycle produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Kill decoded and stored
    Delivered { id: KillId, replaced: bool },
    /// Server wait elapsed with nothing queued
    EmptyTick,
    /// Package arrived but lacked identity fields; dropped
    Dropped,
    /// Network, status or envelope failure; cool down before the next poll
    TransientFailure,
}

#[derive(Debug, Default)]
struct Counters {
    polls: AtomicU64,
    kills: AtomicU64,
    empty_ticks: AtomicU64,
    dropped: AtomicU64,
    failures: AtomicU64,
}

/// Monitor statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub polls: u64,
    pub kills: u64,
    pub empty_ticks: u64,
    pub dropped: u64,
    pub failures: u64,
}

/// Long-poll ingestion into a [`KillStore`]
pub struct KillmailMonitor {
    /// Identifies this loop instance in logs for its whole life
    nonce: Uuid,
    source: Arc<dyn PollSource>,
    decoder: KillDecoder,
    store: Arc<KillStore>,
    heartbeat: Arc<dyn Heartbeat>,
    cooldown: Duration,
    counters: Counters,
}

impl KillmailMonitor {
    pub fn new(
        source: Arc<dyn PollSource>,
        decoder: KillDecoder,
        store: Arc<KillStore>,
        heartbeat: Arc<dyn Heartbeat>,
        cooldown: Duration,
    ) -> Self {
        Self {
            nonce: Uuid::new_v4(),
            source,
            decoder,
            store,
            heartbeat,
            cooldown,
            counters: Counters::default(),
        }
    }

    pub fn nonce(&self) -> Uuid {
        self.nonce
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            polls: self.counters.polls.load(Ordering::Relaxed),
            kills: self.counters.kills.load(Ordering::Relaxed),
            empty_ticks: self.counters.empty_ticks.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// One poll and its effects, without the failure cooldown
    pub async fn poll_once(&self) -> PollOutcome {
        let result = self.source.poll().await;
        self.apply(result).await
    }

    /// Poll until `shutdown` flips to true or its sender is dropped.
    ///
    /// Cancellation drops the in-flight request and cuts any cooldown short.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(nonce = %self.nonce, "kill monitor started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = tokio::select! {
                biased;
                _ = cancelled(&mut shutdown) => break,
                result = self.source.poll() => result,
            };

            if self.apply(result).await == PollOutcome::TransientFailure {
                tokio::select! {
                    biased;
                    _ = cancelled(&mut shutdown) => break,
                    _ = tokio::time::sleep(self.cooldown) => {}
                }
            }
        }

        tracing::info!(nonce = %self.nonce, stats = ?self.stats(), "kill monitor stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn apply(&self, result: Result<Option<serde_json::Value>>) -> PollOutcome {
        self.counters.polls.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(Some(package)) => match self.decoder.decode(package) {
                Ok(record) => {
                    let id = record.id;
                    let replaced = self.store.insert(record).await;
                    self.counters.kills.fetch_add(1, Ordering::Relaxed);
                    self.heartbeat.ping();
                    tracing::debug!(nonce = %self.nonce, kill_id = id, replaced, "kill received");
                    PollOutcome::Delivered { id, replaced }
                }
                Err(e) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(nonce = %self.nonce, error = %e, "dropping malformed kill");
                    PollOutcome::Dropped
                }
            },
            Ok(None) => {
                self.counters.empty_ticks.fetch_add(1, Ordering::Relaxed);
                self.heartbeat.ping();
                tracing::trace!(nonce = %self.nonce, "empty tick");
                PollOutcome::EmptyTick
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    nonce = %self.nonce,
                    error = %e,
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "poll failed"
                );
                PollOutcome::TransientFailure
            }
        }
    }
}

/// Resolves once shutdown is requested or the sender is gone
pub(crate) async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
