//! Monitor runtime - ingestion and sweeping for one store

use crate::{Heartbeat, KillmailMonitor, MonitorStats, PollSource, QueueIdentity, RedisQClient, Result};
use killfeed_config::FeedConfig;
use killfeed_core::{Clock, KillDecoder, SystemClock};
use killfeed_store::{KillStore, SweepScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Running monitor; dropping it without [`MonitorHandle::shutdown`] also
/// stops both tasks, since the shutdown sender goes with it.
pub struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    ingest: JoinHandle<()>,
    sweep: JoinHandle<()>,
    monitor: Arc<KillmailMonitor>,
    store: Arc<KillStore>,
    queue_id: String,
}

impl MonitorHandle {
    /// Wire the RedisQ client, decoder and sweeper from `config` and start them
    pub fn spawn(
        config: &FeedConfig,
        store: Arc<KillStore>,
        heartbeat: Arc<dyn Heartbeat>,
    ) -> Result<Self> {
        let queue_id = match &config.queue_id {
            Some(id) => id.clone(),
            None => QueueIdentity::at_path(config.queue_id_path()).load_or_create()?,
        };

        let source = Arc::new(RedisQClient::from_config(config, &queue_id)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let decoder = KillDecoder::new(Arc::new(config.scaler()), clock.clone());

        tracing::info!(
            endpoint = %config.endpoint,
            queue_id = %queue_id,
            wait_secs = config.wait_secs,
            "starting kill monitor"
        );

        Ok(Self::spawn_with(
            source,
            decoder,
            store,
            heartbeat,
            clock,
            config.failure_cooldown(),
            config.sweep_interval(),
            queue_id,
        ))
    }

    /// Start with explicit collaborators
    #[allow(clippy::too_many_arguments)]
    pub fn spawn_with(
        source: Arc<dyn PollSource>,
        decoder: KillDecoder,
        store: Arc<KillStore>,
        heartbeat: Arc<dyn Heartbeat>,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
        sweep_interval: Duration,
        queue_id: String,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let monitor = Arc::new(KillmailMonitor::new(
            source,
            decoder,
            store.clone(),
            heartbeat,
            cooldown,
        ));
        let ingest = monitor.clone().spawn(shutdown_rx.clone());
        let sweep = SweepScheduler::new(store.clone(), clock, sweep_interval).spawn(shutdown_rx);

        Self {
            shutdown_tx,
            ingest,
            sweep,
            monitor,
            store,
            queue_id,
        }
    }

    pub fn store(&self) -> &Arc<KillStore> {
        &self.store
    }

    pub fn stats(&self) -> MonitorStats {
        self.monitor.stats()
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    pub fn nonce(&self) -> uuid::Uuid {
        self.monitor.nonce()
    }

    /// Signal both tasks and wait for them to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.ingest.await {
            tracing::warn!(error = %e, "ingestion task ended abnormally");
        }
        if let Err(e) = self.sweep.await {
            tracing::warn!(error = %e, "sweep task ended abnormally");
        }

        tracing::info!("kill monitor shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::tests::{kill_42, ScriptedSource};
    use crate::ConnectionMonitor;
    use chrono::Utc;
    use killfeed_core::{ConstantScaler, ManualClock, RetentionPolicy};

    #[tokio::test]
    async fn test_ingest_then_age_out() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(KillStore::new(RetentionPolicy::new(1_000)));
        let connection = Arc::new(ConnectionMonitor::new(clock.clone()));
        let source = ScriptedSource::new(vec![Ok(Some(kill_42())), Ok(None)]);
        let decoder = KillDecoder::new(Arc::new(ConstantScaler(1.0)), clock.clone());

        let handle = MonitorHandle::spawn_with(
            source.clone(),
            decoder,
            store.clone(),
            connection.clone(),
            clock.clone(),
            Duration::from_millis(10),
            Duration::from_millis(10),
            "zkbmap-test".to_string(),
        );

        source.wait_for_calls(3).await;
        assert!(handle.store().get(42).await.is_some());
        assert_eq!(connection.ping_count(), 2);
        store.focus(42).await;

        clock.advance(chrono::Duration::seconds(2));
        tokio::time::timeout(Duration::from_secs(2), async {
            while !store.is_empty().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("kill was not swept");
        assert!(store.focused().await.is_none());

        let stats = handle.stats();
        assert_eq!(stats.kills, 1);
        assert_eq!(stats.empty_ticks, 1);
        assert_eq!(handle.queue_id(), "zkbmap-test");

        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("shutdown hung");
    }

    #[tokio::test]
    async fn test_spawn_from_config_uses_identity_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = FeedConfig {
            queue_id_path: Some(dir.path().join("queue_id")),
            // unroutable; every poll fails fast and cools down
            endpoint: "http://127.0.0.1:9/listen.php".to_string(),
            failure_cooldown_ms: 50,
            ..FeedConfig::default()
        };
        let store = Arc::new(KillStore::new(config.retention_policy()));
        let heartbeat: Arc<dyn Heartbeat> = Arc::new(|| {});

        let handle = MonitorHandle::spawn(&config, store, heartbeat).unwrap();
        let stored = QueueIdentity::at_path(config.queue_id_path()).load().unwrap();
        assert_eq!(stored.as_deref(), Some(handle.queue_id()));

        tokio::time::timeout(Duration::from_secs(2), handle.shutdown())
            .await
            .expect("shutdown hung");
    }
}
