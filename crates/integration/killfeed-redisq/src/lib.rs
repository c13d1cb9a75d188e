//! # Killfeed RedisQ
//!
//! Long-poll ingestion from the zKillboard RedisQ endpoint.
//!
//! ```text
//!            ┌─────────── Delivered ──── decode ─► insert ─► ping ──┐
//!            │                                                      │
//! Polling ───┼─────────── EmptyTick ───────────────────────► ping ──┼──► Polling
//!            │                                                      │
//!            └─────────── TransientFailure ──► cooldown ────────────┘
//!
//! shutdown signal ─► Cancelled (checked at loop top, aborts in-flight poll)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use killfeed_redisq::MonitorHandle;
//!
//! let handle = MonitorHandle::spawn(&config, store, heartbeat)?;
//! // ...
//! handle.shutdown().await;
//! ```

pub mod client;
pub mod heartbeat;
pub mod identity;
pub mod monitor;
pub mod runtime;

pub use client::{PollSource, RedisQClient};
pub use heartbeat::{ConnectionMonitor, Heartbeat};
pub use identity::QueueIdentity;
pub use monitor::{KillmailMonitor, MonitorStats, PollOutcome};
pub use runtime::MonitorHandle;

/// Result type for RedisQ operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from RedisQ operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the poll loop should cool down and retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::TransientNetwork(_) | Error::Status(_) | Error::MalformedEnvelope(_)
        )
    }
}
