//! # Killfeed Core
//!
//! Canonical kill records and the value-scaled retention rule that decides
//! how long each one stays in the live working set.
//!
//! ## The Retention Model
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  wire package ──parse──► KillRecord { received_at, scaled }  │
//! │                                                              │
//! │  keep(now, r)  ⇔  now - r.received_at < base × r.scaled      │
//! │                                                              │
//! │  1M ISK frigate   ~ 49s      10B ISK titan   ~ 5min          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - Every record is stamped locally when it is decoded
//! - Scaling is a pluggable collaborator ([`Scaler`])
//! - Time comes from a [`Clock`] so aging is testable

pub mod clock;
pub mod record;
pub mod retention;
pub mod scale;

pub use clock::{Clock, ManualClock, SystemClock};
pub use record::{default_reference_url, KillDecoder, KillId, KillRecord, Position};
pub use retention::RetentionPolicy;
pub use scale::{ConstantScaler, LogScaler, Scaler};

/// Result type for killfeed-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding kill payloads
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed event: missing or invalid `{field}`: {reason}")]
    MalformedEvent { field: &'static str, reason: String },
}

impl Error {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Error::MalformedEvent {
            field,
            reason: reason.into(),
        }
    }
}
