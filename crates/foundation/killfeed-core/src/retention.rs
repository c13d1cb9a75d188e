//! Value-scaled retention rule

use crate::KillRecord;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default base retention for a record with multiplier 1.0
pub const DEFAULT_BASE_RETENTION_MS: u64 = 45_000;

/// Keeps a record while `now - received_at < base × scaled_value`.
///
/// Evaluated fresh on every sweep; nothing is cached at insert time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub base_retention_ms: u64,
}

impl RetentionPolicy {
    pub fn new(base_retention_ms: u64) -> Self {
        Self { base_retention_ms }
    }

    /// Lifetime granted to `record`, in milliseconds
    pub fn lifetime_ms(&self, record: &KillRecord) -> f64 {
        self.base_retention_ms as f64 * record.scaled_value
    }

    pub fn keep(&self, now: DateTime<Utc>, record: &KillRecord) -> bool {
        elapsed_ms(now, record.received_at) < self.lifetime_ms(record)
    }

    /// Instant from which `keep` turns false
    pub fn expires_at(&self, record: &KillRecord) -> DateTime<Utc> {
        let micros = (self.lifetime_ms(record) * 1000.0).clamp(0.0, i64::MAX as f64) as i64;
        record.received_at + Duration::microseconds(micros)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_RETENTION_MS)
    }
}

fn elapsed_ms(now: DateTime<Utc>, since: DateTime<Utc>) -> f64 {
    let delta = now - since;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1000.0,
        None => delta.num_milliseconds() as f64,
    }
}
