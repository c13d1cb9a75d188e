//! Kill store - the live working set
//!
//! All mutations take the write lock for their full duration, so a reader
//! either sees a sweep's complete effect or none of it.

use chrono::{DateTime, Utc};
use killfeed_core::{KillId, KillRecord, RetentionPolicy};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<KillId, KillRecord>,
    /// Weak reference by id; cleared whenever the id leaves `records`
    focused: Option<KillId>,
}

impl StoreState {
    fn focused_record(&self) -> Option<&KillRecord> {
        self.focused.and_then(|id| self.records.get(&id))
    }
}

/// Point-in-time view of the store
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub records: HashMap<KillId, KillRecord>,
    pub focused: Option<KillRecord>,
}

impl StoreSnapshot {
    /// Records ordered by scaled value, highest first
    pub fn ranked(&self) -> Vec<&KillRecord> {
        let mut ranked: Vec<_> = self.records.values().collect();
        ranked.sort_by(|a, b| {
            b.scaled_value
                .total_cmp(&a.scaled_value)
                .then_with(|| b.received_at.cmp(&a.received_at))
        });
        ranked
    }
}

/// Outcome of one retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: Vec<KillId>,
    pub remaining: usize,
    pub focus_cleared: bool,
}

/// Concurrent keyed store of live kills
#[derive(Debug)]
pub struct KillStore {
    state: RwLock<StoreState>,
    policy: RetentionPolicy,
}

impl Default for KillStore {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

impl KillStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            policy,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Upsert by id. Returns true if an existing record was replaced.
    pub async fn insert(&self, record: KillRecord) -> bool {
        let mut state = self.state.write().await;
        state.records.insert(record.id, record).is_some()
    }

    /// Drop every record the policy no longer keeps
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut state = self.state.write().await;

        let mut evicted = Vec::new();
        let policy = self.policy;
        state.records.retain(|id, record| {
            let keep = policy.keep(now, record);
            if !keep {
                evicted.push(*id);
            }
            keep
        });

        let focus_cleared = state
            .focused
            .is_some_and(|id| !state.records.contains_key(&id));
        if focus_cleared {
            state.focused = None;
        }

        SweepReport {
            evicted,
            remaining: state.records.len(),
            focus_cleared,
        }
    }

    /// Focus the record stored under `id`; an unknown id leaves nothing focused.
    /// Returns whether a record is now focused.
    pub async fn focus(&self, id: KillId) -> bool {
        let mut state = self.state.write().await;
        let focused = state.records.contains_key(&id).then_some(id);
        state.focused = focused;
        focused.is_some()
    }

    /// Clear focus only if `id` is the one focused.
    /// Returns whether focus was cleared.
    pub async fn unfocus(&self, id: KillId) -> bool {
        let mut state = self.state.write().await;
        if state.focused == Some(id) {
            state.focused = None;
            true
        } else {
            false
        }
    }

    pub async fn focused(&self) -> Option<KillRecord> {
        self.state.read().await.focused_record().cloned()
    }

    pub async fn get(&self, id: KillId) -> Option<KillRecord> {
        self.state.read().await.records.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }

    /// Records and focus captured under one read lock
    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read().await;
        StoreSnapshot {
            records: state.records.clone(),
            focused: state.focused_record().cloned(),
        }
    }
}
