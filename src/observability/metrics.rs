//! Staging metrics
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Relaxed atomics; exactness per counter, not across counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    version_writes: AtomicU64,
    publishes: AtomicU64,
    live_removals: AtomicU64,
    unpublishes: AtomicU64,
    archives: AtomicU64,
    reverts: AtomicU64,
    rollbacks: AtomicU64,
    syncs: AtomicU64,
    changeset_publishes: AtomicU64,
    changeset_reverts: AtomicU64,
    rejected_operations: AtomicU64,
    rolled_back_transactions: AtomicU64,
    state_saves: AtomicU64,
}

macro_rules! counter {
    ($field:ident, $incr:ident) => {
        pub fn $incr(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        pub fn $field(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(version_writes, increment_version_writes);
    counter!(publishes, increment_publishes);
    counter!(live_removals, increment_live_removals);
    counter!(unpublishes, increment_unpublishes);
    counter!(archives, increment_archives);
    counter!(reverts, increment_reverts);
    counter!(rollbacks, increment_rollbacks);
    counter!(syncs, increment_syncs);
    counter!(changeset_publishes, increment_changeset_publishes);
    counter!(changeset_reverts, increment_changeset_reverts);
    counter!(rejected_operations, increment_rejected_operations);
    counter!(rolled_back_transactions, increment_rolled_back_transactions);
    counter!(state_saves, increment_state_saves);

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            version_writes: self.version_writes(),
            publishes: self.publishes(),
            live_removals: self.live_removals(),
            unpublishes: self.unpublishes(),
            archives: self.archives(),
            reverts: self.reverts(),
            rollbacks: self.rollbacks(),
            syncs: self.syncs(),
            changeset_publishes: self.changeset_publishes(),
            changeset_reverts: self.changeset_reverts(),
            rejected_operations: self.rejected_operations(),
            rolled_back_transactions: self.rolled_back_transactions(),
            state_saves: self.state_saves(),
        }
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub version_writes: u64,
    pub publishes: u64,
    pub live_removals: u64,
    pub unpublishes: u64,
    pub archives: u64,
    pub reverts: u64,
    pub rollbacks: u64,
    pub syncs: u64,
    pub changeset_publishes: u64,
    pub changeset_reverts: u64,
    pub rejected_operations: u64,
    pub rolled_back_transactions: u64,
    pub state_saves: u64,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
