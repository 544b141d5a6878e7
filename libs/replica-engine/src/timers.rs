use std::collections::BTreeMap;

use replica_api::CanisterId;

/// A timer callback waiting for its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    pub canister: CanisterId,
    pub deadline_nanos: u64,
    pub tag: String,
}

/// Pending timers of all canisters, ordered by deadline, then by scheduling order.
#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: BTreeMap<(u64, u64), Timer>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, canister: CanisterId, deadline_nanos: u64, tag: impl Into<String>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            (deadline_nanos, seq),
            Timer { canister, deadline_nanos, tag: tag.into() },
        );
    }

    /// Remove and return the earliest timer whose deadline is at or before `now_nanos`.
    pub fn pop_due(&mut self, now_nanos: u64) -> Option<Timer> {
        let entry = self.entries.first_entry()?;
        if entry.key().0 > now_nanos {
            return None;
        }
        Some(entry.remove())
    }

    /// Drop every pending timer of `canister`. Returns how many were dropped.
    pub fn clear_canister(&mut self, canister: CanisterId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, timer| timer.canister != canister);
        before - self.entries.len()
    }

    pub fn pending_for(&self, canister: CanisterId) -> usize {
        self.entries.values().filter(|t| t.canister == canister).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
