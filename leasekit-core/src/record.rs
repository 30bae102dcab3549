//! The lease record stored in the backing store.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time as milliseconds since the Unix epoch.
///
/// Used only to stamp records for observers; lease expiry math never reads
/// wall-clock timestamps out of a record, so candidates tolerate arbitrary
/// clock offsets between each other.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// The lease payload: who holds leadership, for how long a non-renewing
/// claim stays valid, and how often leadership has changed hands.
///
/// The record is created once by whichever candidate wins the initial
/// `create` race and afterwards replaced wholesale on every renewal or
/// takeover. It is never deleted by the election core; reclaiming the slot
/// happens by expiry or by a voluntary release that clears the holder.
///
/// The embedded timestamps are informational. They let an operator see
/// when the current term started and when the holder last renewed, but no
/// candidate compares them against its own clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Identity of the current holder; empty means the lease is unheld,
    /// was voluntarily released, or was never acquired
    pub holder_identity: String,

    /// How long a claim by a holder that has stopped renewing remains
    /// valid, in milliseconds
    pub lease_duration_ms: u64,

    /// When the current holder first acquired the lease (epoch millis);
    /// stable across renewals, advances only when the holder changes
    pub acquire_time_ms: u64,

    /// When the lease was last successfully renewed (epoch millis)
    pub renew_time_ms: u64,

    /// Incremented by exactly one each time the holder identity changes;
    /// untouched by renewals
    pub leader_transitions: u32,
}

impl LeaseRecord {
    /// Build a fresh first-term candidate record for the given holder.
    pub fn new(holder_identity: impl Into<String>, lease_duration: Duration) -> Self {
        let now = now_millis();
        Self {
            holder_identity: holder_identity.into(),
            lease_duration_ms: lease_duration.as_millis() as u64,
            acquire_time_ms: now,
            renew_time_ms: now,
            leader_transitions: 0,
        }
    }

    /// Returns true if the record names a holder.
    pub fn is_held(&self) -> bool {
        !self.holder_identity.is_empty()
    }

    /// Returns true if the record names `identity` as the holder.
    pub fn is_held_by(&self, identity: &str) -> bool {
        !self.holder_identity.is_empty() && self.holder_identity == identity
    }
}
