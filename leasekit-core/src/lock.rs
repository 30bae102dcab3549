//! The contract between the elector and the durable store holding the lease.

use crate::record::LeaseRecord;
use crate::LockResult;
use async_trait::async_trait;

/// Storage backend for one lease slot.
///
/// Implementations wrap whatever coordination substrate is available, for
/// example a key in a strongly consistent key-value store or an annotation
/// on a cluster object. The elector is backend-agnostic: it calls exactly
/// these operations and nothing else.
///
/// The elector passes no version token to `update`. If an implementation
/// wants to reject writes based on stale reads it must enforce optimistic
/// concurrency itself, e.g. by remembering the version it served from
/// `get`. The election core provides no fencing either way: a deposed
/// leader may keep believing it holds the lease until its next renewal
/// round trip fails.
///
/// Calls are cancelled by dropping the returned future; the elector bounds
/// renewal round trips with a deadline and imposes no other timeout.
#[async_trait]
pub trait ResourceLock: Send + Sync {
    /// Fetch the current lease record together with its raw encoded bytes.
    ///
    /// The raw bytes are used by the elector for cheap change detection,
    /// so they must be byte-stable for an unchanged record. Return
    /// [`LockError::NotFound`](crate::LockError::NotFound) when no record
    /// exists; the elector treats every error here as "no record, attempt
    /// to create".
    async fn get(&self) -> LockResult<(LeaseRecord, Vec<u8>)>;

    /// Atomically create the record if and only if none exists.
    ///
    /// Must fail when a record is already present. Initial-acquisition
    /// races between candidates are decided entirely by this operation.
    async fn create(&self, record: &LeaseRecord) -> LockResult<()>;

    /// Replace the record wholesale. There are no partial updates.
    async fn update(&self, record: &LeaseRecord) -> LockResult<()>;

    /// Best-effort diagnostic sink. No delivery guarantee, side effect only.
    fn record_event(&self, name: &str, event: &str);

    /// This candidate's stable self-identifier, used to recognize
    /// self-held leases.
    fn identity(&self) -> String;

    /// Human-readable label for logs.
    fn describe(&self) -> String;
}
