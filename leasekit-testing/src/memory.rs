//! In-memory lease slot with failure injection.

use async_trait::async_trait;
use leasekit_core::{LeaseRecord, LockError, LockResult, ResourceLock};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct StoreInner {
    slot: Option<(LeaseRecord, Vec<u8>)>,
    events: Vec<String>,
    fail_gets: bool,
    fail_creates: bool,
    fail_updates: bool,
}

/// A single shared lease slot held in process memory.
///
/// `create` is atomic create-if-absent and `update` is last-write-wins,
/// which is exactly the (non-fencing) contract the elector assumes of a
/// real backend. Hand each racing candidate its own [`InMemoryLock`]
/// handle over one store via [`lock_for`](InMemoryLockStore::lock_for).
///
/// Failure injection flips individual operations into backend errors so
/// tests can simulate an unreachable store without touching the elector.
pub struct InMemoryLockStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryLockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(StoreInner::default()),
        })
    }

    /// Bind a candidate identity to this store.
    pub fn lock_for(self: &Arc<Self>, identity: impl Into<String>) -> InMemoryLock {
        InMemoryLock {
            store: Arc::clone(self),
            identity: identity.into(),
        }
    }

    /// Snapshot of the stored record, if any.
    pub fn record(&self) -> Option<LeaseRecord> {
        self.inner.lock().slot.as_ref().map(|(record, _)| record.clone())
    }

    /// Seed the slot with a record, bypassing create-if-absent.
    pub fn put(&self, record: LeaseRecord) {
        let raw = encode(&record).expect("lease record must serialize");
        self.inner.lock().slot = Some((record, raw));
    }

    /// Everything recorded through `record_event`, oldest first.
    pub fn events(&self) -> Vec<String> {
        self.inner.lock().events.clone()
    }

    pub fn fail_gets(&self, fail: bool) {
        self.inner.lock().fail_gets = fail;
    }

    pub fn fail_creates(&self, fail: bool) {
        self.inner.lock().fail_creates = fail;
    }

    pub fn fail_updates(&self, fail: bool) {
        self.inner.lock().fail_updates = fail;
    }
}

fn encode(record: &LeaseRecord) -> LockResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| LockError::backend(e.to_string()))
}

/// One candidate's handle onto a shared [`InMemoryLockStore`].
pub struct InMemoryLock {
    store: Arc<InMemoryLockStore>,
    identity: String,
}

#[async_trait]
impl ResourceLock for InMemoryLock {
    async fn get(&self) -> LockResult<(LeaseRecord, Vec<u8>)> {
        let inner = self.store.inner.lock();
        if inner.fail_gets {
            return Err(LockError::backend("injected get failure"));
        }
        match &inner.slot {
            Some((record, raw)) => Ok((record.clone(), raw.clone())),
            None => Err(LockError::NotFound),
        }
    }

    async fn create(&self, record: &LeaseRecord) -> LockResult<()> {
        let raw = encode(record)?;
        let mut inner = self.store.inner.lock();
        if inner.fail_creates {
            return Err(LockError::backend("injected create failure"));
        }
        if inner.slot.is_some() {
            return Err(LockError::AlreadyExists);
        }
        inner.slot = Some((record.clone(), raw));
        Ok(())
    }

    async fn update(&self, record: &LeaseRecord) -> LockResult<()> {
        let raw = encode(record)?;
        let mut inner = self.store.inner.lock();
        if inner.fail_updates {
            return Err(LockError::backend("injected update failure"));
        }
        if inner.slot.is_none() {
            return Err(LockError::NotFound);
        }
        inner.slot = Some((record.clone(), raw));
        Ok(())
    }

    fn record_event(&self, name: &str, event: &str) {
        self.store
            .inner
            .lock()
            .events
            .push(format!("{}: {} {}", name, self.identity, event));
    }

    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn describe(&self) -> String {
        format!("in-memory lease slot ({})", self.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn create_is_atomic_create_if_absent() {
        let store = InMemoryLockStore::new();
        let a = store.lock_for("a");
        let b = store.lock_for("b");

        let record = LeaseRecord::new("a", Duration::from_secs(5));
        a.create(&record).await.unwrap();

        let loser = LeaseRecord::new("b", Duration::from_secs(5));
        assert!(matches!(
            b.create(&loser).await,
            Err(LockError::AlreadyExists)
        ));
        assert_eq!(store.record().unwrap().holder_identity, "a");
    }

    #[tokio::test]
    async fn raw_bytes_are_stable_for_unchanged_records() {
        let store = InMemoryLockStore::new();
        let lock = store.lock_for("a");
        lock.create(&LeaseRecord::new("a", Duration::from_secs(5)))
            .await
            .unwrap();

        let (_, raw1) = lock.get().await.unwrap();
        let (_, raw2) = lock.get().await.unwrap();
        assert_eq!(raw1, raw2);
    }

    #[tokio::test]
    async fn failure_injection_turns_operations_into_backend_errors() {
        let store = InMemoryLockStore::new();
        let lock = store.lock_for("a");
        store.fail_gets(true);
        assert!(matches!(
            lock.get().await,
            Err(LockError::Backend { .. })
        ));

        store.fail_gets(false);
        store.fail_creates(true);
        let record = LeaseRecord::new("a", Duration::from_secs(5));
        assert!(lock.create(&record).await.is_err());

        store.fail_creates(false);
        lock.create(&record).await.unwrap();
        store.fail_updates(true);
        assert!(lock.update(&record).await.is_err());
    }
}
