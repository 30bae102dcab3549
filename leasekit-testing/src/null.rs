//! An always-follower lock.

use async_trait::async_trait;
use leasekit_core::{LeaseRecord, LockError, LockResult, ResourceLock};

/// A lock that can never be held.
///
/// `get` always reports that no record exists and both writes always fail,
/// so a candidate driving this lock stays a follower forever. Useful for
/// exercising the acquire loop without a real backend.
pub struct NullLock {
    identity: String,
}

impl NullLock {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

#[async_trait]
impl ResourceLock for NullLock {
    async fn get(&self) -> LockResult<(LeaseRecord, Vec<u8>)> {
        Err(LockError::NotFound)
    }

    async fn create(&self, _record: &LeaseRecord) -> LockResult<()> {
        Err(LockError::backend("null lock cannot hold a lease"))
    }

    async fn update(&self, _record: &LeaseRecord) -> LockResult<()> {
        Err(LockError::backend("null lock cannot hold a lease"))
    }

    fn record_event(&self, _name: &str, _event: &str) {}

    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn describe(&self) -> String {
        "null lock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn never_holds_anything() {
        let lock = NullLock::new("a");
        assert!(lock.get().await.unwrap_err().is_not_found());
        let record = LeaseRecord::new("a", Duration::from_secs(5));
        assert!(lock.create(&record).await.is_err());
        assert!(lock.update(&record).await.is_err());
        assert_eq!(lock.identity(), "a");
    }
}
