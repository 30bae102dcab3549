//! Error types for resource lock operations.

use thiserror::Error;

/// Result type for resource lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Errors that can occur while reading or writing the lease record.
///
/// The elector treats every `get` failure, `NotFound` included, as "no
/// record exists yet" and falls back to `create`. Write failures only
/// cause the current acquire/renew attempt to be retried later, so lock
/// implementations should map their storage errors here without worrying
/// about retry policy.
#[derive(Error, Debug)]
pub enum LockError {
    /// No lease record exists in the backing store
    #[error("lease record not found")]
    NotFound,

    /// A lease record already exists, so an atomic create was rejected
    #[error("lease record already exists")]
    AlreadyExists,

    /// The store rejected an update against a stale read
    #[error("lease record update conflict: {reason}")]
    Conflict { reason: String },

    /// The backing store could not be reached or failed internally
    #[error("lock backend error: {reason}")]
    Backend { reason: String },
}

impl LockError {
    /// Create a conflict error with the given reason.
    pub fn conflict(reason: impl Into<String>) -> Self {
        LockError::Conflict {
            reason: reason.into(),
        }
    }

    /// Create a backend error with the given reason.
    pub fn backend(reason: impl Into<String>) -> Self {
        LockError::Backend {
            reason: reason.into(),
        }
    }

    /// Returns true if the error means no record exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LockError::NotFound)
    }

    /// Returns true if retrying the same operation later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::Conflict { .. } | LockError::Backend { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability() {
        assert!(LockError::backend("connection refused").is_retryable());
        assert!(LockError::conflict("stale resource version").is_retryable());
        assert!(!LockError::NotFound.is_retryable());
        assert!(!LockError::AlreadyExists.is_retryable());
        assert!(LockError::NotFound.is_not_found());
    }
}
