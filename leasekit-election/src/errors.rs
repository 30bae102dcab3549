//! Error types for election configuration and health checks.

use thiserror::Error;

/// Result type for election operations
pub type ElectionResult<T> = Result<T, ElectionError>;

/// Errors surfaced by the elector.
///
/// Transient storage failures never appear here: they only make an
/// individual acquire/renew attempt fail, which the retry loops absorb
/// and log. The caller sees leadership purely through callbacks, the
/// read accessors, and the [`check`](crate::LeaderElector::check) probe.
#[derive(Error, Debug)]
pub enum ElectionError {
    /// The election configuration violated a timing invariant
    #[error("invalid election config: {reason}")]
    InvalidConfig { reason: String },

    /// This process believes it leads, but the renew loop has not
    /// refreshed its observation within tolerance; it may be stuck
    #[error(
        "election '{name}' renewal is stalled: last observation is {observed_age_ms}ms old, tolerance is {tolerance_ms}ms"
    )]
    RenewalStalled {
        name: String,
        observed_age_ms: u64,
        tolerance_ms: u64,
    },
}

impl ElectionError {
    /// Create an invalid-config error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        ElectionError::InvalidConfig {
            reason: reason.into(),
        }
    }
}
