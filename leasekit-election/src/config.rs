//! Election configuration and lifecycle callbacks.

use crate::errors::{ElectionError, ElectionResult};
use futures_util::future::BoxFuture;
use leasekit_core::ResourceLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Randomization factor applied to the retry period while acquiring.
///
/// Also the margin the renew timeout must clear over the retry period:
/// a renew round must fit at least one worst-case-jittered retry.
pub const JITTER_FACTOR: f64 = 1.2;

/// Invoked once leadership is gained, spawned fire-and-forget.
///
/// Receives the leader-scoped cancellation channel: it reads `true` (or
/// closes) as soon as leadership is lost or the election shuts down, and
/// the callback is expected to watch it and wind down its leader-only
/// work. The elector never awaits or observes the callback's outcome.
pub type StartedLeadingFn =
    Arc<dyn Fn(watch::Receiver<bool>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Invoked synchronously when [`run`](crate::LeaderElector::run) returns,
/// on every exit path.
pub type StoppedLeadingFn = Arc<dyn Fn() + Send + Sync>;

/// Invoked with the newly observed holder identity, spawned
/// fire-and-forget. Dispatches are independent: no ordering is guaranteed
/// between invocations or against other callbacks.
pub type NewLeaderFn = Arc<dyn Fn(String) + Send + Sync>;

/// Lifecycle hooks fired as leadership changes. All optional.
#[derive(Clone, Default)]
pub struct ElectionCallbacks {
    pub on_started_leading: Option<StartedLeadingFn>,
    pub on_stopped_leading: Option<StoppedLeadingFn>,
    pub on_new_leader: Option<NewLeaderFn>,
}

/// What to do when a panic escapes the election loop or its callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicPolicy {
    /// Log the panic, then resume unwinding
    #[default]
    Propagate,

    /// Log the panic and swallow it; `run` returns normally
    LogOnly,
}

/// Parameters for one candidate's participation in an election.
///
/// Timing invariants are checked by [`validate`](ElectionConfig::validate)
/// (called from [`LeaderElector::new`](crate::LeaderElector::new)):
///
/// - `lease_duration > renew_timeout`, so a leader that merely missed one
///   renew deadline has abdicated before anyone else treats the lease as
///   expired
/// - `renew_timeout > retry_period * JITTER_FACTOR`
/// - all three durations strictly positive
#[derive(Clone)]
pub struct ElectionConfig {
    /// Backend holding the lease record
    pub lock: Arc<dyn ResourceLock>,

    /// How long a non-renewing holder's claim remains valid
    pub lease_duration: Duration,

    /// Deadline for the current holder to finish a renewal round trip
    /// before it must assume it lost leadership
    pub renew_timeout: Duration,

    /// Spacing between acquire/renew attempts
    pub retry_period: Duration,

    /// Lifecycle hooks
    pub callbacks: ElectionCallbacks,

    /// Voluntarily clear the lease on shutdown instead of letting it
    /// expire passively
    pub release_on_cancel: bool,

    /// Diagnostic label for logs and events
    pub name: String,

    /// Recovery policy for panics caught by the run loop's barrier
    pub panic_policy: PanicPolicy,
}

impl ElectionConfig {
    /// Config with conventional timings: 15s lease, 10s renew timeout,
    /// 2s retry period.
    pub fn new(lock: Arc<dyn ResourceLock>) -> Self {
        Self {
            lock,
            lease_duration: Duration::from_secs(15),
            renew_timeout: Duration::from_secs(10),
            retry_period: Duration::from_secs(2),
            callbacks: ElectionCallbacks::default(),
            release_on_cancel: false,
            name: "leader-election".to_string(),
            panic_policy: PanicPolicy::default(),
        }
    }

    /// Check the timing invariants. Every violation is a hard
    /// construction error; no election is attempted on a bad config.
    pub fn validate(&self) -> ElectionResult<()> {
        if self.lease_duration.is_zero() {
            return Err(ElectionError::invalid_config(
                "lease_duration must be greater than zero",
            ));
        }
        if self.renew_timeout.is_zero() {
            return Err(ElectionError::invalid_config(
                "renew_timeout must be greater than zero",
            ));
        }
        if self.retry_period.is_zero() {
            return Err(ElectionError::invalid_config(
                "retry_period must be greater than zero",
            ));
        }
        if self.lease_duration <= self.renew_timeout {
            return Err(ElectionError::invalid_config(
                "lease_duration must be greater than renew_timeout",
            ));
        }
        if self.renew_timeout.as_secs_f64() <= self.retry_period.as_secs_f64() * JITTER_FACTOR {
            return Err(ElectionError::invalid_config(format!(
                "renew_timeout must be greater than retry_period * {}",
                JITTER_FACTOR
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ElectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElectionConfig")
            .field("lock", &self.lock.describe())
            .field("lease_duration", &self.lease_duration)
            .field("renew_timeout", &self.renew_timeout)
            .field("retry_period", &self.retry_period)
            .field("release_on_cancel", &self.release_on_cancel)
            .field("name", &self.name)
            .field("panic_policy", &self.panic_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leasekit_testing::NullLock;

    fn base() -> ElectionConfig {
        ElectionConfig::new(Arc::new(NullLock::new("node-a")))
    }

    #[test]
    fn conventional_timings_are_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn lease_duration_must_exceed_renew_timeout() {
        let mut config = base();
        config.lease_duration = config.renew_timeout;
        assert!(matches!(
            config.validate(),
            Err(ElectionError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn renew_timeout_must_clear_jittered_retry_period() {
        let mut config = base();
        // 2s * 1.2 = 2.4s, so a 2.4s renew timeout is one tick too tight
        config.renew_timeout = Duration::from_millis(2400);
        config.lease_duration = Duration::from_secs(15);
        assert!(config.validate().is_err());

        config.renew_timeout = Duration::from_millis(2401);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_durations_are_rejected() {
        for field in 0..3 {
            let mut config = base();
            match field {
                0 => config.lease_duration = Duration::ZERO,
                1 => config.renew_timeout = Duration::ZERO,
                _ => config.retry_period = Duration::ZERO,
            }
            assert!(config.validate().is_err());
        }
    }
}
