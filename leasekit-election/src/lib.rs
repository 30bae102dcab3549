//! # Leasekit Election
//!
//! Lease-based leader election for distributed services.
//!
//! One process among a set of candidates becomes the exclusive leader for
//! a lease slot, continuously renews its claim, detects loss of
//! leadership, and hands off gracefully. The durable store holding the
//! lease is pluggable behind the [`ResourceLock`] trait from
//! `leasekit-core`.
//!
//! This crate provides:
//!
//! - **ElectionConfig**: validated election timing plus lifecycle callbacks
//! - **LeaderElector**: the acquire/renew state machine
//! - **wait**: the cancellable, jittered retry-loop primitive
//! - **Error Handling**: construction and health-check error types
//!
//! # Guarantees, and the one deliberately missing
//!
//! Lease expiry is judged purely against the local clock of each
//! candidate, never against timestamps written by other candidates, so
//! arbitrary clock *offsets* between nodes are harmless. Clock *rate*
//! drift is tolerated only in proportion to the ratio of lease duration to
//! renew timeout. There is **no fencing**: a deposed leader may keep
//! acting as leader until its next renewal round trip fails, and the
//! backing store is trusted to serialize concurrent writes. Callers that
//! need mutual exclusion under partition must layer fencing on top.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use leasekit_election::{ElectionConfig, LeaderElector};
//! use leasekit_testing::InMemoryLockStore;
//! use tokio::sync::watch;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryLockStore::new();
//! let mut config = ElectionConfig::new(Arc::new(store.lock_for("node-a")));
//! config.lease_duration = Duration::from_secs(15);
//! config.renew_timeout = Duration::from_secs(10);
//! config.retry_period = Duration::from_secs(2);
//! config.release_on_cancel = true;
//!
//! let elector = LeaderElector::new(config)?;
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(async move {
//!     // blocks until leadership is lost or shutdown fires
//!     elector.run(shutdown_rx).await;
//! });
//! shutdown_tx.send(true)?;
//! handle.await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod elector;
pub mod errors;
pub mod wait;

pub use config::{
    ElectionCallbacks, ElectionConfig, NewLeaderFn, PanicPolicy, StartedLeadingFn,
    StoppedLeadingFn, JITTER_FACTOR,
};
pub use elector::LeaderElector;
pub use errors::{ElectionError, ElectionResult};

pub use leasekit_core::{LeaseRecord, LockError, LockResult, ResourceLock};
