//! Test lock implementations for the Leasekit leader-election framework.
//!
//! Provides two [`ResourceLock`](leasekit_core::ResourceLock) backends that
//! exist purely to exercise the elector:
//!
//! - [`InMemoryLockStore`] / [`InMemoryLock`]: a process-local lease slot
//!   with atomic create-if-absent semantics, an event log, and failure
//!   injection toggles, so many candidate handles can race each other
//! - [`NullLock`]: an always-follower lock that never holds anything

pub mod memory;
pub mod null;

pub use memory::{InMemoryLock, InMemoryLockStore};
pub use null::NullLock;
