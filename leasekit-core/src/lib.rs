//! # Leasekit Core
//!
//! Core types and contracts for lease-based leader election.
//!
//! This crate provides the building blocks shared by every Leasekit lock
//! backend and by the elector itself:
//!
//! - **LeaseRecord**: the lease payload stored in the backing store
//! - **ResourceLock trait**: the contract a storage backend must satisfy
//! - **Error Handling**: storage error taxonomy with retryability hints
//!
//! The core is deliberately policy-free: it says nothing about when to
//! acquire or renew a lease. That logic lives in `leasekit-election`.

pub mod errors;
pub mod lock;
pub mod record;

pub use errors::{LockError, LockResult};
pub use lock::ResourceLock;
pub use record::{now_millis, LeaseRecord};
