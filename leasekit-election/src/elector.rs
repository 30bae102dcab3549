//! The lease-based leader-election state machine.

use crate::config::{ElectionConfig, PanicPolicy, JITTER_FACTOR};
use crate::errors::{ElectionError, ElectionResult};
use crate::wait;
use futures_util::FutureExt;
use leasekit_core::{now_millis, LeaseRecord};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// The last lease state this candidate saw in the store, with the local
/// wall-clock moment it was seen.
///
/// The three fields are only ever mutated together under one mutex, so
/// readers always get a consistent snapshot. `time` is the local
/// staleness clock: lease expiry is judged from it alone, never from the
/// timestamps embedded in the record, which keeps candidates with
/// arbitrarily offset clocks from fighting over a live lease.
#[derive(Default)]
struct ObservedState {
    record: Option<LeaseRecord>,
    raw: Vec<u8>,
    time: Option<Instant>,
}

/// Runs one candidate's side of a lease-based election.
///
/// Construct once per process per election and drive it with
/// [`run`](LeaderElector::run). The read accessors and
/// [`check`](LeaderElector::check) are safe to call concurrently with the
/// run loop; concurrent calls to `run` itself on one instance are
/// unsupported. Calling `run` again after it returns restarts from the
/// acquire phase.
pub struct LeaderElector {
    config: ElectionConfig,
    observed: Mutex<ObservedState>,
    // last holder identity for which on_new_leader fired
    reported_leader: Mutex<String>,
}

impl LeaderElector {
    /// Validate `config` and build an elector. Fails hard on any timing
    /// invariant violation; no election is attempted.
    pub fn new(config: ElectionConfig) -> ElectionResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            observed: Mutex::new(ObservedState::default()),
            reported_leader: Mutex::new(String::new()),
        })
    }

    /// Acquire the lease, hold it, and block until leadership is lost or
    /// `shutdown` fires.
    ///
    /// `on_stopped_leading` is invoked on every exit path. Panics from
    /// the election loop are caught at this barrier, logged, and then
    /// either propagated or swallowed per the configured
    /// [`PanicPolicy`].
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        let outcome = AssertUnwindSafe(self.run_inner(shutdown)).catch_unwind().await;

        if let Some(on_stopped) = &self.config.callbacks.on_stopped_leading {
            on_stopped();
        }

        if let Err(panic) = outcome {
            error!(
                "leader election '{}' panicked: {}",
                self.config.name,
                panic_message(panic.as_ref())
            );
            if self.config.panic_policy == PanicPolicy::Propagate {
                resume_unwind(panic);
            }
        }
    }

    async fn run_inner(&self, mut shutdown: watch::Receiver<bool>) {
        if !self.acquire(&mut shutdown).await {
            return;
        }

        // leader-scoped cancellation: fires when the caller shuts down,
        // when renewal misses its deadline, or when this function exits
        let (leader_tx, leader_rx) = watch::channel(false);
        let forwarder = {
            let leader_tx = leader_tx.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                wait::cancelled(&mut shutdown).await;
                let _ = leader_tx.send(true);
            })
        };

        if let Some(on_started) = &self.config.callbacks.on_started_leading {
            tokio::spawn(on_started(leader_rx.clone()));
        }

        self.renew(leader_rx, &leader_tx).await;

        let _ = leader_tx.send(true);
        forwarder.abort();
    }

    /// Loop `try_acquire_or_renew` on a jittered schedule until it
    /// succeeds or `shutdown` fires. Returns whether leadership was
    /// gained.
    async fn acquire(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        debug!(
            "'{}' attempting to acquire lease {}",
            self.config.name,
            self.config.lock.describe()
        );
        let this = self;
        wait::poll_until(
            move || async move {
                let acquired = this.try_acquire_or_renew().await;
                this.maybe_report_transition();
                if acquired {
                    this.config
                        .lock
                        .record_event(&this.config.name, "became leader");
                    info!(
                        "'{}' successfully acquired lease {}",
                        this.config.name,
                        this.config.lock.describe()
                    );
                } else {
                    debug!(
                        "'{}' failed to acquire lease {}",
                        this.config.name,
                        this.config.lock.describe()
                    );
                }
                acquired
            },
            self.config.retry_period,
            JITTER_FACTOR,
            true,
            shutdown,
        )
        .await
    }

    /// Keep renewing the lease every `retry_period` until `cancel` fires
    /// or a renew round misses `renew_timeout`, which is treated as
    /// leadership lost and signalled through `cancel_tx`.
    async fn renew(&self, mut cancel: watch::Receiver<bool>, cancel_tx: &watch::Sender<bool>) {
        let this = self;
        let round_cancel = cancel.clone();
        wait::poll_until(
            move || {
                let mut round_cancel = round_cancel.clone();
                async move {
                    // renewal attempts inside one round are back-to-back;
                    // the deadline is the only pacing
                    let deadline = tokio::time::timeout(this.config.renew_timeout, async {
                        loop {
                            if this.try_acquire_or_renew().await {
                                return true;
                            }
                            if *round_cancel.borrow() {
                                return false;
                            }
                            tokio::task::yield_now().await;
                        }
                    })
                    .await;

                    this.maybe_report_transition();
                    match deadline {
                        Ok(true) => {
                            debug!(
                                "'{}' successfully renewed lease {}",
                                this.config.name,
                                this.config.lock.describe()
                            );
                            false
                        }
                        Ok(false) => true,
                        Err(_) => {
                            this.config
                                .lock
                                .record_event(&this.config.name, "stopped leading");
                            warn!(
                                "'{}' failed to renew lease {}: renew timeout of {}ms reached",
                                this.config.name,
                                this.config.lock.describe(),
                                this.config.renew_timeout.as_millis()
                            );
                            let _ = cancel_tx.send(true);
                            true
                        }
                    }
                }
            },
            self.config.retry_period,
            0.0,
            true,
            &mut cancel,
        )
        .await;

        if self.config.release_on_cancel {
            self.release().await;
        }
    }

    /// The single state-transition primitive; every acquire/renew
    /// iteration is exactly one call to this. Returns whether this
    /// candidate holds the lease afterwards.
    async fn try_acquire_or_renew(&self) -> bool {
        let now = Instant::now();
        let now_ms = now_millis();
        let identity = self.config.lock.identity();
        let mut candidate = LeaseRecord {
            holder_identity: identity.clone(),
            lease_duration_ms: self.config.lease_duration.as_millis() as u64,
            acquire_time_ms: now_ms,
            renew_time_ms: now_ms,
            leader_transitions: 0,
        };

        let (current, raw) = match self.config.lock.get().await {
            Ok(found) => found,
            Err(err) => {
                if !err.is_not_found() {
                    warn!(
                        "error retrieving lease {}: {}",
                        self.config.lock.describe(),
                        err
                    );
                }
                // no readable record: race the atomic create
                if let Err(create_err) = self.config.lock.create(&candidate).await {
                    debug!(
                        "failed to create lease {}: {}",
                        self.config.lock.describe(),
                        create_err
                    );
                    return false;
                }
                self.set_observed_record(candidate);
                return true;
            }
        };

        // another candidate may have written since we last looked; the
        // raw bytes are the cheap change detector
        {
            let mut observed = self.observed.lock();
            if observed.raw != raw {
                observed.record = Some(current.clone());
                observed.raw = raw;
                observed.time = Some(Instant::now());
            }
        }

        if current.is_held() && !self.observed_record_expired(now) && !current.is_held_by(&identity)
        {
            debug!(
                "lease {} is held by {} and has not yet expired",
                self.config.lock.describe(),
                current.holder_identity
            );
            return false;
        }

        if current.is_held_by(&identity) {
            // same term: acquire time and transition count carry over
            candidate.acquire_time_ms = current.acquire_time_ms;
            candidate.leader_transitions = current.leader_transitions;
        } else {
            // new term starts now
            candidate.leader_transitions = current.leader_transitions + 1;
        }

        if let Err(err) = self.config.lock.update(&candidate).await {
            warn!(
                "failed to update lease {}: {}",
                self.config.lock.describe(),
                err
            );
            return false;
        }
        self.set_observed_record(candidate);
        true
    }

    /// Voluntarily step down by clearing the holder and shrinking the
    /// lease to a single millisecond, so the slot is immediately up for
    /// grabs. Best-effort: returns `false` if the write failed, in which
    /// case local belief is left unchanged and the lease expires
    /// passively.
    async fn release(&self) -> bool {
        let observed = { self.observed.lock().record.clone() };
        let current = match observed {
            Some(record) if record.is_held_by(&self.config.lock.identity()) => record,
            _ => return true,
        };

        let now_ms = now_millis();
        let released = LeaseRecord {
            holder_identity: String::new(),
            lease_duration_ms: 1,
            acquire_time_ms: now_ms,
            renew_time_ms: now_ms,
            leader_transitions: current.leader_transitions,
        };

        if let Err(err) = self.config.lock.update(&released).await {
            error!(
                "failed to release lease {}: {}",
                self.config.lock.describe(),
                err
            );
            return false;
        }
        info!(
            "'{}' released lease {}",
            self.config.name,
            self.config.lock.describe()
        );
        self.set_observed_record(released);
        true
    }

    /// Fire `on_new_leader` if the observed holder changed since the
    /// last report. Dispatches are fire-and-forget and unordered.
    fn maybe_report_transition(&self) {
        let holder = self
            .observed
            .lock()
            .record
            .as_ref()
            .map(|record| record.holder_identity.clone())
            .unwrap_or_default();

        {
            let mut reported = self.reported_leader.lock();
            if *reported == holder {
                return;
            }
            *reported = holder.clone();
        }

        if let Some(on_new_leader) = &self.config.callbacks.on_new_leader {
            let on_new_leader = Arc::clone(on_new_leader);
            tokio::spawn(async move { on_new_leader(holder) });
        }
    }

    /// Health probe for the renew loop.
    ///
    /// Returns an error only when this process believes itself leader but
    /// has not refreshed its observation for longer than the lease
    /// duration plus `max_tolerable_expired_lease`. That is the
    /// alive-but-stuck case a liveness probe should surface. Never
    /// mutates state; for a follower this is always `Ok`.
    pub fn check(&self, max_tolerable_expired_lease: Duration) -> ElectionResult<()> {
        let identity = self.config.lock.identity();
        let observed = self.observed.lock();
        let leading = observed
            .record
            .as_ref()
            .map(|record| record.is_held_by(&identity))
            .unwrap_or(false);
        if !leading {
            return Ok(());
        }

        let age = observed
            .time
            .map(|time| time.elapsed())
            .unwrap_or(Duration::MAX);
        let tolerance = self.config.lease_duration + max_tolerable_expired_lease;
        if age > tolerance {
            return Err(ElectionError::RenewalStalled {
                name: self.config.name.clone(),
                observed_age_ms: age.as_millis() as u64,
                tolerance_ms: tolerance.as_millis() as u64,
            });
        }
        Ok(())
    }

    /// Identity of the last observed holder, if the lease is held.
    pub fn get_leader(&self) -> Option<String> {
        self.observed
            .lock()
            .record
            .as_ref()
            .filter(|record| record.is_held())
            .map(|record| record.holder_identity.clone())
    }

    /// Whether the last observed holder is this candidate.
    pub fn is_leader(&self) -> bool {
        let identity = self.config.lock.identity();
        self.observed
            .lock()
            .record
            .as_ref()
            .map(|record| record.is_held_by(&identity))
            .unwrap_or(false)
    }

    fn set_observed_record(&self, record: LeaseRecord) {
        let mut observed = self.observed.lock();
        observed.record = Some(record);
        observed.time = Some(Instant::now());
    }

    /// True when the observation is older, on the local clock, than the
    /// validity duration the observed record itself advertises. Only this
    /// judgement gates a takeover; the record's timestamps are never
    /// consulted, and candidates configured with different lease
    /// durations still respect the holder's claim.
    fn observed_record_expired(&self, now: Instant) -> bool {
        let observed = self.observed.lock();
        match (&observed.record, observed.time) {
            (Some(record), Some(time)) => {
                time + Duration::from_millis(record.lease_duration_ms) <= now
            }
            _ => true,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
