//! Cancellable retry loops with optional jitter.
//!
//! Both election loops run on this primitive: acquisition uses a jittered
//! sliding period so racing candidates do not hammer the store in
//! lockstep, renewal uses a fixed sliding period.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Perturb `period` upward by a random fraction of `jitter_factor`.
///
/// The result lies in `[period, period * (1 + jitter_factor))`. A
/// non-positive factor leaves the period untouched.
pub fn jittered(period: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return period;
    }
    period.mul_f64(1.0 + rand::thread_rng().gen::<f64>() * jitter_factor)
}

/// Resolves once `cancel` reads `true`.
///
/// A dropped sender counts as cancellation: whoever owned the shutdown
/// handle is gone, so the loops have no way to ever be stopped otherwise.
pub async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow() {
        if cancel.changed().await.is_err() {
            break;
        }
    }
}

fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow() || cancel.has_changed().is_err()
}

/// Repeatedly invoke `f`, spaced by `period`, until it returns `true` or
/// `cancel` fires.
///
/// The first invocation happens immediately. With `sliding` the period
/// starts counting after `f` completes; without it the period covers
/// `f`'s own runtime, so a slow callback eats into its follow-up delay.
/// Each iteration draws a fresh jitter.
///
/// Returns `true` if `f` completed, `false` if the loop was cancelled.
pub async fn poll_until<F, Fut>(
    mut f: F,
    period: Duration,
    jitter_factor: f64,
    sliding: bool,
    cancel: &mut watch::Receiver<bool>,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    loop {
        if is_cancelled(cancel) {
            return false;
        }

        let delay = jittered(period, jitter_factor);
        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);

        if f().await {
            return true;
        }

        if sliding {
            timer
                .as_mut()
                .reset(tokio::time::Instant::now() + delay);
        }

        tokio::select! {
            _ = &mut timer => {}
            _ = cancelled(cancel) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    // drives poll_until with a callback that takes `work` per call and
    // records when each call starts, on a paused clock
    async fn timed_calls(period: Duration, work: Duration, sliding: bool) -> Vec<Duration> {
        let start = tokio::time::Instant::now();
        let calls: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));
        let (_tx, mut rx) = watch::channel(false);
        let recorder = Arc::clone(&calls);
        let completed = poll_until(
            move || {
                let recorder = Arc::clone(&recorder);
                async move {
                    let done = {
                        let mut calls = recorder.lock().unwrap();
                        calls.push(start.elapsed());
                        calls.len() == 3
                    };
                    tokio::time::sleep(work).await;
                    done
                }
            },
            period,
            0.0,
            sliding,
            &mut rx,
        )
        .await;
        assert!(completed);
        Arc::try_unwrap(calls).unwrap().into_inner().unwrap()
    }

    #[tokio::test]
    async fn callback_success_ends_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_tx, mut rx) = watch::channel(false);
        let counter = Arc::clone(&calls);
        let completed = poll_until(
            move || {
                let counter = Arc::clone(&counter);
                async move { counter.fetch_add(1, Ordering::SeqCst) == 2 }
            },
            Duration::from_millis(5),
            0.0,
            true,
            &mut rx,
        )
        .await;
        assert!(completed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_sliding_period_absorbs_the_callback_runtime() {
        // 30ms of work per call eats into its own 50ms period, so calls
        // start exactly one period apart
        let calls = timed_calls(Duration::from_millis(50), Duration::from_millis(30), false).await;
        assert_eq!(calls[1] - calls[0], Duration::from_millis(50));
        assert_eq!(calls[2] - calls[1], Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn sliding_period_starts_after_the_callback() {
        // the 50ms period only starts counting once the 30ms of work is done
        let calls = timed_calls(Duration::from_millis(50), Duration::from_millis(30), true).await;
        assert_eq!(calls[1] - calls[0], Duration::from_millis(80));
        assert_eq!(calls[2] - calls[1], Duration::from_millis(80));
    }

    #[tokio::test]
    async fn pre_cancelled_loop_never_invokes_the_callback() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        let completed = poll_until(
            || async { panic!("must not be called") },
            Duration::from_millis(5),
            0.0,
            true,
            &mut rx,
        )
        .await;
        assert!(!completed);
    }

    #[tokio::test]
    async fn cancellation_during_the_sleep_wins() {
        let (tx, mut rx) = watch::channel(false);
        let loop_fut = poll_until(
            || async { false },
            Duration::from_secs(3600),
            0.0,
            true,
            &mut rx,
        );
        tokio::pin!(loop_fut);

        // give the loop one attempt, then cancel it mid-sleep
        tokio::select! {
            _ = &mut loop_fut => panic!("loop ended without cancellation"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
        tx.send(true).unwrap();
        assert!(!loop_fut.await);
    }

    #[tokio::test]
    async fn dropped_sender_counts_as_cancellation() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let completed = poll_until(
            || async { false },
            Duration::from_millis(5),
            0.0,
            true,
            &mut rx,
        )
        .await;
        assert!(!completed);
    }

    proptest! {
        #[test]
        fn jitter_stays_within_bounds(millis in 1u64..10_000, factor in 0.0f64..3.0) {
            let period = Duration::from_millis(millis);
            let perturbed = jittered(period, factor);
            prop_assert!(perturbed >= period);
            prop_assert!(perturbed <= period.mul_f64(1.0 + factor));
        }
    }

    #[test]
    fn zero_jitter_is_exact() {
        let period = Duration::from_millis(250);
        assert_eq!(jittered(period, 0.0), period);
        assert_eq!(jittered(period, -1.0), period);
    }
}
