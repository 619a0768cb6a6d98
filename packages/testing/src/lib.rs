#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for tests and examples in factory_pool packages.

use std::panic;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// How long a test may run before [`with_watchdog()`] gives up on it.
const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Miri runs thread synchronization far slower, so it gets more time before we call it a hang.
const WATCHDOG_TIMEOUT_MIRI: Duration = Duration::from_secs(60);

/// How often [`wait_until()`] re-evaluates its condition.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Runs a test body on a separate thread and fails the test if it does not finish in time.
///
/// Pool tests exercise blocking allocation, so a bug tends to show up as a thread that never
/// wakes up. Without a watchdog such a bug hangs the test run instead of failing it.
///
/// If the `MUTATION_TESTING` environment variable is `1`, the body runs directly on the calling
/// thread with no timeout, so the mutation tester can classify hangs itself.
///
/// # Panics
///
/// Panics if the body does not complete within the timeout. Panics raised by the body are
/// propagated unchanged.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let answer = with_watchdog(|| 6 * 7);
/// assert_eq!(answer, 42);
/// ```
pub fn with_watchdog<F, R>(body: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return body();
    }

    let timeout = if cfg!(miri) {
        WATCHDOG_TIMEOUT_MIRI
    } else {
        WATCHDOG_TIMEOUT
    };

    let (result_tx, result_rx) = mpsc::channel();

    let runner = thread::spawn(move || {
        // The receiver is gone if we already timed out, nobody is left to care.
        drop(result_tx.send(body()));
    });

    match result_rx.recv_timeout(timeout) {
        Ok(result) => {
            if let Err(payload) = runner.join() {
                panic::resume_unwind(payload);
            }

            result
        }
        Err(RecvTimeoutError::Timeout) => {
            panic!("test did not complete within {timeout:?}, it is probably stuck");
        }
        Err(RecvTimeoutError::Disconnected) => match runner.join() {
            Err(payload) => panic::resume_unwind(payload),
            Ok(()) => panic!("test thread exited without producing a result"),
        },
    }
}

/// Polls `condition` until it returns `true` or `timeout` elapses.
///
/// Returns whether the condition was observed to be `true`.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use testing::wait_until;
///
/// assert!(wait_until(Duration::from_secs(1), || true));
/// assert!(!wait_until(Duration::from_millis(10), || false));
/// ```
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now()
        .checked_add(timeout)
        .unwrap_or_else(Instant::now);

    loop {
        if condition() {
            return true;
        }

        if Instant::now() >= deadline {
            return false;
        }

        thread::sleep(POLL_INTERVAL);
    }
}
