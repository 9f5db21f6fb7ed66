//! Bounded waiting: poll a probe on an interval and give up after a deadline.

use core::{future::Future, time::Duration};

use thiserror::Error as ThisError;
use tokio::time::{Instant, MissedTickBehavior, interval};

/// The deadline passed before the probe reported success.
#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
#[error("Timed out after {waited:?}")]
pub struct WaitTimeout {
    pub waited: Duration,
}

/// Calls `probe` every `poll_interval` until it yields `Some`, or fails once `timeout` has elapsed.
///
/// The probe always runs at least once, so a zero timeout still checks the current state.
///
/// # Errors
///
/// Returns [`WaitTimeout`] if the probe never yielded a value within `timeout`.
pub async fn poll_until<T, F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    mut probe: F,
) -> Result<T, WaitTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let mut ticker = interval(poll_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let start = Instant::now();
    loop {
        // The first tick completes immediately.
        ticker.tick().await;
        if let Some(found) = probe().await {
            return Ok(found);
        }
        let waited = start.elapsed();
        if waited >= timeout {
            return Err(WaitTimeout { waited });
        }
    }
}
