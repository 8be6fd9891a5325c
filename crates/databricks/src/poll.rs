//! Fixed-interval polling of remote operations.

use magpie_config::PollSettings;
use magpie_types::traits::Result;
use std::{future::Future, time::Duration};
use tokio::time::Instant;

/// Interval between polls and the ceiling on total polling time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollPolicy {
    #[must_use]
    pub const fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }
}

impl From<PollSettings> for PollPolicy {
    fn from(s: PollSettings) -> Self {
        Self::new(
            Duration::from_secs(s.interval_secs),
            Duration::from_secs(s.max_wait_secs),
        )
    }
}

/// Fetch until `is_terminal` holds or the next sleep would pass `max_wait`.
///
/// The first fetch happens immediately. On timeout the last fetched value is
/// returned as is; the remote operation is not cancelled.
///
/// # Errors
///
/// Propagates the first error returned by `fetch`.
pub async fn poll_until<T, F, Fut>(
    policy: PollPolicy,
    label: &str,
    mut fetch: F,
    is_terminal: impl Fn(&T) -> bool,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut polls = 0u32;
    loop {
        let current = fetch().await?;
        polls += 1;
        if is_terminal(&current) {
            tracing::debug!(operation = label, polls, "reached terminal state");
            return Ok(current);
        }
        if started.elapsed() + policy.interval > policy.max_wait {
            tracing::warn!(
                operation = label,
                polls,
                max_wait_secs = policy.max_wait.as_secs(),
                "polling timed out, returning last observed status"
            );
            return Ok(current);
        }
        tokio::time::sleep(policy.interval).await;
    }
}
