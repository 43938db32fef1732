//! Bounded polling shared by the creation wait and the statement wait.

use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// How a bounded wait ended.
pub(crate) enum WaitOutcome<T> {
    /// The polled condition was met.
    Ready(T),
    /// The budget elapsed before the condition was met.
    TimedOut,
    /// The cancellation token fired.
    Cancelled,
}

/// Polls `step` at a fixed interval until it yields a value, the budget is
/// spent, or `cancel` fires. The first probe happens after one interval.
/// An `Err` from `step` aborts the wait immediately; a single failed probe
/// is a hard failure.
pub(crate) async fn wait_until<T, E, F, Fut>(
    interval: Duration,
    budget: Duration,
    cancel: &CancellationToken,
    mut step: F,
) -> Result<WaitOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let deadline = Instant::now() + budget;
    loop {
        tokio::select! {
            _ = time::sleep(interval) => {}
            _ = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
        }
        if Instant::now() > deadline {
            return Ok(WaitOutcome::TimedOut);
        }
        if let Some(value) = step().await? {
            return Ok(WaitOutcome::Ready(value));
        }
    }
}
