//! Bounded wait for a remote status transition.
//!
//! The poller repeatedly fetches the resource until its status reaches the
//! target set. A status in the pending set means "keep waiting". Any other
//! status, a fetch error, or the caller's deadline ends the wait with an
//! error. Backoff is constant: `max(poll_interval, min_poll_interval)`.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{ApiError, EngineError, Result};
use crate::status::{ClusterStatus, Transition};

/// Waits for status transitions with a fixed poll cadence.
#[derive(Debug, Clone, Copy)]
pub struct StateWaiter {
    delay: Duration,
}

impl StateWaiter {
    pub fn new(poll_interval: Duration, min_poll_interval: Duration) -> Self {
        Self {
            delay: poll_interval.max(min_poll_interval),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            delay: config.poll_delay(),
        }
    }

    /// Poll `fetch` until its status is in `transition.target`.
    ///
    /// `fetch` yields the observation together with its status. The wait is
    /// bounded by `deadline`, which callers share across every poll of one
    /// lifecycle call. A fetch still in flight at the deadline is abandoned.
    pub async fn wait<T, F, Fut>(
        &self,
        transition: &Transition,
        deadline: Instant,
        mut fetch: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(T, ClusterStatus)>>,
    {
        let started = Instant::now();
        let mut last: Option<ClusterStatus> = None;

        loop {
            let (observation, status) = match timeout_at(deadline, fetch()).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(EngineError::Timeout {
                        last,
                        target: transition.target.clone(),
                        waited: started.elapsed(),
                    });
                }
            };

            debug!(status = %status, "Observed cluster status");

            if transition.target.contains(&status) {
                return Ok(observation);
            }
            if !transition.pending.contains(&status) {
                return Err(EngineError::UnexpectedState {
                    status,
                    pending: transition.pending.clone(),
                    target: transition.target.clone(),
                });
            }
            last = Some(status);

            let now = Instant::now();
            if now >= deadline {
                return Err(EngineError::Timeout {
                    last,
                    target: transition.target.clone(),
                    waited: started.elapsed(),
                });
            }
            sleep(self.delay.min(deadline - now)).await;
        }
    }
}

/// Await a single remote call named `name`, giving up at `deadline`.
///
/// The call is never started once the deadline has passed.
pub(crate) async fn call_until<T, Fut>(name: &str, deadline: Instant, call: Fut) -> Result<T>
where
    Fut: Future<Output = std::result::Result<T, ApiError>>,
{
    let started = Instant::now();
    if started >= deadline {
        return Err(EngineError::CallTimeout {
            call: name.to_string(),
            waited: Duration::ZERO,
        });
    }
    match timeout_at(deadline, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(EngineError::CallTimeout {
            call: name.to_string(),
            waited: started.elapsed(),
        }),
    }
}

/// One-shot form of [`StateWaiter::wait`] with a per-call timeout.
pub async fn wait_for_state<T, F, Fut>(
    fetch: F,
    pending: &[ClusterStatus],
    target: &[ClusterStatus],
    timeout: Duration,
    poll_interval: Duration,
    min_poll_interval: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(T, ClusterStatus)>>,
{
    let waiter = StateWaiter::new(poll_interval, min_poll_interval);
    waiter
        .wait(
            &Transition::new(pending, target),
            Instant::now() + timeout,
            fetch,
        )
        .await
}
