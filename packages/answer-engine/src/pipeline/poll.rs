//! Status polling until a job reaches a terminal state.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{BatchError, BatchResult, Stage, TransportError};
use crate::invoker::ResilientInvoker;
use crate::traits::backend::JobBackend;
use crate::types::{JobHandle, JobStatus};

/// Log an in-progress line every this many polls.
const PROGRESS_LOG_EVERY: u64 = 6;

/// Queries job status on a fixed interval.
///
/// There is no overall deadline: jobs can legitimately run for tens of
/// minutes. The cancellation token is checked on every tick.
pub struct JobPoller {
    invoker: ResilientInvoker,
    backend: Arc<dyn JobBackend>,
    interval: Duration,
}

impl JobPoller {
    pub fn new(invoker: ResilientInvoker, backend: Arc<dyn JobBackend>, interval: Duration) -> Self {
        Self {
            invoker,
            backend,
            interval,
        }
    }

    /// Wait until the job is `Ready` or `Failed` and return that status.
    ///
    /// Failed status queries are logged and polling continues; only the
    /// provider reporting `failed` ends the loop with `Failed`.
    pub async fn await_ready(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> BatchResult<JobStatus> {
        let request = self.backend.status_request(handle);
        let mut status = JobStatus::Submitted;
        let mut polls: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(handle = %handle, polls, "Polling cancelled");
                    return Err(BatchError::Cancelled { stage: Stage::Poll });
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
            polls += 1;

            let reply = match self.invoker.invoke("poll", &request, cancel).await {
                Ok(reply) => reply,
                Err(TransportError::Cancelled) => {
                    return Err(BatchError::Cancelled { stage: Stage::Poll });
                }
                Err(e) => {
                    warn!(handle = %handle, polls, error = %e, "Status query failed, will poll again");
                    continue;
                }
            };

            let observed = match self.backend.parse_status(&reply) {
                Ok(observed) => observed,
                Err(reason) => {
                    warn!(handle = %handle, polls, reason = %reason, "Unreadable status reply, will poll again");
                    continue;
                }
            };
            status = status.advance(observed);

            if status.is_terminal() {
                info!(
                    handle = %handle,
                    status = %status,
                    polls,
                    elapsed_secs = handle.elapsed_secs(),
                    "Job reached terminal state"
                );
                return Ok(status);
            }

            if polls % PROGRESS_LOG_EVERY == 0 {
                info!(handle = %handle, status = %status, polls, elapsed_secs = handle.elapsed_secs(), "Job in progress");
            } else {
                debug!(handle = %handle, status = %status, polls, "Job in progress");
            }
        }
    }
}
