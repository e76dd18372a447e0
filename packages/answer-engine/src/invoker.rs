//! Bounded retry around a single network operation.
//!
//! The invoker knows nothing about jobs or prompts. Each call site picks its
//! own [`RetryPolicy`] through [`ResilientInvoker::with_policy`] while sharing
//! the same transport.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{preview, truncate_body, TransportError, TransportResult};
use crate::traits::transport::{HttpReply, HttpRequest, Transport};

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `step * attempt`
    Linear(Duration),
    /// `base * 2^(attempt-1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay after the `attempt`-th failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step.saturating_mul(attempt),
            Backoff::Exponential { base, max } => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Single attempt, no retry.
    pub fn once() -> Self {
        Self::new(1, Backoff::Fixed(Duration::ZERO))
    }

    /// Statuses worth retrying: timeouts, rate limits and server errors.
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 408 | 429) || (500..600).contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Backoff::Linear(Duration::from_secs(2)))
    }
}

/// Executes requests with bounded, cancellable retry.
#[derive(Clone)]
pub struct ResilientInvoker {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ResilientInvoker {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
        }
    }

    /// Same transport, different policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Send `request`, retrying connection failures and retryable statuses.
    ///
    /// Any other non-2xx status fails immediately with the response body.
    /// `label` names the operation in logs and errors.
    pub async fn invoke(
        &self,
        label: &str,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> TransportResult<HttpReply> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_status = None;
        let mut last_error = None;
        let mut last_body = String::new();

        for attempt in 1..=max_attempts {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                outcome = self.transport.send(request) => outcome,
            };

            match outcome {
                Ok(reply) if reply.is_success() => {
                    debug!(label, status = reply.status, attempt, "Request succeeded");
                    return Ok(reply);
                }
                Ok(reply) if RetryPolicy::is_retryable_status(reply.status) => {
                    warn!(
                        label,
                        status = reply.status,
                        attempt,
                        max_attempts,
                        body = %preview(&reply.body, 200),
                        "Retryable status"
                    );
                    last_status = Some(reply.status);
                    last_body = truncate_body(&reply.body);
                }
                Ok(reply) => {
                    warn!(
                        label,
                        status = reply.status,
                        body = %preview(&reply.body, 200),
                        "Non-retryable status"
                    );
                    return Err(TransportError::Rejected {
                        label: label.to_string(),
                        status: reply.status,
                        body: truncate_body(&reply.body),
                    });
                }
                Err(failure) => {
                    warn!(
                        label,
                        attempt,
                        max_attempts,
                        timed_out = failure.timed_out,
                        error = %failure,
                        "Request failed"
                    );
                    last_error = Some(failure.message);
                }
            }

            if attempt < max_attempts {
                let delay = self.policy.backoff.delay_for(attempt);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(TransportError::Exhausted {
            label: label.to_string(),
            attempts: max_attempts,
            last_status,
            last_error,
            body: last_body,
        })
    }
}
