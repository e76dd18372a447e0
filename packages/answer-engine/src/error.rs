//! Typed errors for the answer engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Only whole-batch
//! conditions become errors; a single failed answer is carried as data on
//! [`ReconciledResponse`](crate::types::ReconciledResponse).

use std::fmt;

use thiserror::Error;

use crate::types::JobHandle;

/// Maximum number of characters of a response body kept in errors and diagnostics.
pub const BODY_PREVIEW_LIMIT: usize = 2000;

/// Errors from a single network operation after retry handling.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Provider answered with a status that retrying will not fix (400, 401, 404...)
    #[error("{label} rejected with status {status}: {body}")]
    Rejected {
        label: String,
        status: u16,
        body: String,
    },

    /// Retry ceiling reached on transient failures
    #[error(
        "{label} gave up after {attempts} attempts (last status: {status}, last error: {error}): {body}",
        status = display_status(.last_status),
        error = .last_error.as_deref().unwrap_or("none")
    )]
    Exhausted {
        label: String,
        attempts: u32,
        last_status: Option<u16>,
        last_error: Option<String>,
        body: String,
    },

    /// Cancellation signal fired while sending or backing off
    #[error("operation cancelled")]
    Cancelled,
}

impl TransportError {
    /// Last HTTP status observed, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Rejected { status, .. } => Some(*status),
            TransportError::Exhausted { last_status, .. } => *last_status,
            TransportError::Cancelled => None,
        }
    }
}

/// Reasons a result set cannot be mapped back onto its prompts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("no result entry echoes the text of prompt {index} ({preview:?}); {entries} entries returned")]
    UnmatchedPrompt {
        index: usize,
        preview: String,
        entries: usize,
    },

    #[error("result entry at position {position} echoes text that matches no submitted prompt ({preview:?})")]
    UnknownEntryText { position: usize, preview: String },

    #[error("prompts {first} and {second} share identical text; content matching cannot tell them apart")]
    AmbiguousPrompt { first: usize, second: usize },
}

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submit,
    Poll,
    Fetch,
    Direct,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Submit => "submit",
            Stage::Poll => "poll",
            Stage::Fetch => "fetch",
            Stage::Direct => "direct call",
        })
    }
}

/// Coarse classification of a [`BatchError`], for callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network, timeout, rate limit or unexpected status, after retries
    Transport,
    /// Provider reported the job itself as failed
    Job,
    /// Results never assembled, or came back empty or undecodable
    Assembly,
    /// Results could not be attributed to prompts with certainty
    Reconciliation,
    /// Caller cancelled the run
    Cancelled,
    /// Bad input or configuration; retrying will not help
    Invalid,
}

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no provider registered for model {0:?}")]
    UnknownModel(String),

    #[error("batch contains no prompts")]
    EmptyBatch,

    #[error("batch of {size} prompts exceeds the {provider} limit of {max}")]
    BatchTooLarge {
        provider: String,
        size: usize,
        max: usize,
    },

    #[error("cannot build {provider} request: {reason}")]
    InvalidRequest { provider: String, reason: String },

    #[error("{stage} failed{}: {source}", display_handle(.handle))]
    Transport {
        stage: Stage,
        handle: Option<String>,
        #[source]
        source: TransportError,
    },

    #[error("{provider} accepted the submission but returned no job handle: {body}")]
    MissingHandle { provider: String, body: String },

    #[error("job {handle} failed at the provider")]
    JobFailed { handle: String },

    #[error("results for job {handle} failed to assemble: {message}")]
    AssemblyFailed { handle: String, message: String },

    #[error("results for job {handle} still assembling after {attempts} attempts")]
    AssemblyTimeout { handle: String, attempts: u32 },

    #[error("job {handle} is ready but returned no results")]
    EmptyResults { handle: String },

    #[error("results for job {handle} could not be decoded: {reason}")]
    MalformedResults {
        handle: String,
        reason: String,
        body: String,
    },

    #[error("{provider} reply could not be decoded: {reason}")]
    MalformedReply {
        provider: String,
        reason: String,
        body: String,
    },

    #[error("cannot attribute results of job {handle} to prompts: {source}")]
    Reconciliation {
        handle: String,
        #[source]
        source: ReconcileError,
    },

    #[error("{stage} cancelled")]
    Cancelled { stage: Stage },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl BatchError {
    /// Wrap a transport failure, keeping cancellation distinct from provider failures.
    pub(crate) fn transport(stage: Stage, handle: Option<&JobHandle>, source: TransportError) -> Self {
        match source {
            TransportError::Cancelled => BatchError::Cancelled { stage },
            source => BatchError::Transport {
                stage,
                handle: handle.map(ToString::to_string),
                source,
            },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BatchError::Transport { .. } | BatchError::MissingHandle { .. } => {
                ErrorCategory::Transport
            }
            BatchError::MalformedReply { .. } => ErrorCategory::Transport,
            BatchError::JobFailed { .. } => ErrorCategory::Job,
            BatchError::AssemblyFailed { .. }
            | BatchError::AssemblyTimeout { .. }
            | BatchError::EmptyResults { .. }
            | BatchError::MalformedResults { .. } => ErrorCategory::Assembly,
            BatchError::Reconciliation { .. } => ErrorCategory::Reconciliation,
            BatchError::Cancelled { .. } => ErrorCategory::Cancelled,
            BatchError::UnknownModel(_)
            | BatchError::EmptyBatch
            | BatchError::BatchTooLarge { .. }
            | BatchError::InvalidRequest { .. }
            | BatchError::Config(_) => ErrorCategory::Invalid,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BatchError::Cancelled { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}: expected {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Result type alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Result type alias for batch operations.
pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Truncate `text` to at most `limit` characters, marking the cut.
pub fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    preview(body, BODY_PREVIEW_LIMIT)
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

fn display_handle(handle: &Option<String>) -> String {
    handle
        .as_ref()
        .map(|h| format!(" for job {h}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo wörld", 4), "héll...");
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("exact", 5), "exact");
    }

    #[test]
    fn test_exhausted_message_carries_status_and_body() {
        let err = TransportError::Exhausted {
            label: "submit".into(),
            attempts: 5,
            last_status: Some(503),
            last_error: None,
            body: "upstream unavailable".into(),
        };
        let message = err.to_string();
        assert!(message.contains("5 attempts"));
        assert!(message.contains("503"));
        assert!(message.contains("upstream unavailable"));
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_cancelled_transport_maps_to_cancelled_batch() {
        let err = BatchError::transport(Stage::Poll, None, TransportError::Cancelled);
        assert!(err.is_cancelled());
        assert_eq!(err.category(), ErrorCategory::Cancelled);
    }

    #[test]
    fn test_transport_error_names_stage_and_handle() {
        let handle = JobHandle::new("brightdata", "s_abc");
        let err = BatchError::transport(
            Stage::Fetch,
            Some(&handle),
            TransportError::Rejected {
                label: "fetch".into(),
                status: 401,
                body: "bad token".into(),
            },
        );
        assert_eq!(err.category(), ErrorCategory::Transport);
        let message = err.to_string();
        assert!(message.starts_with("fetch failed for job brightdata:s_abc"));
        assert!(message.contains("401"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            BatchError::JobFailed { handle: "h".into() }.category(),
            ErrorCategory::Job
        );
        assert_eq!(
            BatchError::AssemblyTimeout {
                handle: "h".into(),
                attempts: 20
            }
            .category(),
            ErrorCategory::Assembly
        );
        assert_eq!(
            BatchError::UnknownModel("claude".into()).category(),
            ErrorCategory::Invalid
        );
    }
}
