//! Job handles and lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier a provider assigns to a submitted batch.
///
/// Not `Clone`: a handle belongs to the pipeline that submitted it and is
/// dropped once results are retrieved or the job is abandoned.
#[derive(Debug, PartialEq, Eq)]
pub struct JobHandle {
    provider: String,
    id: String,
    submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
            submitted_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Whole seconds since submission.
    pub fn elapsed_secs(&self) -> i64 {
        (Utc::now() - self.submitted_at).num_seconds()
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}

/// Provider-reported job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Submitted,
    Running,
    Ready,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }

    /// Fold a newly observed status into the current one.
    ///
    /// Terminal states are sticky and `Running` never goes back to `Submitted`.
    pub fn advance(self, observed: JobStatus) -> JobStatus {
        match (self, observed) {
            (current, _) if current.is_terminal() => current,
            (JobStatus::Running, JobStatus::Submitted) => JobStatus::Running,
            (_, observed) => observed,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Running => "running",
            JobStatus::Ready => "ready",
            JobStatus::Failed => "failed",
        })
    }
}
