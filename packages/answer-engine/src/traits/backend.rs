//! Job-protocol endpoints of an asynchronous provider.

use crate::traits::transport::{HttpReply, HttpRequest};
use crate::types::{JobHandle, JobStatus, RawResultEntry};

/// What a results endpoint answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultsPayload {
    /// Job is ready but the result set is still being put together
    Assembling { message: String },
    /// Provider gave up assembling results
    Failed { message: String },
    Entries(Vec<RawResultEntry>),
    /// Body could not be understood
    Malformed { reason: String },
}

/// Submit/status/results protocol shared by the providers behind one backend.
pub trait JobBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Extract the job id from a submission reply.
    fn parse_handle(&self, reply: &HttpReply) -> Option<String>;

    fn status_request(&self, handle: &JobHandle) -> HttpRequest;

    fn parse_status(&self, reply: &HttpReply) -> Result<JobStatus, String>;

    fn results_request(&self, handle: &JobHandle) -> HttpRequest;

    fn classify_results(&self, reply: &HttpReply) -> ResultsPayload;
}
