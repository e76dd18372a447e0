//! Data types flowing through a batch run.

pub mod entry;
pub mod job;
pub mod prompt;
pub mod response;

pub use entry::RawResultEntry;
pub use job::{JobHandle, JobStatus};
pub use prompt::{Locale, Prompt, PromptBatch, SharedParams};
pub use response::{ParsedAnswer, ReconciledResponse, FAILED_ANSWER_TEXT};
