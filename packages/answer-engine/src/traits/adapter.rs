//! Per-provider contract consumed by the pipeline and orchestrator.

use serde_json::Value;

use crate::error::BatchResult;
use crate::traits::transport::{HttpReply, HttpRequest};
use crate::types::{Locale, ParsedAnswer, Prompt, RawResultEntry, SharedParams};

/// Everything the generic machinery needs to know about one provider.
///
/// Implementations are pure: they build requests and interpret entries but
/// never perform I/O themselves.
pub trait ProviderAdapter: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    fn supports_batching(&self) -> bool;

    /// Largest number of prompts accepted in one submission.
    fn max_batch_size(&self) -> usize;

    /// Map a caller locale onto the code this provider accepts.
    fn map_locale(&self, locale: &Locale) -> String;

    /// Build the request that submits `prompts`.
    ///
    /// Job-based providers receive a whole batch, each prompt carrying its
    /// assigned index. Direct providers receive exactly one prompt.
    fn build_request(&self, prompts: &[Prompt], params: &SharedParams) -> BatchResult<HttpRequest>;

    /// Classify one raw entry as a successful or failed answer.
    fn parse_entry(&self, entry: &RawResultEntry) -> ParsedAnswer;

    /// Flat USD cost of one answered prompt.
    fn cost_per_prompt(&self) -> f64;

    /// Turn a direct-call reply into the single entry it carries.
    fn entry_from_reply(&self, reply: &HttpReply) -> Result<RawResultEntry, String> {
        serde_json::from_str::<Value>(&reply.body)
            .map(RawResultEntry::new)
            .map_err(|e| e.to_string())
    }
}
