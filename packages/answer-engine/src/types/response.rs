//! Parsed and reconciled answers.

use serde::{Deserialize, Serialize};

/// Text recorded for a prompt whose answer failed or came back empty.
pub const FAILED_ANSWER_TEXT: &str = "Question run failed for this model and location";

/// What a provider adapter extracted from one raw entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnswer {
    pub text: String,
    pub citations: Vec<String>,
    pub succeeded: bool,
    pub failure_reason: Option<String>,
}

impl ParsedAnswer {
    pub fn success(text: impl Into<String>, citations: Vec<String>) -> Self {
        Self {
            text: text.into(),
            citations,
            succeeded: true,
            failure_reason: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            text: FAILED_ANSWER_TEXT.to_string(),
            citations: Vec::new(),
            succeeded: false,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Final per-prompt result handed to callers.
///
/// Exactly one exists per submitted prompt, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledResponse {
    /// 1-based position of the originating prompt in the caller's input
    pub prompt_index: usize,
    pub text: String,
    pub citations: Vec<String>,
    pub succeeded: bool,
    /// USD charged for this prompt; zero for failed items
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl ReconciledResponse {
    pub(crate) fn from_parsed(prompt_index: usize, parsed: ParsedAnswer, cost_per_prompt: f64) -> Self {
        if parsed.succeeded {
            Self {
                prompt_index,
                text: parsed.text,
                citations: parsed.citations,
                succeeded: true,
                cost: cost_per_prompt,
                failure_reason: None,
            }
        } else {
            Self {
                prompt_index,
                text: parsed.text,
                citations: Vec::new(),
                succeeded: false,
                cost: 0.0,
                failure_reason: parsed.failure_reason,
            }
        }
    }

    /// Whether downstream evaluation should run on this answer.
    pub fn should_evaluate(&self) -> bool {
        self.succeeded
    }
}
