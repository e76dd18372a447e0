//! Gemini answers scraped through a BrightData dataset. Gemini entries carry
//! no citation data.

use serde::Serialize;
use std::sync::Arc;

use crate::error::{BatchError, BatchResult};
use crate::providers::brightdata::{self, BrightDataApi};
use crate::traits::adapter::ProviderAdapter;
use crate::traits::transport::HttpRequest;
use crate::types::{Locale, ParsedAnswer, Prompt, RawResultEntry, SharedParams};

const TARGET_URL: &str = "https://gemini.google.com/";

#[derive(Debug, Serialize)]
struct GeminiInput<'a> {
    url: &'static str,
    prompt: &'a str,
    country: String,
    index: usize,
}

pub struct GeminiAdapter {
    api: Arc<BrightDataApi>,
    dataset_id: String,
}

impl GeminiAdapter {
    pub fn new(api: Arc<BrightDataApi>, dataset_id: impl Into<String>) -> Self {
        Self {
            api,
            dataset_id: dataset_id.into(),
        }
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supports_batching(&self) -> bool {
        true
    }

    fn max_batch_size(&self) -> usize {
        brightdata::MAX_BATCH_SIZE
    }

    fn map_locale(&self, locale: &Locale) -> String {
        brightdata::map_country(locale)
    }

    fn build_request(&self, prompts: &[Prompt], params: &SharedParams) -> BatchResult<HttpRequest> {
        let country = self.map_locale(&params.locale);
        let input: Vec<GeminiInput<'_>> = prompts
            .iter()
            .map(|prompt| GeminiInput {
                url: TARGET_URL,
                prompt: prompt.text(),
                country: country.clone(),
                index: prompt.index(),
            })
            .collect();
        let body = serde_json::to_value(&input).map_err(|e| BatchError::InvalidRequest {
            provider: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.api.trigger_request(&self.dataset_id, body))
    }

    fn parse_entry(&self, entry: &RawResultEntry) -> ParsedAnswer {
        if let Some(error) = entry.error_message() {
            return ParsedAnswer::failure(format!("provider error: {error}"));
        }
        match entry.str_field("answer_text_markdown") {
            Some(text) if !text.trim().is_empty() => ParsedAnswer::success(text, Vec::new()),
            _ => ParsedAnswer::failure("empty answer"),
        }
    }

    fn cost_per_prompt(&self) -> f64 {
        brightdata::COST_PER_PROMPT
    }
}
