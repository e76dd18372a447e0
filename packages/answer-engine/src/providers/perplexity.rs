//! Perplexity answers scraped through a BrightData dataset.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::citations;
use crate::error::{BatchError, BatchResult};
use crate::providers::brightdata::{self, BrightDataApi};
use crate::traits::adapter::ProviderAdapter;
use crate::traits::transport::HttpRequest;
use crate::types::{Locale, ParsedAnswer, Prompt, RawResultEntry, SharedParams};

const TARGET_URL: &str = "https://www.perplexity.ai";

#[derive(Debug, Serialize)]
struct PerplexityInput<'a> {
    url: &'static str,
    prompt: &'a str,
    country: String,
    index: usize,
    export_markdown_file: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct PerplexityAnswer {
    #[serde(default)]
    answer_text_markdown: Option<String>,
    #[serde(default)]
    answer_html: Option<String>,
}

pub struct PerplexityAdapter {
    api: Arc<BrightDataApi>,
    dataset_id: String,
}

impl PerplexityAdapter {
    pub fn new(api: Arc<BrightDataApi>, dataset_id: impl Into<String>) -> Self {
        Self {
            api,
            dataset_id: dataset_id.into(),
        }
    }
}

impl ProviderAdapter for PerplexityAdapter {
    fn name(&self) -> &str {
        "perplexity"
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
        let input: Vec<PerplexityInput<'_>> = prompts
            .iter()
            .map(|prompt| PerplexityInput {
                url: TARGET_URL,
                prompt: prompt.text(),
                country: country.clone(),
                index: prompt.index(),
                export_markdown_file: "",
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
        let answer: PerplexityAnswer = match serde_json::from_value(entry.body().clone()) {
            Ok(answer) => answer,
            Err(e) => return ParsedAnswer::failure(format!("unreadable entry: {e}")),
        };
        let markdown = answer.answer_text_markdown.unwrap_or_default();
        if markdown.trim().is_empty() {
            return ParsedAnswer::failure("empty answer");
        }

        let urls = answer
            .answer_html
            .as_deref()
            .map(citations::html_links)
            .unwrap_or_default();
        ParsedAnswer::success(markdown, urls)
    }

    fn cost_per_prompt(&self) -> f64 {
        brightdata::COST_PER_PROMPT
    }
}
