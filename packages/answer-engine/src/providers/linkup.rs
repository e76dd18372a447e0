//! Linkup sourced-answer search: a synchronous provider with no job protocol.

use serde::{Deserialize, Serialize};

use crate::citations::{self, CitationLink};
use crate::error::{BatchError, BatchResult};
use crate::security::SecretString;
use crate::traits::adapter::ProviderAdapter;
use crate::traits::transport::HttpRequest;
use crate::types::{Locale, ParsedAnswer, Prompt, RawResultEntry, SharedParams};

pub const DEFAULT_BASE_URL: &str = "https://api.linkup.so/v1";

const COST_PER_PROMPT: f64 = 0.0055;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    q: &'a str,
    depth: &'static str,
    output_type: &'static str,
    include_images: bool,
    include_inline_citations: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    sources: Option<Vec<Source>>,
}

#[derive(Debug, Deserialize)]
struct Source {
    #[serde(default)]
    url: String,
}

pub struct LinkupAdapter {
    base_url: String,
    api_key: SecretString,
}

impl LinkupAdapter {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl ProviderAdapter for LinkupAdapter {
    fn name(&self) -> &str {
        "linkup"
    }

    fn supports_batching(&self) -> bool {
        false
    }

    fn max_batch_size(&self) -> usize {
        1
    }

    /// Linkup takes no locale parameter; the code is only used in logs.
    fn map_locale(&self, locale: &Locale) -> String {
        locale.country.trim().to_ascii_uppercase()
    }

    fn build_request(&self, prompts: &[Prompt], _params: &SharedParams) -> BatchResult<HttpRequest> {
        let [prompt] = prompts else {
            return Err(BatchError::InvalidRequest {
                provider: self.name().to_string(),
                reason: format!("expected exactly one prompt, got {}", prompts.len()),
            });
        };
        let request = SearchRequest {
            q: prompt.text(),
            depth: "standard",
            output_type: "sourcedAnswer",
            include_images: false,
            include_inline_citations: true,
        };
        let body = serde_json::to_value(&request).map_err(|e| BatchError::InvalidRequest {
            provider: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(HttpRequest::post(format!("{}/search", self.base_url), body)
            .with_bearer(self.api_key.clone()))
    }

    fn parse_entry(&self, entry: &RawResultEntry) -> ParsedAnswer {
        let response: SearchResponse = match serde_json::from_value(entry.body().clone()) {
            Ok(response) => response,
            Err(e) => return ParsedAnswer::failure(format!("unreadable reply: {e}")),
        };
        let answer = response.answer.unwrap_or_default();
        if answer.trim().is_empty() {
            return ParsedAnswer::failure("empty answer");
        }

        // Sources are listed in the order their markers appear, starting at [1].
        let links: Vec<CitationLink> = response
            .sources
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, source)| CitationLink::new(i as i64 + 1, source.url))
            .collect();
        let text = citations::link_markers(&answer, &links);
        ParsedAnswer::success(text, citations::collect_urls(links.iter().filter_map(|l| l.url.as_deref())))
    }

    fn cost_per_prompt(&self) -> f64 {
        COST_PER_PROMPT
    }
}
