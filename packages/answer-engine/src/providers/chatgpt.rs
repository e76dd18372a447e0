//! ChatGPT answers scraped through a BrightData dataset.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::citations::{self, CitationLink};
use crate::error::{BatchError, BatchResult};
use crate::providers::brightdata::{self, BrightDataApi};
use crate::traits::adapter::ProviderAdapter;
use crate::traits::transport::HttpRequest;
use crate::types::{Locale, ParsedAnswer, Prompt, RawResultEntry, SharedParams};

const TARGET_URL: &str = "https://chatgpt.com/";

#[derive(Debug, Serialize)]
struct ChatGptInput<'a> {
    url: &'static str,
    prompt: &'a str,
    country: String,
    web_search: bool,
    index: usize,
    additional_prompt: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatGptRequest<'a> {
    input: Vec<ChatGptInput<'a>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatGptAnswer {
    #[serde(default)]
    answer_text_markdown: Option<String>,
    #[serde(default)]
    citations: Value,
    #[serde(default)]
    links_attached: Option<Vec<CitationLink>>,
}

pub struct ChatGptAdapter {
    api: Arc<BrightDataApi>,
    dataset_id: String,
}

impl ChatGptAdapter {
    pub fn new(api: Arc<BrightDataApi>, dataset_id: impl Into<String>) -> Self {
        Self {
            api,
            dataset_id: dataset_id.into(),
        }
    }
}

impl ProviderAdapter for ChatGptAdapter {
    fn name(&self) -> &str {
        "chatgpt"
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
        let request = ChatGptRequest {
            input: prompts
                .iter()
                .map(|prompt| ChatGptInput {
                    url: TARGET_URL,
                    prompt: prompt.text(),
                    country: country.clone(),
                    web_search: prompt.web_search(),
                    index: prompt.index(),
                    additional_prompt: "",
                })
                .collect(),
        };
        let body = serde_json::to_value(&request).map_err(|e| BatchError::InvalidRequest {
            provider: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.api.trigger_request(&self.dataset_id, body))
    }

    fn parse_entry(&self, entry: &RawResultEntry) -> ParsedAnswer {
        if let Some(error) = entry.error_message() {
            return ParsedAnswer::failure(format!("provider error: {error}"));
        }
        let answer: ChatGptAnswer = match serde_json::from_value(entry.body().clone()) {
            Ok(answer) => answer,
            Err(e) => return ParsedAnswer::failure(format!("unreadable entry: {e}")),
        };
        let markdown = answer.answer_text_markdown.unwrap_or_default();
        if markdown.trim().is_empty() {
            return ParsedAnswer::failure("empty answer");
        }

        let links = answer.links_attached.unwrap_or_default();
        let text = citations::link_markers(&markdown, &links);
        let urls = citations::collect_urls(
            citations::citation_values(&answer.citations)
                .into_iter()
                .chain(links.iter().filter_map(|l| l.url.as_deref())),
        );
        ParsedAnswer::success(text, urls)
    }

    fn cost_per_prompt(&self) -> f64 {
        brightdata::COST_PER_PROMPT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::SecretString;
    use crate::types::{PromptBatch, ReconciledResponse, FAILED_ANSWER_TEXT};
    use serde_json::json;

    fn adapter() -> ChatGptAdapter {
        let api = BrightDataApi::new(SecretString::new("k")).with_base_url("http://bd.test");
        ChatGptAdapter::new(Arc::new(api), "gd_chatgpt")
    }

    #[test]
    fn test_request_carries_indexes_and_locale() {
        let params = SharedParams::new(Locale::country("uk")).with_web_search(false);
        let batch = PromptBatch::new(["best crm?", "best ats?"], params.clone());

        let request = adapter().build_request(batch.prompts(), &params).unwrap();

        assert!(request.url.contains("dataset_id=gd_chatgpt"));
        assert_eq!(
            request.body.unwrap(),
            json!({"input": [
                {"url": "https://chatgpt.com/", "prompt": "best crm?", "country": "GB",
                 "web_search": false, "index": 1, "additional_prompt": ""},
                {"url": "https://chatgpt.com/", "prompt": "best ats?", "country": "GB",
                 "web_search": false, "index": 2, "additional_prompt": ""}
            ]})
        );
    }

    #[test]
    fn test_parse_links_citations() {
        let entry = RawResultEntry::new(json!({
            "index": 1,
            "prompt": "best crm?",
            "answer_text_markdown": r"HubSpot \[1\] and Pipedrive \[2\].",
            "citations": ["https://hubspot.com"],
            "links_attached": [
                {"url": "https://hubspot.com", "text": "HubSpot", "position": 1},
                {"url": "https://pipedrive.com", "text": "Pipedrive", "position": 2}
            ]
        }));

        let parsed = adapter().parse_entry(&entry);
        assert!(parsed.succeeded);
        assert_eq!(
            parsed.text,
            "HubSpot [1](https://hubspot.com) and Pipedrive [2](https://pipedrive.com)."
        );
        assert_eq!(
            parsed.citations,
            vec!["https://hubspot.com", "https://pipedrive.com"]
        );
    }

    #[test]
    fn test_incomplete_links_keep_the_answer() {
        let entry = RawResultEntry::new(json!({
            "index": 1,
            "prompt": "best crm?",
            "answer_text_markdown": r"HubSpot \[1\] is good.",
            "citations": null,
            "links_attached": [
                {"url": "https://hubspot.com", "text": "HubSpot", "position": 1},
                {"url": "https://g2.com", "position": null},
                {"text": "dangling", "position": 2}
            ]
        }));

        let parsed = adapter().parse_entry(&entry);
        assert!(parsed.succeeded, "{:?}", parsed.failure_reason);
        assert_eq!(parsed.text, "HubSpot [1](https://hubspot.com) is good.");
        assert_eq!(parsed.citations, vec!["https://hubspot.com", "https://g2.com"]);

        let cost = ReconciledResponse::from_parsed(1, parsed, brightdata::COST_PER_PROMPT).cost;
        assert_eq!(cost, brightdata::COST_PER_PROMPT);
    }

    #[test]
    fn test_error_and_empty_entries_fail() {
        let adapter = adapter();
        let errored = adapter.parse_entry(&RawResultEntry::new(json!({
            "error": "Page did not load",
            "input": {"index": 1, "prompt": "q"}
        })));
        assert!(!errored.succeeded);
        assert_eq!(errored.text, FAILED_ANSWER_TEXT);
        assert!(errored.failure_reason.unwrap().contains("Page did not load"));

        let empty = adapter.parse_entry(&RawResultEntry::new(json!({
            "index": 1, "prompt": "q", "answer_text_markdown": "  ", "citations": null
        })));
        assert!(!empty.succeeded);
        assert_eq!(empty.failure_reason.as_deref(), Some("empty answer"));
    }
}
