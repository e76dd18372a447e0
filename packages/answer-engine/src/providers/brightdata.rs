//! BrightData dataset API: the trigger/progress/snapshot job protocol shared
//! by every BrightData-scraped answer engine.

use serde::Deserialize;
use serde_json::Value;

use crate::security::SecretString;
use crate::traits::backend::{JobBackend, ResultsPayload};
use crate::traits::transport::{HttpReply, HttpRequest};
use crate::types::{JobHandle, JobStatus, Locale, RawResultEntry};

pub const DEFAULT_BASE_URL: &str = "https://api.brightdata.com/datasets/v3";

/// Largest batch BrightData datasets accept per trigger.
pub const MAX_BATCH_SIZE: usize = 20;

/// Flat charge per answered prompt, USD.
pub const COST_PER_PROMPT: f64 = 0.0015;

const SUPPORTED_COUNTRIES: &[&str] = &[
    "US", "CA", "GB", "AU", "DE", "FR", "IT", "ES", "NL", "JP", "KR", "IN", "BR", "MX",
];

/// Map a locale onto a country code the datasets accept, falling back to US.
pub fn map_country(locale: &Locale) -> String {
    let code = locale.country.trim().to_ascii_uppercase();
    let code = if code == "UK" { "GB".to_string() } else { code };
    if SUPPORTED_COUNTRIES.contains(&code.as_str()) {
        code
    } else {
        "US".to_string()
    }
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    snapshot_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProgressResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct SnapshotStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Client for the dataset endpoints, holding the account credential.
#[derive(Clone, Debug)]
pub struct BrightDataApi {
    base_url: String,
    api_key: SecretString,
}

impl BrightDataApi {
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

    /// Trigger collection on `dataset_id` with `body` as input.
    pub fn trigger_request(&self, dataset_id: &str, body: Value) -> HttpRequest {
        let url = format!(
            "{}/trigger?dataset_id={}&include_errors=true",
            self.base_url, dataset_id
        );
        HttpRequest::post(url, body).with_bearer(self.api_key.clone())
    }
}

impl JobBackend for BrightDataApi {
    fn name(&self) -> &str {
        "brightdata"
    }

    fn parse_handle(&self, reply: &HttpReply) -> Option<String> {
        serde_json::from_str::<TriggerResponse>(&reply.body)
            .ok()?
            .snapshot_id
            .filter(|id| !id.trim().is_empty())
    }

    fn status_request(&self, handle: &JobHandle) -> HttpRequest {
        HttpRequest::get(format!("{}/progress/{}", self.base_url, handle.id()))
            .with_bearer(self.api_key.clone())
    }

    fn parse_status(&self, reply: &HttpReply) -> Result<JobStatus, String> {
        let progress: ProgressResponse =
            serde_json::from_str(&reply.body).map_err(|e| e.to_string())?;
        Ok(match progress.status.to_ascii_lowercase().as_str() {
            "ready" => JobStatus::Ready,
            "failed" => JobStatus::Failed,
            "starting" | "scheduled" | "queued" => JobStatus::Submitted,
            _ => JobStatus::Running,
        })
    }

    fn results_request(&self, handle: &JobHandle) -> HttpRequest {
        HttpRequest::get(format!(
            "{}/snapshot/{}?format=json",
            self.base_url,
            handle.id()
        ))
        .with_bearer(self.api_key.clone())
    }

    fn classify_results(&self, reply: &HttpReply) -> ResultsPayload {
        let value: Value = match serde_json::from_str(&reply.body) {
            Ok(value) => value,
            Err(e) => {
                return ResultsPayload::Malformed {
                    reason: e.to_string(),
                }
            }
        };

        match value {
            Value::Array(items) => {
                ResultsPayload::Entries(items.into_iter().map(RawResultEntry::new).collect())
            }
            Value::Object(_) => match serde_json::from_value::<SnapshotStatus>(value) {
                Ok(s) if s.status == "building" => ResultsPayload::Assembling { message: s.message },
                Ok(s) if s.status == "failed" => ResultsPayload::Failed { message: s.message },
                Ok(s) => ResultsPayload::Malformed {
                    reason: format!("expected a result array, got status object {:?}", s.status),
                },
                Err(e) => ResultsPayload::Malformed {
                    reason: e.to_string(),
                },
            },
            other => ResultsPayload::Malformed {
                reason: format!("expected a result array, got {}", json_kind(&other)),
            },
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
