//! Testing utilities: a scripted transport, an in-memory diagnostic sink and
//! fixtures shaped like real provider payloads.
//!
//! Useful for exercising pipelines and orchestrators without network calls.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::PipelineSettings;
use crate::invoker::{Backoff, RetryPolicy};
use crate::traits::diagnostics::{Diagnostic, DiagnosticSink};
use crate::traits::transport::{ConnectionFailure, HttpReply, HttpRequest, Method, Transport};

/// One scripted outcome for a route.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(HttpReply),
    Fail(String),
}

impl Scripted {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Reply(HttpReply::new(200, body))
    }

    pub fn json(value: Value) -> Self {
        Self::ok(value.to_string())
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Reply(HttpReply::new(status, body))
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

/// Record of a request sent through the scripted transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

struct Route {
    method: Method,
    fragment: String,
    queue: VecDeque<Scripted>,
    last: Option<Scripted>,
}

/// Transport that answers from per-route scripts.
///
/// A route matches on method and a URL substring; the first matching route
/// wins. Once a route's script is used up, its final outcome repeats.
/// Unmatched requests get a 404.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    routes: Arc<Mutex<Vec<Route>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a route.
    pub fn on(
        self,
        method: Method,
        url_fragment: impl Into<String>,
        outcomes: impl IntoIterator<Item = Scripted>,
    ) -> Self {
        self.routes.lock().unwrap().push(Route {
            method,
            fragment: url_fragment.into(),
            queue: outcomes.into_iter().collect(),
            last: None,
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests whose URL contains `fragment`.
    pub fn call_count(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url.contains(fragment))
            .count()
    }

    /// Bodies of requests whose URL contains `fragment`, in send order.
    pub fn bodies(&self, fragment: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url.contains(fragment))
            .filter_map(|c| c.body.clone())
            .collect()
    }

    fn next_outcome(&self, request: &HttpRequest) -> Option<Scripted> {
        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| r.method == request.method && request.url.contains(&r.fragment))?;
        match route.queue.pop_front() {
            Some(outcome) => {
                route.last = Some(outcome.clone());
                Some(outcome)
            }
            None => route.last.clone(),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpReply, ConnectionFailure> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method,
            url: request.url.clone(),
            body: request.body.clone(),
            bearer: request.bearer.as_ref().map(|t| t.expose().to_string()),
        });

        match self.next_outcome(request) {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Fail(message)) => Err(ConnectionFailure::new(message)),
            None => Ok(HttpReply::new(404, format!("no scripted route for {}", request.url))),
        }
    }
}

/// Diagnostic sink that keeps everything in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Diagnostic>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.lock().unwrap().clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, diagnostic: Diagnostic) {
        self.records.lock().unwrap().push(diagnostic);
    }
}

/// Pipeline settings with millisecond waits.
pub fn fast_settings() -> PipelineSettings {
    let retry = RetryPolicy::new(3, Backoff::Fixed(Duration::from_millis(1)));
    PipelineSettings::default()
        .with_poll_interval(Duration::from_millis(5))
        .with_fetch_schedule(5, Duration::from_millis(5))
        .with_call_retry(retry)
        .with_poll_retry(retry)
}

/// Successful dataset entry echoing `index` and `prompt`.
pub fn answer_entry(index: i64, prompt: &str, answer: &str) -> Value {
    json!({
        "url": "https://chatgpt.com/",
        "prompt": prompt,
        "index": index,
        "answer_text_markdown": answer,
        "links_attached": [],
        "citations": null,
        "input": {
            "url": "https://chatgpt.com/",
            "prompt": prompt,
            "country": "US",
            "index": index
        }
    })
}

/// Error-shaped dataset entry: echo fields only under `input`.
pub fn error_entry(index: i64, prompt: &str, error: &str) -> Value {
    json!({
        "error": error,
        "error_code": "dead_page",
        "input": {
            "url": "https://chatgpt.com/",
            "prompt": prompt,
            "country": "US",
            "index": index
        }
    })
}

pub fn trigger_reply(snapshot_id: &str) -> Scripted {
    Scripted::json(json!({ "snapshot_id": snapshot_id }))
}

pub fn progress_reply(status: &str) -> Scripted {
    Scripted::json(json!({ "status": status, "snapshot_id": "s", "records": 0, "errors": 0 }))
}

pub fn building_reply() -> Scripted {
    Scripted::status(
        202,
        json!({ "status": "building", "message": "Snapshot is building, try again in 30s" })
            .to_string(),
    )
}
