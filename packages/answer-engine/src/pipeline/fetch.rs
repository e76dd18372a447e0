//! Result retrieval for a ready job.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{truncate_body, BatchError, BatchResult, Stage};
use crate::invoker::ResilientInvoker;
use crate::traits::backend::{JobBackend, ResultsPayload};
use crate::traits::diagnostics::{Diagnostic, DiagnosticSink};
use crate::types::{JobHandle, RawResultEntry};

/// Retrieves a ready job's result set.
///
/// A ready job may still answer "assembling"; that sub-state is retried on
/// its own schedule, separate from polling and from transport retries.
pub struct ResultFetcher {
    invoker: ResilientInvoker,
    backend: Arc<dyn JobBackend>,
    sink: Arc<dyn DiagnosticSink>,
    max_attempts: u32,
    retry_interval: Duration,
}

impl ResultFetcher {
    pub fn new(
        invoker: ResilientInvoker,
        backend: Arc<dyn JobBackend>,
        sink: Arc<dyn DiagnosticSink>,
        max_attempts: u32,
        retry_interval: Duration,
    ) -> Self {
        Self {
            invoker,
            backend,
            sink,
            max_attempts: max_attempts.max(1),
            retry_interval,
        }
    }

    pub async fn fetch(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> BatchResult<Vec<RawResultEntry>> {
        let request = self.backend.results_request(handle);

        for attempt in 1..=self.max_attempts {
            let reply = self
                .invoker
                .invoke("fetch", &request, cancel)
                .await
                .map_err(|e| BatchError::transport(Stage::Fetch, Some(handle), e))?;
            debug!(handle = %handle, attempt, status = reply.status, bytes = reply.body.len(), "Results reply");

            match self.backend.classify_results(&reply) {
                ResultsPayload::Entries(entries) if entries.is_empty() => {
                    return Err(BatchError::EmptyResults {
                        handle: handle.to_string(),
                    });
                }
                ResultsPayload::Entries(entries) => {
                    info!(handle = %handle, entries = entries.len(), attempt, "Results retrieved");
                    return Ok(entries);
                }
                ResultsPayload::Failed { message } => {
                    return Err(BatchError::AssemblyFailed {
                        handle: handle.to_string(),
                        message,
                    });
                }
                ResultsPayload::Malformed { reason } => {
                    self.sink.record(Diagnostic::UndecodableResults {
                        provider: handle.provider().to_string(),
                        handle: handle.to_string(),
                        reason: reason.clone(),
                        body: reply.body.clone(),
                    });
                    return Err(BatchError::MalformedResults {
                        handle: handle.to_string(),
                        reason,
                        body: truncate_body(&reply.body),
                    });
                }
                ResultsPayload::Assembling { message } => {
                    info!(
                        handle = %handle,
                        attempt,
                        max_attempts = self.max_attempts,
                        message = %message,
                        "Results still assembling"
                    );
                    if attempt < self.max_attempts {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                return Err(BatchError::Cancelled { stage: Stage::Fetch });
                            }
                            _ = tokio::time::sleep(self.retry_interval) => {}
                        }
                    }
                }
            }
        }

        Err(BatchError::AssemblyTimeout {
            handle: handle.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::invoker::{Backoff, RetryPolicy};
    use crate::providers::BrightDataApi;
    use crate::security::SecretString;
    use crate::testing::{answer_entry, building_reply, MemorySink, Scripted, ScriptedTransport};
    use crate::traits::transport::Method;
    use serde_json::json;

    fn fetcher(transport: &ScriptedTransport, sink: &MemorySink, max_attempts: u32) -> ResultFetcher {
        let invoker = ResilientInvoker::new(Arc::new(transport.clone()))
            .with_policy(RetryPolicy::new(2, Backoff::Fixed(Duration::from_millis(1))));
        let backend = BrightDataApi::new(SecretString::new("k")).with_base_url("http://bd.test");
        ResultFetcher::new(
            invoker,
            Arc::new(backend),
            Arc::new(sink.clone()),
            max_attempts,
            Duration::from_millis(2),
        )
    }

    #[tokio::test]
    async fn test_empty_result_set_is_an_error() {
        let transport = ScriptedTransport::new().on(Method::Get, "/snapshot/", [Scripted::ok("[]")]);
        let err = fetcher(&transport, &MemorySink::new(), 5)
            .fetch(&JobHandle::new("chatgpt", "s_1"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::EmptyResults { .. }));
        assert_eq!(err.category(), ErrorCategory::Assembly);
    }

    #[tokio::test]
    async fn test_malformed_body_is_surfaced_and_recorded() {
        let body = "<html>502 Bad Gateway</html>";
        let transport = ScriptedTransport::new().on(Method::Get, "/snapshot/", [Scripted::ok(body)]);
        let sink = MemorySink::new();

        let err = fetcher(&transport, &sink, 5)
            .fetch(&JobHandle::new("chatgpt", "s_1"), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            BatchError::MalformedResults { body: kept, .. } => assert_eq!(kept, body),
            other => panic!("expected MalformedResults, got {other:?}"),
        }
        match sink.records().as_slice() {
            [Diagnostic::UndecodableResults { body: dumped, handle, .. }] => {
                assert_eq!(dumped, body);
                assert_eq!(handle, "chatgpt:s_1");
            }
            other => panic!("unexpected diagnostics {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_assembly_stops_immediately() {
        let transport = ScriptedTransport::new().on(
            Method::Get,
            "/snapshot/",
            [
                building_reply(),
                Scripted::json(json!({"status": "failed", "message": "Snapshot failed"})),
            ],
        );
        let err = fetcher(&transport, &MemorySink::new(), 10)
            .fetch(&JobHandle::new("chatgpt", "s_1"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::AssemblyFailed { ref message, .. } if message == "Snapshot failed"));
        assert_eq!(transport.call_count("/snapshot/"), 2);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_assembly() {
        let transport = ScriptedTransport::new().on(Method::Get, "/snapshot/", [building_reply()]);
        let invoker = ResilientInvoker::new(Arc::new(transport.clone()))
            .with_policy(RetryPolicy::new(1, Backoff::Fixed(Duration::ZERO)));
        let backend = BrightDataApi::new(SecretString::new("k")).with_base_url("http://bd.test");
        let fetcher = ResultFetcher::new(
            invoker,
            Arc::new(backend),
            Arc::new(MemorySink::new()),
            20,
            Duration::from_secs(30),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = fetcher
            .fetch(&JobHandle::new("chatgpt", "s_1"), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::Cancelled { stage: Stage::Fetch }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(transport.call_count("/snapshot/"), 1);
    }

    #[tokio::test]
    async fn test_transport_retries_do_not_consume_assembly_attempts() {
        let transport = ScriptedTransport::new().on(
            Method::Get,
            "/snapshot/",
            [
                Scripted::status(503, "busy"),
                building_reply(),
                Scripted::json(json!([answer_entry(1, "q", "a")])),
            ],
        );
        let entries = fetcher(&transport, &MemorySink::new(), 2)
            .fetch(&JobHandle::new("chatgpt", "s_1"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(transport.call_count("/snapshot/"), 3);
    }
}
