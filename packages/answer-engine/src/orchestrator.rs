//! Batch orchestration: chunking, direct providers, and model×locale matrices.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{EngineConfig, PipelineSettings};
use crate::diagnostics::TracingSink;
use crate::error::{truncate_body, BatchError, BatchResult, ConfigResult, Stage};
use crate::http::HttpTransport;
use crate::invoker::ResilientInvoker;
use crate::pipeline::BatchPipeline;
use crate::registry::{normalize_model, ProviderRegistry, ProviderRoute};
use crate::traits::adapter::ProviderAdapter;
use crate::traits::backend::JobBackend;
use crate::traits::diagnostics::DiagnosticSink;
use crate::types::{Locale, PromptBatch, ReconciledResponse, SharedParams};

/// One model×locale combination in a matrix run.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixGroup {
    pub model: String,
    pub params: SharedParams,
}

impl MatrixGroup {
    pub fn new(model: impl Into<String>, params: SharedParams) -> Self {
        Self {
            model: model.into(),
            params,
        }
    }
}

/// Result of one group in a matrix run.
#[derive(Debug)]
pub struct GroupOutcome {
    pub group: MatrixGroup,
    pub result: BatchResult<Vec<ReconciledResponse>>,
}

/// Per-group outcomes of a matrix run, in the order the groups were given.
#[derive(Debug, Default)]
pub struct MatrixReport {
    pub outcomes: Vec<GroupOutcome>,
}

impl MatrixReport {
    /// Sum of cost over every successful group.
    pub fn total_cost(&self) -> f64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flatten()
            .map(|r| r.cost)
            .sum()
    }

    pub fn failures(&self) -> Vec<(&MatrixGroup, &BatchError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.group, e)))
            .collect()
    }

    /// Responses of the group run for `model` and `locale`, if it succeeded.
    /// The model is matched the way the registry resolves it.
    pub fn responses_for(&self, model: &str, locale: &Locale) -> Option<&[ReconciledResponse]> {
        let model = normalize_model(model);
        self.outcomes
            .iter()
            .find(|o| normalize_model(&o.group.model) == model && &o.group.params.locale == locale)
            .and_then(|o| o.result.as_deref().ok())
    }
}

/// Entry point for running prompts against registered providers.
///
/// Holds only read-only state (registry, shared transport, settings), so one
/// orchestrator can drive many concurrent runs.
pub struct BatchOrchestrator {
    registry: ProviderRegistry,
    invoker: ResilientInvoker,
    settings: PipelineSettings,
    sink: Arc<dyn DiagnosticSink>,
}

impl BatchOrchestrator {
    pub fn new(registry: ProviderRegistry, invoker: ResilientInvoker, settings: PipelineSettings) -> Self {
        Self {
            registry,
            invoker,
            settings,
            sink: Arc::new(TracingSink),
        }
    }

    /// Build the registry and HTTP transport from configuration.
    pub fn from_config(config: &EngineConfig) -> ConfigResult<Self> {
        let transport = HttpTransport::new(config.http_timeout)?;
        Ok(Self::new(
            ProviderRegistry::from_config(config),
            ResilientInvoker::new(Arc::new(transport)),
            config.pipeline.clone(),
        ))
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Run every prompt in `texts` against `model`.
    ///
    /// Job providers get provider-sized chunks, one after another; the first
    /// chunk that fails aborts the run. Direct providers are called once per
    /// prompt. Responses come back in input order with `prompt_index` set to
    /// the 1-based input position.
    pub async fn run_batch(
        &self,
        model: &str,
        texts: &[String],
        params: &SharedParams,
        cancel: &CancellationToken,
    ) -> BatchResult<Vec<ReconciledResponse>> {
        let route = self.registry.resolve(model)?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match route {
            ProviderRoute::Job { adapter, backend } => {
                self.run_chunked(adapter, backend, texts, params, cancel).await
            }
            ProviderRoute::Direct { adapter } => {
                let mut responses = Vec::with_capacity(texts.len());
                for (position, text) in texts.iter().enumerate() {
                    let mut response = self.run_direct(adapter.as_ref(), text, params, cancel).await?;
                    response.prompt_index = position + 1;
                    responses.push(response);
                }
                Ok(responses)
            }
        }
    }

    /// Run one prompt. Job providers run it as a batch of one.
    pub async fn run_single(
        &self,
        model: &str,
        text: &str,
        params: &SharedParams,
        cancel: &CancellationToken,
    ) -> BatchResult<ReconciledResponse> {
        match self.registry.resolve(model)? {
            ProviderRoute::Job { adapter, backend } => {
                let pipeline = self.pipeline(adapter, backend);
                let batch = PromptBatch::new([text], params.clone());
                pipeline
                    .run(&batch, cancel)
                    .await?
                    .pop()
                    .ok_or(BatchError::EmptyBatch)
            }
            ProviderRoute::Direct { adapter } => {
                self.run_direct(adapter.as_ref(), text, params, cancel).await
            }
        }
    }

    /// Run `texts` for every group concurrently.
    ///
    /// Groups are independent: one failing never stops the others.
    pub async fn run_matrix(
        &self,
        texts: &[String],
        groups: &[MatrixGroup],
        cancel: &CancellationToken,
    ) -> MatrixReport {
        info!(groups = groups.len(), prompts = texts.len(), "Starting matrix run");

        let runs = groups.iter().map(|group| async move {
            let result = self.run_batch(&group.model, texts, &group.params, cancel).await;
            if let Err(e) = &result {
                warn!(model = %group.model, locale = %group.params.locale, error = %e, "Matrix group failed");
            }
            GroupOutcome {
                group: group.clone(),
                result,
            }
        });
        let report = MatrixReport {
            outcomes: join_all(runs).await,
        };

        info!(
            groups = groups.len(),
            failed = report.failures().len(),
            total_cost = report.total_cost(),
            "Matrix run complete"
        );
        report
    }

    async fn run_chunked(
        &self,
        adapter: &Arc<dyn ProviderAdapter>,
        backend: &Arc<dyn JobBackend>,
        texts: &[String],
        params: &SharedParams,
        cancel: &CancellationToken,
    ) -> BatchResult<Vec<ReconciledResponse>> {
        let chunk_size = if adapter.supports_batching() {
            adapter.max_batch_size().max(1)
        } else {
            1
        };
        let chunk_count = texts.len().div_ceil(chunk_size);
        let pipeline = self.pipeline(adapter, backend);
        let mut responses = Vec::with_capacity(texts.len());

        for (chunk_number, chunk) in texts.chunks(chunk_size).enumerate() {
            let offset = chunk_number * chunk_size;
            info!(
                provider = adapter.name(),
                chunk = chunk_number + 1,
                chunks = chunk_count,
                prompts = chunk.len(),
                "Running chunk"
            );

            let batch = PromptBatch::new(chunk.iter().cloned(), params.clone());
            let chunk_responses = pipeline.run(&batch, cancel).await.inspect_err(|e| {
                warn!(
                    provider = adapter.name(),
                    chunk = chunk_number + 1,
                    category = ?e.category(),
                    error = %e,
                    "Chunk failed, aborting batch"
                );
            })?;

            responses.extend(chunk_responses.into_iter().map(|mut response| {
                response.prompt_index += offset;
                response
            }));
        }
        Ok(responses)
    }

    async fn run_direct(
        &self,
        adapter: &dyn ProviderAdapter,
        text: &str,
        params: &SharedParams,
        cancel: &CancellationToken,
    ) -> BatchResult<ReconciledResponse> {
        let batch = PromptBatch::new([text], params.clone());
        let request = adapter.build_request(batch.prompts(), params)?;
        let reply = self
            .invoker
            .with_policy(self.settings.direct_retry)
            .invoke(adapter.name(), &request, cancel)
            .await
            .map_err(|e| BatchError::transport(Stage::Direct, None, e))?;

        let entry = adapter
            .entry_from_reply(&reply)
            .map_err(|reason| BatchError::MalformedReply {
                provider: adapter.name().to_string(),
                reason,
                body: truncate_body(&reply.body),
            })?;
        let parsed = adapter.parse_entry(&entry);
        if !parsed.succeeded {
            warn!(
                provider = adapter.name(),
                locale = %adapter.map_locale(&params.locale),
                reason = parsed.failure_reason.as_deref().unwrap_or("unknown"),
                "Answer failed"
            );
        }
        Ok(ReconciledResponse::from_parsed(1, parsed, adapter.cost_per_prompt()))
    }

    fn pipeline(&self, adapter: &Arc<dyn ProviderAdapter>, backend: &Arc<dyn JobBackend>) -> BatchPipeline {
        BatchPipeline::new(
            &self.invoker,
            Arc::clone(adapter),
            Arc::clone(backend),
            &self.settings,
            Arc::clone(&self.sink),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParsedAnswer;

    fn outcome(model: &str, locale: Locale) -> GroupOutcome {
        let response = ReconciledResponse::from_parsed(1, ParsedAnswer::success("HubSpot.", Vec::new()), 0.0015);
        GroupOutcome {
            group: MatrixGroup::new(model, SharedParams::new(locale)),
            result: Ok(vec![response]),
        }
    }

    #[test]
    fn test_responses_for_matches_models_like_the_registry() {
        let report = MatrixReport {
            outcomes: vec![outcome("ChatGPT", Locale::country("US")), outcome(" linkup ", Locale::country("DE"))],
        };

        for model in ["chatgpt", "CHATGPT", " ChatGPT\t"] {
            assert_eq!(report.responses_for(model, &Locale::country("US")).map(<[_]>::len), Some(1), "{model:?}");
        }
        assert!(report.responses_for("LinkUp", &Locale::country("DE")).is_some());
        assert!(report.responses_for("chatgpt", &Locale::country("DE")).is_none());
        assert!(report.responses_for("gemini", &Locale::country("US")).is_none());
    }
}
