//! The batch pipeline: submit, poll, fetch, reconcile.
//!
//! One [`BatchPipeline`] run handles one provider-sized batch from start to
//! finish. Pipelines share nothing mutable, so independent runs can proceed
//! concurrently.

pub mod fetch;
pub mod poll;
pub mod reconcile;
pub mod submit;

pub use fetch::ResultFetcher;
pub use poll::JobPoller;
pub use reconcile::{correlate, Correlation, IndexRejection, MatchStrategy, ResultReconciler};
pub use submit::JobSubmitter;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::PipelineSettings;
use crate::error::{BatchError, BatchResult};
use crate::invoker::ResilientInvoker;
use crate::traits::adapter::ProviderAdapter;
use crate::traits::backend::JobBackend;
use crate::traits::diagnostics::DiagnosticSink;
use crate::types::{JobStatus, PromptBatch, ReconciledResponse};

/// Sequential submit → poll → fetch → reconcile for one provider.
pub struct BatchPipeline {
    submitter: JobSubmitter,
    poller: JobPoller,
    fetcher: ResultFetcher,
    reconciler: ResultReconciler,
}

impl BatchPipeline {
    pub fn new(
        invoker: &ResilientInvoker,
        adapter: Arc<dyn ProviderAdapter>,
        backend: Arc<dyn JobBackend>,
        settings: &PipelineSettings,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            submitter: JobSubmitter::new(
                invoker.with_policy(settings.submit_retry),
                Arc::clone(&adapter),
                Arc::clone(&backend),
            ),
            poller: JobPoller::new(
                invoker.with_policy(settings.poll_retry),
                Arc::clone(&backend),
                settings.poll_interval,
            ),
            fetcher: ResultFetcher::new(
                invoker.with_policy(settings.fetch_retry),
                backend,
                Arc::clone(&sink),
                settings.fetch_max_attempts,
                settings.fetch_retry_interval,
            ),
            reconciler: ResultReconciler::new(adapter, sink),
        }
    }

    /// Run one batch to completion.
    ///
    /// Returns exactly one response per prompt, in submission order, or a
    /// single error if the batch as a whole could not be completed.
    pub async fn run(
        &self,
        batch: &PromptBatch,
        cancel: &CancellationToken,
    ) -> BatchResult<Vec<ReconciledResponse>> {
        let handle = self.submitter.submit(batch, cancel).await?;

        if self.poller.await_ready(&handle, cancel).await? == JobStatus::Failed {
            return Err(BatchError::JobFailed {
                handle: handle.to_string(),
            });
        }

        let entries = self.fetcher.fetch(&handle, cancel).await?;
        let responses = self.reconciler.reconcile(&handle, batch.prompts(), &entries)?;

        info!(
            handle = %handle,
            prompts = batch.len(),
            failed = responses.iter().filter(|r| !r.succeeded).count(),
            elapsed_secs = handle.elapsed_secs(),
            "Batch complete"
        );
        Ok(responses)
    }
}
