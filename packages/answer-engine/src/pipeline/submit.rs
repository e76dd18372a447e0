//! Job submission.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{truncate_body, BatchError, BatchResult, Stage};
use crate::invoker::ResilientInvoker;
use crate::traits::adapter::ProviderAdapter;
use crate::traits::backend::JobBackend;
use crate::types::{JobHandle, PromptBatch};

/// Sends a whole prompt batch as one job and returns its handle.
pub struct JobSubmitter {
    invoker: ResilientInvoker,
    adapter: Arc<dyn ProviderAdapter>,
    backend: Arc<dyn JobBackend>,
}

impl JobSubmitter {
    pub fn new(
        invoker: ResilientInvoker,
        adapter: Arc<dyn ProviderAdapter>,
        backend: Arc<dyn JobBackend>,
    ) -> Self {
        Self {
            invoker,
            adapter,
            backend,
        }
    }

    pub async fn submit(&self, batch: &PromptBatch, cancel: &CancellationToken) -> BatchResult<JobHandle> {
        self.validate(batch)?;

        let request = self.adapter.build_request(batch.prompts(), batch.params())?;
        let reply = self
            .invoker
            .invoke("submit", &request, cancel)
            .await
            .map_err(|e| BatchError::transport(Stage::Submit, None, e))?;

        let id = self
            .backend
            .parse_handle(&reply)
            .ok_or_else(|| BatchError::MissingHandle {
                provider: self.adapter.name().to_string(),
                body: truncate_body(&reply.body),
            })?;
        let handle = JobHandle::new(self.adapter.name(), id);

        info!(
            provider = self.adapter.name(),
            handle = %handle,
            prompts = batch.len(),
            locale = %batch.params().locale,
            "Batch submitted"
        );
        Ok(handle)
    }

    /// Size limits. Indexes need no check: `PromptBatch` assigns 1..=n.
    fn validate(&self, batch: &PromptBatch) -> BatchResult<()> {
        if batch.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        let max = self.adapter.max_batch_size();
        if batch.len() > max {
            return Err(BatchError::BatchTooLarge {
                provider: self.adapter.name().to_string(),
                size: batch.len(),
                max,
            });
        }
        Ok(())
    }
}
