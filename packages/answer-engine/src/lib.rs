//! Asynchronous Batch Job Client for answer-generation providers.
//!
//! Submits batches of independent prompts to job-based providers, polls the
//! job until it is ready, retrieves results that may be incomplete, reordered
//! or partially failed, and attributes every result to the exact prompt that
//! produced it. A caller never receives an answer attributed to the wrong
//! question.
//!
//! # Usage
//!
//! ```rust,ignore
//! use answer_engine::{BatchOrchestrator, EngineConfig, Locale, SharedParams};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = EngineConfig::from_env()?;
//! let orchestrator = BatchOrchestrator::from_config(&config)?;
//!
//! let prompts = vec!["best crm for startups?".to_string()];
//! let params = SharedParams::new(Locale::country("GB"));
//! let responses = orchestrator
//!     .run_batch("chatgpt", &prompts, &params, &CancellationToken::new())
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`invoker`] - Bounded, cancellable retry around one request
//! - [`pipeline`] - Submit, poll, fetch and reconcile for one batch
//! - [`providers`] - BrightData-backed and direct provider adapters
//! - [`registry`] - Model identifier to provider lookup
//! - [`orchestrator`] - Chunking, direct providers and matrix runs
//! - [`traits`] - Transport, adapter, backend and diagnostic seams
//! - [`testing`] - Scripted transport and fixtures for tests

pub mod citations;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod http;
pub mod invoker;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod registry;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use config::{EngineConfig, PipelineSettings};
pub use error::{
    BatchError, BatchResult, ConfigError, ErrorCategory, ReconcileError, Stage, TransportError,
};
pub use http::HttpTransport;
pub use invoker::{Backoff, ResilientInvoker, RetryPolicy};
pub use orchestrator::{BatchOrchestrator, GroupOutcome, MatrixGroup, MatrixReport};
pub use pipeline::BatchPipeline;
pub use registry::{ProviderRegistry, ProviderRoute};
pub use security::SecretString;
pub use traits::{
    adapter::ProviderAdapter,
    backend::{JobBackend, ResultsPayload},
    diagnostics::{Diagnostic, DiagnosticSink},
    transport::{HttpReply, HttpRequest, Method, Transport},
};
pub use types::{
    JobHandle, JobStatus, Locale, ParsedAnswer, Prompt, PromptBatch, RawResultEntry,
    ReconciledResponse, SharedParams, FAILED_ANSWER_TEXT,
};
