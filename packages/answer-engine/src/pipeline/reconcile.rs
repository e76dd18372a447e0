//! Attributing raw result entries to the prompts that produced them.
//!
//! Two strategies, tried in order:
//!
//! 1. **Index**: every entry echoes a distinct index in `1..=n` and there are
//!    exactly `n` of them. Relies only on the identifier the client assigned.
//! 2. **Content**: each prompt's exact text is looked up among the echoed
//!    prompt texts. Any prompt without a match, or any entry whose text matches
//!    no prompt, fails the batch.
//!
//! Array order is never used.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{preview, BatchError, BatchResult, ReconcileError};
use crate::traits::adapter::ProviderAdapter;
use crate::traits::diagnostics::{Diagnostic, DiagnosticSink};
use crate::types::{JobHandle, Prompt, RawResultEntry, ReconciledResponse};

const TEXT_PREVIEW_LIMIT: usize = 80;

/// Why the index strategy was not trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexRejection {
    Missing { position: usize },
    OutOfRange { position: usize, index: i64 },
    Duplicate { index: usize },
    CountMismatch { expected: usize, found: usize },
}

impl fmt::Display for IndexRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexRejection::Missing { position } => {
                write!(f, "entry at position {position} echoes no index")
            }
            IndexRejection::OutOfRange { position, index } => {
                write!(f, "entry at position {position} echoes out-of-range index {index}")
            }
            IndexRejection::Duplicate { index } => write!(f, "index {index} echoed more than once"),
            IndexRejection::CountMismatch { expected, found } => {
                write!(f, "expected {expected} entries, found {found}")
            }
        }
    }
}

/// How entries were matched to prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStrategy {
    Index,
    Content { rejected: IndexRejection },
}

/// For each prompt, in submission order, the position of its entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub strategy: MatchStrategy,
    pub positions: Vec<usize>,
}

/// Map entries to prompts without interpreting answers.
pub fn correlate(prompts: &[Prompt], entries: &[RawResultEntry]) -> Result<Correlation, ReconcileError> {
    match index_positions(prompts.len(), entries) {
        Ok(positions) => Ok(Correlation {
            strategy: MatchStrategy::Index,
            positions,
        }),
        Err(rejected) => Ok(Correlation {
            positions: content_positions(prompts, entries)?,
            strategy: MatchStrategy::Content { rejected },
        }),
    }
}

fn index_positions(prompt_count: usize, entries: &[RawResultEntry]) -> Result<Vec<usize>, IndexRejection> {
    let mut by_index: HashMap<usize, usize> = HashMap::with_capacity(entries.len());

    for (position, entry) in entries.iter().enumerate() {
        let index = entry
            .echoed_index()
            .ok_or(IndexRejection::Missing { position })?;
        let in_range = usize::try_from(index)
            .ok()
            .filter(|i| (1..=prompt_count).contains(i));
        let index = in_range.ok_or(IndexRejection::OutOfRange { position, index })?;
        if by_index.insert(index, position).is_some() {
            return Err(IndexRejection::Duplicate { index });
        }
    }

    if by_index.len() != prompt_count {
        return Err(IndexRejection::CountMismatch {
            expected: prompt_count,
            found: entries.len(),
        });
    }

    (1..=prompt_count)
        .map(|index| {
            by_index
                .get(&index)
                .copied()
                .ok_or(IndexRejection::CountMismatch {
                    expected: prompt_count,
                    found: by_index.len(),
                })
        })
        .collect()
}

fn content_positions(prompts: &[Prompt], entries: &[RawResultEntry]) -> Result<Vec<usize>, ReconcileError> {
    let mut prompt_by_text: HashMap<&str, usize> = HashMap::with_capacity(prompts.len());
    for prompt in prompts {
        if let Some(first) = prompt_by_text.insert(prompt.text(), prompt.index()) {
            return Err(ReconcileError::AmbiguousPrompt {
                first,
                second: prompt.index(),
            });
        }
    }

    // Several entries may echo one prompt (provider retries); they all answer
    // that same prompt, so prefer one without an error.
    let mut entry_by_text: HashMap<&str, usize> = HashMap::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let Some(text) = entry.echoed_prompt() else {
            continue;
        };
        if !prompt_by_text.contains_key(text) {
            return Err(ReconcileError::UnknownEntryText {
                position,
                preview: preview(text, TEXT_PREVIEW_LIMIT),
            });
        }
        let replace = match entry_by_text.get(text) {
            None => true,
            Some(&kept) => {
                entries[kept].error_message().is_some() && entry.error_message().is_none()
            }
        };
        if replace {
            entry_by_text.insert(text, position);
        }
    }

    prompts
        .iter()
        .map(|prompt| {
            entry_by_text
                .get(prompt.text())
                .copied()
                .ok_or_else(|| ReconcileError::UnmatchedPrompt {
                    index: prompt.index(),
                    preview: preview(prompt.text(), TEXT_PREVIEW_LIMIT),
                    entries: entries.len(),
                })
        })
        .collect()
}

/// Turns a job's raw entries into one response per prompt, in submission order.
pub struct ResultReconciler {
    adapter: Arc<dyn ProviderAdapter>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ResultReconciler {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { adapter, sink }
    }

    /// Per-item failures become failed responses; only an impossible
    /// attribution is an error.
    pub fn reconcile(
        &self,
        handle: &JobHandle,
        prompts: &[Prompt],
        entries: &[RawResultEntry],
    ) -> BatchResult<Vec<ReconciledResponse>> {
        let correlation = correlate(prompts, entries).map_err(|source| BatchError::Reconciliation {
            handle: handle.to_string(),
            source,
        })?;

        match &correlation.strategy {
            MatchStrategy::Index => debug!(handle = %handle, "Reconciled by index"),
            MatchStrategy::Content { rejected } => {
                self.sink.record(Diagnostic::ContentFallback {
                    provider: self.adapter.name().to_string(),
                    handle: handle.to_string(),
                    reason: rejected.to_string(),
                });
            }
        }

        let cost = self.adapter.cost_per_prompt();
        let responses: Vec<ReconciledResponse> = prompts
            .iter()
            .zip(&correlation.positions)
            .map(|(prompt, &position)| {
                let parsed = self.adapter.parse_entry(&entries[position]);
                if !parsed.succeeded {
                    warn!(
                        handle = %handle,
                        prompt_index = prompt.index(),
                        reason = parsed.failure_reason.as_deref().unwrap_or("unknown"),
                        "Answer failed for prompt"
                    );
                }
                ReconciledResponse::from_parsed(prompt.index(), parsed, cost)
            })
            .collect();

        let failed = responses.iter().filter(|r| !r.succeeded).count();
        debug!(handle = %handle, responses = responses.len(), failed, "Reconciliation complete");
        Ok(responses)
    }
}
