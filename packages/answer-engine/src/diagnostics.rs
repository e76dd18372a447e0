//! Default diagnostic sink that writes through `tracing`.

use tracing::warn;

use crate::error::truncate_body;
use crate::traits::diagnostics::{Diagnostic, DiagnosticSink};

/// Logs diagnostics at warn level, with bodies cut to a preview.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::UndecodableResults {
                provider,
                handle,
                reason,
                body,
            } => warn!(
                provider = %provider,
                handle = %handle,
                reason = %reason,
                body_len = body.len(),
                body = %truncate_body(&body),
                "Undecodable result payload"
            ),
            Diagnostic::ContentFallback {
                provider,
                handle,
                reason,
            } => warn!(
                provider = %provider,
                handle = %handle,
                reason = %reason,
                "Index matching rejected, reconciled by prompt text"
            ),
        }
    }
}
