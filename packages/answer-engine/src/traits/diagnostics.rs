//! Diagnostic sink for payloads worth keeping when something goes wrong.

/// Something an operator may need to inspect after a failed or degraded run.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Result body that could not be decoded, kept in full
    UndecodableResults {
        provider: String,
        handle: String,
        reason: String,
        body: String,
    },
    /// Index-based matching was rejected and prompt text was used instead
    ContentFallback {
        provider: String,
        handle: String,
        reason: String,
    },
}

/// Receives diagnostics. Implementations must not block.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic);
}
