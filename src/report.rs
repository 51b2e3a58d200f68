//! Out-of-band error reporting.

/// Receives errors that were handled locally but should be surfaced.
///
/// Reporting is fire-and-forget: implementations must not fail or block the
/// caller for long.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &anyhow::Error);
}

/// Reports errors as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &anyhow::Error) {
        tracing::error!(error = %format!("{error:#}"), "Reported error");
    }
}
