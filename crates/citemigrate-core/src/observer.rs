//! User-facing progress reporting

/// Receives the human-readable conversion log and document progress
pub trait ConversionObserver {
    fn log(&self, message: &str);

    /// Called before document `current` (1-based) of `total` starts
    fn progress(&self, current: usize, total: usize) {
        let _ = (current, total);
    }
}

/// Forwards log lines to `tracing` at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ConversionObserver for TracingObserver {
    fn log(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn progress(&self, current: usize, total: usize) {
        tracing::info!(current, total, "Document progress");
    }
}

impl<F> ConversionObserver for F
where
    F: Fn(&str),
{
    fn log(&self, message: &str) {
        self(message)
    }
}
