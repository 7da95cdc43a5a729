//! Built-in progress sinks.

use crate::traits::ProgressSink;

/// Discards every milestone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _status: &str) -> anyhow::Result<()> { Ok(()) }
}

/// Forwards milestones to `tracing` at info level.
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self { Self { label: label.into() } }
}

impl ProgressSink for LogProgress {
    fn report(&self, percent: u8, status: &str) -> anyhow::Result<()> {
        tracing::info!(target: "docrag::progress", label = %self.label, percent, "{status}");
        Ok(())
    }
}
