use indicatif::{ProgressBar, ProgressStyle};

use docrag_core::traits::ProgressSink;

/// Terminal progress bar for one document's index build.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(document_id: &str) -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_prefix(document_id.to_string());
        Self { bar }
    }
}

impl Drop for BarProgress {
    fn drop(&mut self) { self.bar.finish_and_clear(); }
}

impl ProgressSink for BarProgress {
    fn report(&self, percent: u8, status: &str) -> anyhow::Result<()> {
        self.bar.set_position(u64::from(percent.min(100)));
        self.bar.set_message(status.to_string());
        Ok(())
    }
}
