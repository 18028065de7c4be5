//! CLI-specific progress handling for warming-dl
//!
//! Provides the step counter shown while the download queue runs.

use indicatif::{ProgressBar, ProgressStyle};

/// Creates a progress bar counting queue steps
pub fn create_progress_bar(total_steps: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_steps);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .expect("Failed to create progress style")
            .progress_chars("#>-")
    );
    pb
}

/// Progress manager for a queue run
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_steps: u64, message: &str) -> Self {
        let pb = create_progress_bar(total_steps);
        pb.set_message(message.to_string());
        Self { pb }
    }

    /// Hidden manager, for machine-readable output
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    /// Count one finished step
    pub fn step(&self, message: &str) {
        self.pb.set_message(message.to_string());
        self.pb.inc(1);
    }

    /// Print a report line to stdout without tearing the bar
    pub fn println(&self, line: &str) {
        self.pb.suspend(|| println!("{line}"));
    }

    pub fn finish(&self, message: &str) {
        self.pb.finish_with_message(message.to_string());
    }
}
