// src/progress.rs
//! Sweep progress bar using indicatif

use indicatif::{ProgressBar, ProgressStyle};

/// Progress indicator for interactive sweeps. Disabled instances are no-ops.
#[derive(Clone)]
pub struct ProgressIndicator {
    bar: Option<ProgressBar>,
}

impl ProgressIndicator {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self { bar: None };
        }

        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }

        Self { bar: Some(bar) }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Reset for a sweep over `total` targets
    pub fn start(&self, total: usize) {
        if let Some(ref bar) = self.bar {
            bar.reset();
            bar.set_length(total as u64);
            bar.set_message("scanning");
        }
    }

    pub fn advance(&self, target: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_message(target.to_string());
            bar.inc(1);
        }
    }

    pub fn finish(&self, msg: impl Into<String>) {
        if let Some(ref bar) = self.bar {
            bar.finish_with_message(msg.into());
        }
    }

    /// Temporarily hide the bar to print other output
    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if let Some(ref bar) = self.bar {
            bar.suspend(f)
        } else {
            f()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bar.is_some()
    }
}
