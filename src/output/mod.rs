// src/output/mod.rs
//! Sweep report handling
//!
//! Every finished sweep is handed to an [`OutputManager`], which fans it out
//! to any number of handlers (terminal report, JSON lines, CSV, snapshot file).

use crate::types::SweepRun;
use async_trait::async_trait;
use std::io::Write;
use std::sync::{Arc, Mutex};

pub mod csv;
pub mod human;
pub mod json;

/// Trait for handlers that receive completed sweeps
#[async_trait]
pub trait OutputHandler: Send + Sync {
    /// Emit a completed sweep
    async fn emit_run(&self, run: &SweepRun) -> anyhow::Result<()>;

    /// Flush any buffered output
    async fn flush(&self) -> anyhow::Result<()>;
}

/// Manager that dispatches output to multiple handlers
pub struct OutputManager {
    handlers: Vec<Arc<dyn OutputHandler>>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn OutputHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Emit a sweep to all handlers. Returns the error messages of handlers
    /// that failed; one failing handler never stops the others.
    pub async fn emit(&self, run: &SweepRun) -> Vec<String> {
        let mut errors = Vec::new();

        for handler in &self.handlers {
            if let Err(e) = handler.emit_run(run).await {
                tracing::warn!("Output handler error: {:#}", e);
                errors.push(format!("{:#}", e));
            }
        }

        errors
    }

    pub async fn flush(&self) -> anyhow::Result<()> {
        for handler in &self.handlers {
            handler.flush().await?;
        }
        Ok(())
    }
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer shared behind a lock, used by the stream handlers
pub(crate) type SharedWriter = Mutex<Box<dyn Write + Send>>;

pub(crate) fn lock_writer(
    writer: &SharedWriter,
) -> anyhow::Result<std::sync::MutexGuard<'_, Box<dyn Write + Send>>> {
    writer
        .lock()
        .map_err(|_| anyhow::anyhow!("output writer lock poisoned"))
}
