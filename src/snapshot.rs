// src/snapshot.rs
//! Latest-sweep export consumed by the dashboard

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use crate::output::OutputHandler;
use crate::types::{Snapshot, SweepRun};

pub struct SnapshotExporter {
    path: PathBuf,
}

impl SnapshotExporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn render(run: &SweepRun) -> Result<String> {
        serde_json::to_string_pretty(&run.to_snapshot()).context("Failed to serialize snapshot")
    }

    /// Replace the snapshot file with `run`
    pub async fn write(&self, run: &SweepRun) -> Result<()> {
        let json = Self::render(run)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json)
            .await
            .context("Failed to write snapshot to temporary file")?;
        fs::rename(&temp_path, &self.path)
            .await
            .context("Failed to rename temporary snapshot file")?;

        debug!("Wrote {} scan results to {:?}", run.results.len(), self.path);
        Ok(())
    }

    pub async fn read(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .await
            .context("Failed to read snapshot file")?;
        let snapshot = serde_json::from_str(&contents).context("Failed to parse snapshot file")?;
        Ok(Some(snapshot))
    }
}

#[async_trait]
impl OutputHandler for SnapshotExporter {
    async fn emit_run(&self, run: &SweepRun) -> Result<()> {
        self.write(run).await
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
