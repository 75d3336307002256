// src/state.rs
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

use crate::dedupe::{AlertRecord, Dedupe};

/// Persists alert history to a TOML file so deduplication survives restarts
#[derive(Debug, Clone)]
pub struct AlertStateFile {
    path: PathBuf,
}

impl AlertStateFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load a [`Dedupe`] from the state file, or an empty one if it doesn't exist yet
    pub async fn load(&self) -> Result<Dedupe> {
        if !self.path.exists() {
            info!("Alert state file {:?} does not exist, starting fresh", self.path);
            return Ok(Dedupe::new());
        }

        info!("Loading alert state from {:?}", self.path);

        let contents = fs::read_to_string(&self.path)
            .await
            .context("Failed to read alert state file")?;

        let records: HashMap<String, AlertRecord> =
            toml::from_str(&contents).context("Failed to parse alert state file")?;

        info!("Loaded alert state for {} targets", records.len());
        Ok(Dedupe::from_records(records))
    }

    pub async fn save(&self, dedupe: &Dedupe) -> Result<()> {
        let records = dedupe.records().await;

        debug!("Saving alert state for {} targets to {:?}", records.len(), self.path);

        let toml_string =
            toml::to_string(&records).context("Failed to serialize alert state to TOML")?;

        // Write to temporary file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");

        fs::write(&temp_path, toml_string)
            .await
            .context("Failed to write alert state to temporary file")?;

        fs::rename(&temp_path, &self.path)
            .await
            .context("Failed to rename temporary alert state file")?;

        Ok(())
    }
}
