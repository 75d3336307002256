// src/output/json.rs
//! JSON Lines (JSONL) output handler

use crate::output::{OutputHandler, SharedWriter, lock_writer};
use crate::types::SweepRun;
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::Mutex;

/// Outputs one JSON object per scan result (JSONL/NDJSON format)
pub struct JsonOutput {
    writer: SharedWriter,
}

impl JsonOutput {
    pub fn new() -> Self {
        Self::to_writer(Box::new(io::stdout()))
    }

    pub fn to_file(file: std::fs::File) -> Self {
        Self::to_writer(Box::new(file))
    }

    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputHandler for JsonOutput {
    async fn emit_run(&self, run: &SweepRun) -> anyhow::Result<()> {
        let mut writer = lock_writer(&self.writer)?;

        for result in &run.results {
            let json = serde_json::to_string(result)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;

        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        lock_writer(&self.writer)?.flush()?;
        Ok(())
    }
}
