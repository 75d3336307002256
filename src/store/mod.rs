// src/store/mod.rs
use anyhow::Result;
use async_trait::async_trait;

use crate::types::{ScanResult, SweepRun};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Append-only record of scan outcomes
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Record one target's result. Never overwrites an earlier row.
    async fn append(&self, result: &ScanResult) -> Result<()>;

    /// Record a completed sweep summary
    async fn append_run(&self, run: &SweepRun) -> Result<()>;

    /// Most recently completed sweep, if any
    async fn latest_snapshot(&self) -> Result<Option<SweepRun>>;

    /// Recent results across sweeps, newest first
    async fn history(&self, limit: usize) -> Result<Vec<ScanResult>>;

    /// Health check
    async fn ping(&self) -> Result<()>;
}
