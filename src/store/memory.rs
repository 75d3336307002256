// src/store/memory.rs
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::ResultStore;
use crate::types::{ScanResult, SweepRun};

/// Sweep runs kept by [`MemoryStore::new`]
pub const DEFAULT_MAX_RUNS: usize = 48;
/// Scan results kept by [`MemoryStore::new`]
pub const DEFAULT_MAX_RESULTS: usize = 10_000;

struct Inner {
    results: VecDeque<ScanResult>,
    runs: VecDeque<SweepRun>,
    max_results: usize,
    max_runs: usize,
}

/// Pushes `item`, dropping the oldest entries beyond `cap`
fn push_capped<T>(queue: &mut VecDeque<T>, item: T, cap: usize) {
    queue.push_back(item);
    while queue.len() > cap {
        queue.pop_front();
    }
}

/// In-process store used when no database is configured. Keeps only the most
/// recent runs and results.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_MAX_RUNS, DEFAULT_MAX_RESULTS)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_runs` sweep runs and `max_results` scan results (each at least 1)
    pub fn with_retention(max_runs: usize, max_results: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                results: VecDeque::new(),
                runs: VecDeque::new(),
                max_results: max_results.max(1),
                max_runs: max_runs.max(1),
            })),
        }
    }

    pub async fn results(&self) -> Vec<ScanResult> {
        self.inner.lock().await.results.iter().cloned().collect()
    }

    pub async fn runs(&self) -> Vec<SweepRun> {
        self.inner.lock().await.runs.iter().cloned().collect()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn append(&self, result: &ScanResult) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let cap = guard.max_results;
        push_capped(&mut guard.results, result.clone(), cap);
        Ok(())
    }

    async fn append_run(&self, run: &SweepRun) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let cap = guard.max_runs;
        push_capped(&mut guard.runs, run.clone(), cap);
        Ok(())
    }

    async fn latest_snapshot(&self) -> Result<Option<SweepRun>> {
        Ok(self.inner.lock().await.runs.back().cloned())
    }

    async fn history(&self, limit: usize) -> Result<Vec<ScanResult>> {
        let guard = self.inner.lock().await;
        Ok(guard.results.iter().rev().take(limit).cloned().collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SweepDiagnostics;
    use chrono::Utc;
    use uuid::Uuid;

    fn run_with(results: Vec<ScanResult>) -> SweepRun {
        let now = Utc::now();
        SweepRun {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            counts_by_tier: SweepRun::tally(&results),
            results,
            diagnostics: SweepDiagnostics::default(),
        }
    }

    #[tokio::test]
    async fn test_append_only_history() {
        let store = MemoryStore::new();
        store.append(&ScanResult::failed("a.example.com", "x".into())).await.unwrap();
        store.append(&ScanResult::failed("a.example.com", "y".into())).await.unwrap();

        assert_eq!(store.results().await.len(), 2);
        let history = store.history(1).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].error.as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn test_latest_snapshot_is_last_run() {
        let store = MemoryStore::new();
        assert!(store.latest_snapshot().await.unwrap().is_none());

        let first = run_with(vec![]);
        let second = run_with(vec![ScanResult::failed("b.example.com", "z".into())]);
        store.append_run(&first).await.unwrap();
        store.append_run(&second).await.unwrap();

        let latest = store.latest_snapshot().await.unwrap().unwrap();
        assert_eq!(latest.run_id, second.run_id);
        assert_eq!(store.runs().await.len(), 2);
    }

    #[tokio::test]
    async fn test_retention_evicts_oldest() {
        let store = MemoryStore::with_retention(2, 3);

        for name in ["a", "b", "c", "d"] {
            let target = format!("{}.example.com", name);
            store.append(&ScanResult::failed(&target, "x".into())).await.unwrap();
        }

        let runs: Vec<SweepRun> = (0..3).map(|_| run_with(vec![])).collect();
        for run in &runs {
            store.append_run(run).await.unwrap();
        }

        let targets: Vec<_> = store.results().await.into_iter().map(|r| r.target).collect();
        assert_eq!(targets, vec!["b.example.com", "c.example.com", "d.example.com"]);

        let kept: Vec<_> = store.runs().await.into_iter().map(|r| r.run_id).collect();
        assert_eq!(kept, vec![runs[1].run_id, runs[2].run_id]);

        // Newest entries are unaffected by eviction
        let latest = store.latest_snapshot().await.unwrap().unwrap();
        assert_eq!(latest.run_id, runs[2].run_id);
        let history = store.history(10).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].target, "d.example.com");
    }
}
