// src/stats.rs
//! Statistics tracking for cname-sentry

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Thread-safe statistics collector
#[derive(Clone)]
pub struct StatsCollector {
    sweeps_completed: Arc<AtomicU64>,
    sweeps_rejected: Arc<AtomicU64>,
    targets_scanned: Arc<AtomicU64>,
    high_risk_found: Arc<AtomicU64>,
    alerts_sent: Arc<AtomicU64>,
    start_time: Instant,
}

/// Snapshot of statistics at a point in time
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub sweeps_completed: u64,
    pub sweeps_rejected: u64,
    pub targets_scanned: u64,
    pub high_risk_found: u64,
    pub alerts_sent: u64,
    pub uptime_secs: u64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            sweeps_completed: Arc::new(AtomicU64::new(0)),
            sweeps_rejected: Arc::new(AtomicU64::new(0)),
            targets_scanned: Arc::new(AtomicU64::new(0)),
            high_risk_found: Arc::new(AtomicU64::new(0)),
            alerts_sent: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn increment_sweeps(&self) {
        self.sweeps_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.sweeps_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scanned(&self) {
        self.targets_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_high_risk(&self) {
        self.high_risk_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_alerts(&self) {
        self.alerts_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sweeps_completed: self.sweeps_completed.load(Ordering::Relaxed),
            sweeps_rejected: self.sweeps_rejected.load(Ordering::Relaxed),
            targets_scanned: self.targets_scanned.load(Ordering::Relaxed),
            high_risk_found: self.high_risk_found.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Format statistics as a human-readable string
    pub fn format_stats(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            "{} sweeps | {} targets scanned | {} high risk | {} alerts | uptime: {}",
            snapshot.sweeps_completed,
            snapshot.targets_scanned,
            snapshot.high_risk_found,
            snapshot.alerts_sent,
            Self::format_uptime(snapshot.uptime_secs)
        )
    }

    pub fn format_uptime(secs: u64) -> String {
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
