// src/scheduler.rs
//! Periodic sweep scheduling
//!
//! Sweeps run once at startup, then on a fixed interval. Manual triggers are
//! queued behind the current sweep; several triggers arriving during one sweep
//! collapse into a single follow-up sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::orchestrator::{Orchestrator, SweepError};
use crate::targets::TargetSource;
use crate::types::SweepRun;

/// Result of a manual trigger request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStatus {
    /// A follow-up sweep was queued
    Queued,
    /// A follow-up sweep was already pending
    Coalesced,
    /// The scheduler has shut down
    Stopped,
}

/// Handle for requesting an out-of-schedule sweep
#[derive(Clone)]
pub struct SweepTrigger {
    tx: mpsc::Sender<()>,
}

impl SweepTrigger {
    pub fn request(&self) -> TriggerStatus {
        match self.tx.try_send(()) {
            Ok(()) => TriggerStatus::Queued,
            Err(mpsc::error::TrySendError::Full(())) => TriggerStatus::Coalesced,
            Err(mpsc::error::TrySendError::Closed(())) => TriggerStatus::Stopped,
        }
    }
}

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    targets: Arc<dyn TargetSource>,
    interval: Duration,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: mpsc::Receiver<()>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        targets: Arc<dyn TargetSource>,
        interval: Duration,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        Self {
            orchestrator,
            targets,
            interval,
            trigger_tx,
            trigger_rx,
        }
    }

    pub fn trigger(&self) -> SweepTrigger {
        SweepTrigger {
            tx: self.trigger_tx.clone(),
        }
    }

    /// Run until the shutdown signal fires. A sweep in progress is allowed to
    /// finish before returning.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            "Scheduler starting (interval: {}s)",
            self.interval.as_secs()
        );

        self.sweep_once("startup").await;

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once("interval").await;
                }

                Some(()) = self.trigger_rx.recv() => {
                    self.sweep_once("manual").await;
                }

                _ = shutdown_rx.changed() => {
                    info!("Scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Load the current target list and run one sweep
    async fn sweep_once(&self, reason: &str) -> Option<SweepRun> {
        let targets = match self.targets.load().await {
            Ok(targets) => targets,
            Err(e) => {
                error!("Skipping {} sweep, failed to load targets: {:#}", reason, e);
                return None;
            }
        };

        info!("Running {} sweep over {} targets", reason, targets.len());

        match self.orchestrator.run_sweep(&targets).await {
            Ok(run) => {
                if !run.diagnostics.is_clean() {
                    warn!(
                        run_id = %run.run_id,
                        notification_failures = run.diagnostics.notification_failures.len(),
                        persistence_failures = run.diagnostics.persistence_failures.len(),
                        "Sweep completed with failures"
                    );
                }
                info!("{}", self.orchestrator.stats().format_stats());
                Some(run)
            }
            Err(SweepError::ConcurrentSweepRejected) => {
                warn!("Skipping {} sweep, another sweep is still running", reason);
                None
            }
            Err(e) => {
                error!("{} sweep failed: {}", reason, e);
                None
            }
        }
    }
}
