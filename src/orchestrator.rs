// src/orchestrator.rs
//! Single-flight sweep engine
//!
//! A sweep runs every target through resolve -> classify -> dedupe/notify ->
//! persist on a bounded pool of tasks, then records a run summary. Only one
//! sweep may be in flight at a time; a second request is rejected rather than
//! queued (queuing is the scheduler's job).

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::classifier::Classifier;
use crate::dedupe::Dedupe;
use crate::metrics;
use crate::notifier::{Notifier, NotifyOutcome, alert_message};
use crate::output::OutputManager;
use crate::progress::ProgressIndicator;
use crate::resolver::CnameResolver;
use crate::state::AlertStateFile;
use crate::stats::StatsCollector;
use crate::store::ResultStore;
use crate::types::{RiskTier, ScanResult, SweepDiagnostics, SweepRun};

/// Conditions that stop `run_sweep` before any target is processed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SweepError {
    #[error("sweep already in progress")]
    ConcurrentSweepRejected,
    #[error("result store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Clears the in-flight flag when dropped, including on panic or cancellation
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// What happened to one target
struct TargetReport {
    result: ScanResult,
    alert: Option<NotifyOutcome>,
    persist_error: Option<String>,
}

/// Per-target pipeline; cheap to clone into worker tasks
#[derive(Clone)]
struct Pipeline {
    resolver: Arc<dyn CnameResolver>,
    classifier: Arc<Classifier>,
    dedupe: Dedupe,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn ResultStore>,
    stats: StatsCollector,
}

impl Pipeline {
    async fn process(self, target: String) -> TargetReport {
        let outcome = self.resolver.resolve(&target).await;
        let tier = self.classifier.classify(outcome.canonical_name.as_deref());
        let result = ScanResult::from_outcome(outcome, tier);

        debug!(
            target = %result.target,
            cname = result.canonical_name.as_deref().unwrap_or("-"),
            tier = %tier,
            method = %result.method,
            "checked target"
        );

        let alert = match tier {
            RiskTier::High => {
                self.stats.increment_high_risk();
                self.dispatch_alert(&result).await
            }
            RiskTier::Low => {
                // Canonical name moved off every provider; a later HIGH is a new finding
                self.dedupe.forget(&result.target).await;
                None
            }
            RiskTier::None => None,
        };

        self.finish(result, alert).await
    }

    async fn dispatch_alert(&self, result: &ScanResult) -> Option<NotifyOutcome> {
        let cname = result.canonical_name.as_deref();
        if !self.dedupe.should_alert(&result.target, cname, result.tier).await {
            debug!(target = %result.target, "alert suppressed, finding unchanged");
            return None;
        }

        let signature = cname.and_then(|c| self.classifier.matched_signature(c));
        let message = alert_message(result, signature);

        if !self.notifier.is_enabled() {
            info!(target = %result.target, "{}", message);
            return None;
        }

        let outcome = self.notifier.notify(&message).await;
        metrics::record_alert(outcome.is_delivered());

        match &outcome {
            NotifyOutcome::Delivered => {
                self.stats.increment_alerts();
                info!(target = %result.target, "alert dispatched");
            }
            NotifyOutcome::Failed(reason) => {
                warn!(target = %result.target, "alert delivery failed: {}", reason);
                // Undelivered alerts are retried on the next sweep
                self.dedupe.forget(&result.target).await;
            }
        }

        Some(outcome)
    }

    async fn finish(&self, result: ScanResult, alert: Option<NotifyOutcome>) -> TargetReport {
        self.stats.increment_scanned();
        metrics::record_result(result.tier);

        let persist_error = match self.store.append(&result).await {
            Ok(()) => None,
            Err(e) => {
                metrics::PERSISTENCE_FAILURES_TOTAL.inc();
                warn!(target = %result.target, "failed to persist scan result: {:#}", e);
                Some(format!("{}: {:#}", result.target, e))
            }
        };

        TargetReport {
            result,
            alert,
            persist_error,
        }
    }
}

pub struct Orchestrator {
    resolver: Arc<dyn CnameResolver>,
    classifier: Arc<Classifier>,
    dedupe: Dedupe,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn ResultStore>,
    outputs: OutputManager,
    alert_state: Option<AlertStateFile>,
    stats: StatsCollector,
    progress: ProgressIndicator,
    max_concurrency: usize,
    in_flight: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        resolver: Arc<dyn CnameResolver>,
        classifier: Classifier,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            resolver,
            classifier: Arc::new(classifier),
            dedupe: Dedupe::new(),
            notifier,
            store,
            outputs: OutputManager::new(),
            alert_state: None,
            stats: StatsCollector::new(),
            progress: ProgressIndicator::disabled(),
            max_concurrency: 8,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Use existing alert history (e.g. loaded from disk)
    pub fn with_dedupe(mut self, dedupe: Dedupe) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Save alert history to this file after every sweep
    pub fn with_alert_state(mut self, state: AlertStateFile) -> Self {
        self.alert_state = Some(state);
        self
    }

    pub fn with_outputs(mut self, outputs: OutputManager) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_stats(mut self, stats: StatsCollector) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_progress(mut self, progress: ProgressIndicator) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn dedupe(&self) -> &Dedupe {
        &self.dedupe
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    pub async fn latest_snapshot(&self) -> anyhow::Result<Option<SweepRun>> {
        self.store.latest_snapshot().await
    }

    /// Flush buffered report output; called once on shutdown
    pub async fn flush_outputs(&self) -> anyhow::Result<()> {
        self.outputs.flush().await
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline {
            resolver: Arc::clone(&self.resolver),
            classifier: Arc::clone(&self.classifier),
            dedupe: self.dedupe.clone(),
            notifier: Arc::clone(&self.notifier),
            store: Arc::clone(&self.store),
            stats: self.stats.clone(),
        }
    }

    /// Run one sweep over `targets`. Per-target failures are folded into the
    /// returned run; only a concurrent sweep or an unreachable store fail the call.
    pub async fn run_sweep(&self, targets: &[String]) -> Result<SweepRun, SweepError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            self.stats.increment_rejected();
            metrics::SWEEPS_REJECTED_TOTAL.inc();
            warn!("Sweep requested while another is in flight, rejecting");
            return Err(SweepError::ConcurrentSweepRejected);
        };

        if let Err(e) = self.store.ping().await {
            error!("Result store unavailable: {:#}", e);
            return Err(SweepError::StoreUnavailable(format!("{:#}", e)));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let targets = unique_targets(targets);

        info!(%run_id, targets = targets.len(), "Sweep started");
        self.progress.start(targets.len());

        let pipeline = self.pipeline();
        let progress = self.progress.clone();

        let reports: Vec<TargetReport> = stream::iter(targets)
            .map(|target| {
                let pipeline = pipeline.clone();
                let progress = progress.clone();
                async move {
                    let task = tokio::spawn(pipeline.clone().process(target.clone()));
                    let report = match task.await {
                        Ok(report) => report,
                        Err(e) => {
                            error!(target = %target, "scan task failed: {}", e);
                            let result = ScanResult::failed(&target, format!("scan task failed: {}", e));
                            pipeline.finish(result, None).await
                        }
                    };
                    progress.advance(&target);
                    report
                }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut diagnostics = SweepDiagnostics::default();
        let mut results = Vec::with_capacity(reports.len());

        for report in reports {
            match report.alert {
                Some(NotifyOutcome::Delivered) => diagnostics.alerts_dispatched += 1,
                Some(NotifyOutcome::Failed(reason)) => diagnostics
                    .notification_failures
                    .push(format!("{}: {}", report.result.target, reason)),
                None => {}
            }
            if let Some(e) = report.persist_error {
                diagnostics.persistence_failures.push(e);
            }
            results.push(report.result);
        }

        let mut run = SweepRun {
            run_id,
            started_at,
            finished_at: Utc::now(),
            counts_by_tier: SweepRun::tally(&results),
            results,
            diagnostics,
        };

        if let Err(e) = self.store.append_run(&run).await {
            metrics::PERSISTENCE_FAILURES_TOTAL.inc();
            warn!(%run_id, "failed to persist sweep run: {:#}", e);
            run.diagnostics
                .persistence_failures
                .push(format!("sweep run: {:#}", e));
        }

        for e in self.outputs.emit(&run).await {
            run.diagnostics.persistence_failures.push(format!("output: {}", e));
        }

        if let Some(ref state) = self.alert_state {
            if let Err(e) = state.save(&self.dedupe).await {
                warn!("failed to save alert state: {:#}", e);
                run.diagnostics
                    .persistence_failures
                    .push(format!("alert state: {:#}", e));
            }
        }

        self.progress.finish(format!("{} targets scanned", run.results.len()));
        self.stats.increment_sweeps();
        metrics::SWEEPS_TOTAL.inc();

        info!(
            %run_id,
            high = run.count(RiskTier::High),
            low = run.count(RiskTier::Low),
            none = run.count(RiskTier::None),
            alerts = run.diagnostics.alerts_dispatched,
            clean = run.diagnostics.is_clean(),
            "Sweep finished"
        );

        Ok(run)
    }
}

/// Drop blanks and case-insensitive duplicates, keeping first-seen order
fn unique_targets(targets: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    targets
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(|t| t.to_string())
        .collect()
}
