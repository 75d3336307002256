//! Prometheus metrics for cname-sentry
//!
//! Counters for sweep outcomes, per-tier findings and alert delivery.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::types::RiskTier;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Completed sweeps
    pub static ref SWEEPS_TOTAL: IntCounter = IntCounter::new(
        "cname_sentry_sweeps_total",
        "Total number of completed sweeps"
    ).expect("metric cannot be created");

    /// Sweeps refused because another was in flight
    pub static ref SWEEPS_REJECTED_TOTAL: IntCounter = IntCounter::new(
        "cname_sentry_sweeps_rejected_total",
        "Total number of sweep requests rejected while a sweep was running"
    ).expect("metric cannot be created");

    /// Scan results by tier
    /// Labels: tier="NONE|LOW|HIGH"
    pub static ref RESULTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "cname_sentry_results_total",
            "Total number of scan results by risk tier"
        ),
        &["tier"]
    ).expect("metric cannot be created");

    /// Alert notifications
    /// Labels: status="delivered|failed"
    pub static ref ALERTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "cname_sentry_alerts_total",
            "Total number of alert notifications attempted"
        ),
        &["status"]
    ).expect("metric cannot be created");

    /// Failed store writes
    pub static ref PERSISTENCE_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "cname_sentry_persistence_failures_total",
        "Total number of failed result store writes"
    ).expect("metric cannot be created");
}

/// Register all metrics with the global registry. Safe to call more than once.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SWEEPS_TOTAL.clone()),
        Box::new(SWEEPS_REJECTED_TOTAL.clone()),
        Box::new(RESULTS_TOTAL.clone()),
        Box::new(ALERTS_TOTAL.clone()),
        Box::new(PERSISTENCE_FAILURES_TOTAL.clone()),
    ];

    for c in collectors {
        if let Err(e) = REGISTRY.register(c) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                warn!("Failed to register metric: {}", e);
            }
        }
    }
}

pub fn record_result(tier: RiskTier) {
    RESULTS_TOTAL.with_label_values(&[tier.as_str()]).inc();
}

pub fn record_alert(delivered: bool) {
    let status = if delivered { "delivered" } else { "failed" };
    ALERTS_TOTAL.with_label_values(&[status]).inc();
}

/// Render the registry in Prometheus text exposition format
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
