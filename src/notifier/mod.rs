// src/notifier/mod.rs
//! Outbound alert delivery
//!
//! The scan engine only sees the [`Notifier`] trait. Transports report their
//! result as a [`NotifyOutcome`] instead of an error so a failed delivery can
//! never abort a sweep or roll back persistence.

use async_trait::async_trait;
use std::sync::Arc;

use crate::types::ScanResult;

pub mod telegram;
pub mod webhook;

pub use telegram::TelegramNotifier;
pub use webhook::WebhookNotifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    Failed(String),
}

impl NotifyOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, NotifyOutcome::Delivered)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// False when there is nowhere to deliver to; callers skip dispatch entirely
    fn is_enabled(&self) -> bool {
        true
    }

    async fn notify(&self, message: &str) -> NotifyOutcome;
}

/// Alert text for a HIGH finding
pub fn alert_message(result: &ScanResult, signature: Option<&str>) -> String {
    let cname = result.canonical_name.as_deref().unwrap_or("-");
    match signature {
        Some(sig) => format!(
            "🚨 High risk domain found: {} (CNAME: {}, provider: {})",
            result.target, cname, sig
        ),
        None => format!("🚨 High risk domain found: {} (CNAME: {})", result.target, cname),
    }
}

/// Dispatches to every configured transport
#[derive(Default)]
pub struct NotifierSet {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self {
            notifiers: Vec::new(),
        }
    }

    pub fn add(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    fn name(&self) -> &str {
        "all"
    }

    fn is_enabled(&self) -> bool {
        !self.notifiers.is_empty()
    }

    /// Delivered if at least one transport delivered. Failures from the others
    /// are logged but don't change the outcome.
    async fn notify(&self, message: &str) -> NotifyOutcome {
        if self.notifiers.is_empty() {
            return NotifyOutcome::Failed("no notifier configured".to_string());
        }

        let mut failures = Vec::new();
        let mut delivered = false;

        for notifier in &self.notifiers {
            match notifier.notify(message).await {
                NotifyOutcome::Delivered => delivered = true,
                NotifyOutcome::Failed(reason) => {
                    tracing::warn!("{} notification failed: {}", notifier.name(), reason);
                    failures.push(format!("{}: {}", notifier.name(), reason));
                }
            }
        }

        if delivered {
            NotifyOutcome::Delivered
        } else {
            NotifyOutcome::Failed(failures.join("; "))
        }
    }
}
