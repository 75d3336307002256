// src/dedupe.rs
use crate::types::RiskTier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The finding that last triggered an alert for a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_name: Option<String>,
    pub tier: RiskTier,
}

/// Alert history keyed by lowercase target name.
/// Clones share state, so one instance can be handed to every sweep worker.
#[derive(Clone, Default)]
pub struct Dedupe {
    inner: Arc<Mutex<HashMap<String, AlertRecord>>>,
}

impl Dedupe {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start from previously persisted alert history
    pub fn from_records(records: HashMap<String, AlertRecord>) -> Self {
        let normalized = records
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        Self {
            inner: Arc::new(Mutex::new(normalized)),
        }
    }

    /// Returns true if this HIGH finding differs from the last alerted one
    /// (and records it). Check and record happen under one lock, so two workers
    /// evaluating the same target cannot both fire.
    pub async fn should_alert(
        &self,
        target: &str,
        canonical_name: Option<&str>,
        tier: RiskTier,
    ) -> bool {
        if tier != RiskTier::High {
            return false;
        }

        let key = target.to_lowercase();
        let record = AlertRecord {
            canonical_name: canonical_name.map(|c| c.to_string()),
            tier,
        };

        let mut guard = self.inner.lock().await;
        if guard.get(&key) == Some(&record) {
            false
        } else {
            guard.insert(key, record);
            true
        }
    }

    /// Drop the alert history for a target so its next HIGH finding alerts again
    pub async fn forget(&self, target: &str) -> bool {
        let mut guard = self.inner.lock().await;
        guard.remove(&target.to_lowercase()).is_some()
    }

    pub async fn last_alert(&self, target: &str) -> Option<AlertRecord> {
        let guard = self.inner.lock().await;
        guard.get(&target.to_lowercase()).cloned()
    }

    /// Copy of the full alert history, for persistence
    pub async fn records(&self) -> HashMap<String, AlertRecord> {
        self.inner.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
