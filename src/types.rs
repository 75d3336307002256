// src/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Risk tier assigned to a scanned target. Ordered `None < Low < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    /// No canonical redirection was found
    None,
    /// Canonical name found, but no known provider signature matched
    Low,
    /// Canonical name matches a known provider signature
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 3] = [RiskTier::None, RiskTier::Low, RiskTier::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::None => "NONE",
            RiskTier::Low => "LOW",
            RiskTier::High => "HIGH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Some(RiskTier::None),
            "LOW" => Some(RiskTier::Low),
            "HIGH" => Some(RiskTier::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the canonical name was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionMethod {
    DirectCname,
    ARecordChase,
    None,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::DirectCname => "DIRECT_CNAME",
            ResolutionMethod::ARecordChase => "A_RECORD_CHASE",
            ResolutionMethod::None => "NONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DIRECT_CNAME" => Some(ResolutionMethod::DirectCname),
            "A_RECORD_CHASE" => Some(ResolutionMethod::ARecordChase),
            "NONE" => Some(ResolutionMethod::None),
            _ => None,
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of resolving one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub target: String,
    pub canonical_name: Option<String>,
    pub method: ResolutionMethod,
    pub error: Option<String>,
}

impl ResolutionOutcome {
    pub fn found(target: &str, canonical: String, method: ResolutionMethod) -> Self {
        Self {
            target: target.to_string(),
            canonical_name: Some(canonical),
            method,
            error: None,
        }
    }

    pub fn unresolved(target: &str, error: Option<String>) -> Self {
        Self {
            target: target.to_string(),
            canonical_name: None,
            method: ResolutionMethod::None,
            error,
        }
    }
}

/// One classified target from one sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub target: String,
    pub canonical_name: Option<String>,
    pub tier: RiskTier,
    pub checked_at: DateTime<Utc>,
    pub method: ResolutionMethod,
    /// Lookup or pipeline failure captured for this target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    pub fn from_outcome(outcome: ResolutionOutcome, tier: RiskTier) -> Self {
        Self {
            target: outcome.target,
            canonical_name: outcome.canonical_name,
            tier,
            checked_at: Utc::now(),
            method: outcome.method,
            error: outcome.error,
        }
    }

    /// Result recorded when the per-target pipeline itself failed
    pub fn failed(target: &str, error: String) -> Self {
        Self::from_outcome(ResolutionOutcome::unresolved(target, Some(error)), RiskTier::None)
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tier {
            RiskTier::High => write!(
                f,
                "[+] Potential takeover: {} -> {}",
                self.target,
                self.canonical_name.as_deref().unwrap_or("-")
            ),
            RiskTier::Low => write!(f, "[-] {} -> No issues found", self.target),
            RiskTier::None => write!(f, "[?] {} -> Unknown", self.target),
        }
    }
}

/// Non-fatal problems observed during a sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepDiagnostics {
    pub alerts_dispatched: u64,
    pub notification_failures: Vec<String>,
    pub persistence_failures: Vec<String>,
}

impl SweepDiagnostics {
    /// True when every notification was delivered and every write landed
    pub fn is_clean(&self) -> bool {
        self.notification_failures.is_empty() && self.persistence_failures.is_empty()
    }
}

/// One complete pass over the target list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ScanResult>,
    pub counts_by_tier: BTreeMap<RiskTier, usize>,
    #[serde(default)]
    pub diagnostics: SweepDiagnostics,
}

impl SweepRun {
    pub fn count(&self, tier: RiskTier) -> usize {
        self.counts_by_tier.get(&tier).copied().unwrap_or(0)
    }

    pub fn tally(results: &[ScanResult]) -> BTreeMap<RiskTier, usize> {
        let mut counts: BTreeMap<RiskTier, usize> =
            RiskTier::ALL.iter().map(|t| (*t, 0)).collect();
        for r in results {
            *counts.entry(r.tier).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            last_run: self.finished_at,
            results: self.results.iter().map(SnapshotEntry::from).collect(),
        }
    }
}

/// Dashboard-facing export of the latest sweep. Field names are a stable contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub last_run: DateTime<Utc>,
    pub results: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub domain: String,
    pub canonical_name: Option<String>,
    pub tier: RiskTier,
    pub checked_at: DateTime<Utc>,
}

impl From<&ScanResult> for SnapshotEntry {
    fn from(r: &ScanResult) -> Self {
        Self {
            domain: r.target.clone(),
            canonical_name: r.canonical_name.clone(),
            tier: r.tier,
            checked_at: r.checked_at,
        }
    }
}
