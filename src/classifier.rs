// src/classifier.rs
//! Provider-signature risk classification

use crate::types::RiskTier;

/// Cloud-provider domain fragments that indicate a claimable endpoint.
/// The first three are the storage, PaaS and app-host families the scanner
/// has always flagged; the rest are common static-site hosts.
pub const DEFAULT_SIGNATURES: &[&str] = &[
    "amazonaws",
    "azure",
    "heroku",
    "cloudfront.net",
    "github.io",
    "netlify.app",
    "vercel.app",
    "firebaseapp.com",
    "storage.googleapis.com",
];

pub fn default_signatures() -> Vec<String> {
    DEFAULT_SIGNATURES.iter().map(|s| s.to_string()).collect()
}

/// Maps a canonical name to a risk tier by case-insensitive substring match
/// against an ordered signature list.
#[derive(Debug, Clone)]
pub struct Classifier {
    signatures: Vec<String>,
}

impl Classifier {
    pub fn new<I, S>(signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let signatures = signatures
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Self { signatures }
    }

    pub fn classify(&self, canonical_name: Option<&str>) -> RiskTier {
        match canonical_name {
            None => RiskTier::None,
            Some(name) if name.trim().is_empty() => RiskTier::None,
            Some(name) => {
                if self.matched_signature(name).is_some() {
                    RiskTier::High
                } else {
                    RiskTier::Low
                }
            }
        }
    }

    /// First signature contained in `canonical_name`, if any
    pub fn matched_signature(&self, canonical_name: &str) -> Option<&str> {
        let lower = canonical_name.to_lowercase();
        self.signatures
            .iter()
            .find(|sig| lower.contains(sig.as_str()))
            .map(|s| s.as_str())
    }

    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURES)
    }
}
