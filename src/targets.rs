// src/targets.rs
//! Target list loading

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// Written when no target file exists so operators have something to edit
pub const EXAMPLE_TARGETS: &str = "# One domain per line\n\
va01.example.herokuapp.com\n\
example.azure.com\n\
example.com\n";

/// Parse one-name-per-line text, skipping blanks and `#` comments
pub fn parse_targets(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.to_string())
        .collect()
}

pub async fn read_targets(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read target list {:?}", path))?;
    Ok(parse_targets(&content))
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Supplies the authoritative target list at the start of each sweep
#[async_trait]
pub trait TargetSource: Send + Sync {
    async fn load(&self) -> Result<Vec<String>>;
}

/// Fixed in-memory list (ad-hoc scans, inline config)
#[derive(Debug, Clone)]
pub struct StaticTargets(pub Vec<String>);

#[async_trait]
impl TargetSource for StaticTargets {
    async fn load(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// File-backed list, re-read every sweep so edits take effect without a restart
#[derive(Debug, Clone)]
pub struct TargetFile {
    primary: PathBuf,
    fallback: Option<PathBuf>,
    create_example: bool,
}

impl TargetFile {
    pub fn new(primary: PathBuf) -> Self {
        Self {
            primary,
            fallback: None,
            create_example: false,
        }
    }

    /// Legacy name checked when the primary file is missing
    pub fn with_fallback(mut self, fallback: PathBuf) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Write [`EXAMPLE_TARGETS`] to the primary path if no file exists
    pub fn create_example_if_missing(mut self, create: bool) -> Self {
        self.create_example = create;
        self
    }

    async fn resolve_path(&self) -> Result<PathBuf> {
        if exists(&self.primary).await {
            return Ok(self.primary.clone());
        }
        if let Some(ref fallback) = self.fallback {
            if exists(fallback).await {
                return Ok(fallback.clone());
            }
        }
        if self.create_example {
            warn!(
                "Target file {:?} not found, creating example file",
                self.primary
            );
            fs::write(&self.primary, EXAMPLE_TARGETS)
                .await
                .with_context(|| format!("Failed to create example target file {:?}", self.primary))?;
            return Ok(self.primary.clone());
        }
        anyhow::bail!("Target file {:?} not found", self.primary)
    }
}

#[async_trait]
impl TargetSource for TargetFile {
    async fn load(&self) -> Result<Vec<String>> {
        read_targets(&self.resolve_path().await?).await
    }
}
