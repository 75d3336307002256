// src/store/postgres.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use tracing::{debug, info};
use uuid::Uuid;

use super::ResultStore;
use crate::types::{ResolutionMethod, RiskTier, ScanResult, SweepDiagnostics, SweepRun};

/// PostgreSQL result store
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to PostgreSQL database");

        // sqlx 0.8.x doesn't recognize 'channel_binding' parameter from hosted Postgres URLs
        let cleaned_url = Self::clean_connection_string(database_url);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(&cleaned_url)
            .await
            .context("Failed to connect to PostgreSQL database")?;

        info!("Connected to PostgreSQL successfully");

        Ok(Self { pool })
    }

    fn clean_connection_string(url_str: &str) -> String {
        use url::Url;

        let Ok(mut url) = Url::parse(url_str) else {
            return url_str.to_string();
        };

        let unsupported_params = ["channel_binding"];
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !unsupported_params.contains(&key.as_ref()))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }

        url.to_string()
    }

    /// Create tables if they don't exist
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scan_results (
                id BIGSERIAL PRIMARY KEY,
                target TEXT NOT NULL,
                canonical_name TEXT,
                tier TEXT NOT NULL,
                method TEXT NOT NULL,
                error TEXT,
                checked_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create scan_results table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sweep_runs (
                run_id UUID PRIMARY KEY,
                started_at TIMESTAMPTZ NOT NULL,
                finished_at TIMESTAMPTZ NOT NULL,
                counts_by_tier TEXT NOT NULL,
                diagnostics TEXT NOT NULL,
                results TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create sweep_runs table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_scan_results_target
            ON scan_results(target)
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create index on target")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_sweep_runs_finished_at
            ON sweep_runs(finished_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create index on finished_at")?;

        info!("Database migrations completed successfully");

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_result(row: &PgRow) -> Result<ScanResult> {
        let tier: String = row.get("tier");
        let method: String = row.get("method");

        Ok(ScanResult {
            target: row.get("target"),
            canonical_name: row.get("canonical_name"),
            tier: RiskTier::parse(&tier)
                .with_context(|| format!("Unknown tier '{}' in scan_results", tier))?,
            checked_at: row.get::<DateTime<Utc>, _>("checked_at"),
            method: ResolutionMethod::parse(&method)
                .with_context(|| format!("Unknown method '{}' in scan_results", method))?,
            error: row.get("error"),
        })
    }
}

#[async_trait]
impl ResultStore for PostgresStore {
    async fn append(&self, result: &ScanResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scan_results (target, canonical_name, tier, method, error, checked_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&result.target)
        .bind(&result.canonical_name)
        .bind(result.tier.as_str())
        .bind(result.method.as_str())
        .bind(&result.error)
        .bind(result.checked_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert scan result")?;

        debug!("Saved scan result for {}", result.target);

        Ok(())
    }

    async fn append_run(&self, run: &SweepRun) -> Result<()> {
        let counts = serde_json::to_string(&run.counts_by_tier)?;
        let diagnostics = serde_json::to_string(&run.diagnostics)?;
        let results = serde_json::to_string(&run.results)?;

        sqlx::query(
            r#"
            INSERT INTO sweep_runs (run_id, started_at, finished_at, counts_by_tier, diagnostics, results)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(run.run_id)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(counts)
        .bind(diagnostics)
        .bind(results)
        .execute(&self.pool)
        .await
        .context("Failed to insert sweep run")?;

        Ok(())
    }

    async fn latest_snapshot(&self) -> Result<Option<SweepRun>> {
        let row = sqlx::query(
            r#"
            SELECT run_id, started_at, finished_at, counts_by_tier, diagnostics, results
            FROM sweep_runs
            ORDER BY finished_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch latest sweep run")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let counts: String = row.get("counts_by_tier");
        let diagnostics: String = row.get("diagnostics");
        let results: String = row.get("results");

        Ok(Some(SweepRun {
            run_id: row.get::<Uuid, _>("run_id"),
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
            counts_by_tier: serde_json::from_str(&counts).context("Corrupt counts_by_tier")?,
            diagnostics: serde_json::from_str::<SweepDiagnostics>(&diagnostics)
                .context("Corrupt diagnostics")?,
            results: serde_json::from_str(&results).context("Corrupt results")?,
        }))
    }

    async fn history(&self, limit: usize) -> Result<Vec<ScanResult>> {
        let rows = sqlx::query(
            r#"
            SELECT target, canonical_name, tier, method, error, checked_at
            FROM scan_results
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch scan history")?;

        let results = rows
            .iter()
            .map(Self::row_to_result)
            .collect::<Result<Vec<_>>>()?;

        debug!("Fetched {} scan results from database", results.len());

        Ok(results)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_connection_string_drops_channel_binding() {
        let cleaned = PostgresStore::clean_connection_string(
            "postgresql://u:p@db.example.com/scans?sslmode=require&channel_binding=require",
        );
        assert!(cleaned.contains("sslmode=require"));
        assert!(!cleaned.contains("channel_binding"));
    }

    #[test]
    fn test_clean_connection_string_without_params() {
        let cleaned =
            PostgresStore::clean_connection_string("postgresql://localhost/scans?channel_binding=x");
        assert_eq!(cleaned, "postgresql://localhost/scans");

        assert_eq!(PostgresStore::clean_connection_string("not a url"), "not a url");
    }
}
