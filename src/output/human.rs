// src/output/human.rs
//! Human-readable colored terminal report

use crate::output::{OutputHandler, SharedWriter, lock_writer};
use crate::types::{RiskTier, SweepRun};
use async_trait::async_trait;
use colored::Colorize;
use std::io::{self, Write};
use std::sync::Mutex;

pub struct HumanOutput {
    writer: SharedWriter,
    use_colors: bool,
}

impl HumanOutput {
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
            use_colors: is_terminal::is_terminal(std::io::stdout()),
        }
    }

    pub fn to_file(file: std::fs::File) -> Self {
        Self::to_writer(Box::new(file))
    }

    /// No colors when writing anywhere but a terminal
    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            use_colors: false,
        }
    }
}

impl Default for HumanOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputHandler for HumanOutput {
    async fn emit_run(&self, run: &SweepRun) -> anyhow::Result<()> {
        let mut writer = lock_writer(&self.writer)?;

        let timestamp = run.finished_at.format("%Y-%m-%d %H:%M:%S");
        writeln!(
            writer,
            "[INFO] Scanned {} domains at {}",
            run.results.len(),
            timestamp
        )?;

        for result in &run.results {
            let line = result.to_string();
            if self.use_colors {
                let colored = match result.tier {
                    RiskTier::High => line.red().bold(),
                    RiskTier::Low => line.green(),
                    RiskTier::None => line.dimmed(),
                };
                writeln!(writer, "{}", colored)?;
            } else {
                writeln!(writer, "{}", line)?;
            }

            if let Some(ref error) = result.error {
                writeln!(writer, "    error: {}", error)?;
            }
        }

        writeln!(
            writer,
            "[INFO] HIGH: {}  LOW: {}  NONE: {}",
            run.count(RiskTier::High),
            run.count(RiskTier::Low),
            run.count(RiskTier::None)
        )?;

        if !run.diagnostics.is_clean() {
            for failure in &run.diagnostics.notification_failures {
                writeln!(writer, "[WARN] notification: {}", failure)?;
            }
            for failure in &run.diagnostics.persistence_failures {
                writeln!(writer, "[WARN] persistence: {}", failure)?;
            }
        }

        writer.flush()?;
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        lock_writer(&self.writer)?.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::{SharedBuf, sample_run};

    #[tokio::test]
    async fn test_human_report_lines() {
        let buf = SharedBuf::default();
        let handler = HumanOutput::to_writer(Box::new(buf.clone()));

        handler.emit_run(&sample_run()).await.unwrap();

        let contents = buf.contents();
        assert!(contents.starts_with("[INFO] Scanned 3 domains at "));
        assert!(contents.contains("[+] Potential takeover: a.example.com -> x.s3.amazonaws.com"));
        assert!(contents.contains("[-] b.example.com -> No issues found"));
        assert!(contents.contains("[?] c.example.com -> Unknown"));
        assert!(contents.contains("HIGH: 1  LOW: 1  NONE: 1"));
        assert!(!contents.contains("[WARN]"));
    }

    #[tokio::test]
    async fn test_human_report_shows_diagnostics() {
        let buf = SharedBuf::default();
        let handler = HumanOutput::to_writer(Box::new(buf.clone()));

        let mut run = sample_run();
        run.diagnostics
            .persistence_failures
            .push("a.example.com: connection refused".to_string());
        handler.emit_run(&run).await.unwrap();

        assert!(buf.contents().contains("[WARN] persistence: a.example.com: connection refused"));
    }
}
