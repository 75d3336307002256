// src/output/csv.rs
//! CSV output handler

use crate::output::{OutputHandler, SharedWriter, lock_writer};
use crate::types::SweepRun;
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::Mutex;

const HEADER: [&str; 6] = ["checked_at", "target", "canonical_name", "tier", "method", "error"];

pub struct CsvOutput {
    writer: SharedWriter,
    header_written: Mutex<bool>,
}

impl CsvOutput {
    pub fn new() -> Self {
        Self::to_writer(Box::new(io::stdout()))
    }

    pub fn to_file(file: std::fs::File) -> Self {
        Self::to_writer(Box::new(file))
    }

    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            header_written: Mutex::new(false),
        }
    }

    /// Encode a sweep as CSV rows, with the header only on the first call
    fn encode(&self, run: &SweepRun) -> anyhow::Result<Vec<u8>> {
        let mut header_written = self
            .header_written
            .lock()
            .map_err(|_| anyhow::anyhow!("csv header lock poisoned"))?;

        let mut wtr = csv::Writer::from_writer(Vec::new());
        if !*header_written {
            wtr.write_record(HEADER)?;
            *header_written = true;
        }

        for r in &run.results {
            wtr.write_record([
                r.checked_at.to_rfc3339().as_str(),
                r.target.as_str(),
                r.canonical_name.as_deref().unwrap_or(""),
                r.tier.as_str(),
                r.method.as_str(),
                r.error.as_deref().unwrap_or(""),
            ])?;
        }

        wtr.into_inner()
            .map_err(|e| anyhow::anyhow!("csv flush error: {}", e.error()))
    }
}

impl Default for CsvOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputHandler for CsvOutput {
    async fn emit_run(&self, run: &SweepRun) -> anyhow::Result<()> {
        let bytes = self.encode(run)?;
        let mut writer = lock_writer(&self.writer)?;
        writer.write_all(&bytes)?;
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
    async fn test_csv_output() {
        let buf = SharedBuf::default();
        let handler = CsvOutput::to_writer(Box::new(buf.clone()));

        handler.emit_run(&sample_run()).await.unwrap();

        let contents = buf.contents();
        let mut rdr = csv::Reader::from_reader(contents.as_bytes());
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), HEADER.to_vec());

        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][1], "a.example.com");
        assert_eq!(&rows[0][3], "HIGH");
        // Quotes and commas in the error survive escaping
        assert_eq!(&rows[2][5], "NXDOMAIN, \"no such name\"");
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let buf = SharedBuf::default();
        let handler = CsvOutput::to_writer(Box::new(buf.clone()));

        handler.emit_run(&sample_run()).await.unwrap();
        handler.emit_run(&sample_run()).await.unwrap();

        let contents = buf.contents();
        assert_eq!(contents.matches("checked_at,target").count(), 1);
    }
}
