//! Append-only JSONL transfer log, one entry per completed or failed
//! download.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Failed,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TransferLogEntry {
    pub timestamp: String,
    pub filename: String,
    pub status: TransferStatus,
    pub bytes: u64,
    pub seconds: f64,
    pub error: Option<String>,
}

impl TransferLogEntry {
    pub fn new(
        filename: &str,
        status: TransferStatus,
        bytes: u64,
        seconds: f64,
        error: Option<String>,
    ) -> Self {
        TransferLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            filename: filename.to_string(),
            status,
            bytes,
            seconds,
            error,
        }
    }
}

pub struct TransferLog {
    log_file_path: PathBuf,
}

impl TransferLog {
    pub fn new(received_root: &Path) -> Self {
        let log_file_path = received_root.join(".fling_transfers.jsonl");
        TransferLog { log_file_path }
    }

    pub fn add_entry(&self, entry: &TransferLogEntry) -> Result<()> {
        if let Some(parent) = self.log_file_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .context("open transfer log for append")?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_log(&self) -> Result<Vec<TransferLogEntry>> {
        if !self.log_file_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_file_path).context("open transfer log for reading")?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn entries_round_trip_through_the_log() {
        let dir = TempDir::new().unwrap();
        let log = TransferLog::new(dir.path());

        log.add_entry(&TransferLogEntry::new(
            "a.txt",
            TransferStatus::Completed,
            4096,
            0.12,
            None,
        ))
        .unwrap();
        log.add_entry(&TransferLogEntry::new(
            "b.txt",
            TransferStatus::Failed,
            0,
            3.0,
            Some("operation timed out".into()),
        ))
        .unwrap();

        let entries = log.read_log().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].filename, "a.txt");
        assert_eq!(entries[0].status, TransferStatus::Completed);
        assert_eq!(entries[1].status, TransferStatus::Failed);
        assert!(entries[1].error.is_some());
    }

    #[test]
    fn empty_log_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let log = TransferLog::new(dir.path());
        assert!(log.read_log().unwrap().is_empty());
    }
}
