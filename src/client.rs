//! Download orchestrator: one independent task and one fresh connection per
//! requested file.
//!
//! Every download runs to completion on its own; a timeout or broken
//! connection on one file never aborts or delays the others. The
//! orchestrator collects every outcome before returning.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::config::Config;
use crate::connection::Connection;
use crate::error::{NetError, Result};
use crate::log::{TransferLog, TransferLogEntry, TransferStatus};
use crate::protocol::{self, command, reply};

#[derive(Debug)]
pub struct DownloadOutcome {
    pub filename: String,
    pub result: Result<u64>,
    pub elapsed: Duration,
}

impl DownloadOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Ask a server for its overlay address and listening port over a
/// short-lived connection.
pub async fn resolve_server(addr: &str, config: &Config) -> Result<(String, u16)> {
    let mut conn = Connection::open(addr, config).await?;
    conn.send_text(command::INFO).await?;
    let answer = conn.recv_text().await?;
    conn.close().await;
    protocol::parse_peer_info(&answer)
}

/// Download every named file concurrently from `server`, one task and one
/// connection each, and return once all of them have finished.
pub async fn fetch(
    config: Arc<Config>,
    server: (String, u16),
    filenames: Vec<String>,
) -> Vec<DownloadOutcome> {
    let server_addr = format!("{}:{}", server.0, server.1);
    let log = Arc::new(TransferLog::new(&config.received_root));

    let mut tasks = JoinSet::new();
    for filename in filenames {
        let config = Arc::clone(&config);
        let log = Arc::clone(&log);
        let addr = server_addr.clone();
        tasks.spawn(async move { download_one(&config, &log, &addr, filename).await });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => eprintln!("download task failed to run: {}", e),
        }
    }
    outcomes
}

async fn download_one(
    config: &Config,
    log: &TransferLog,
    addr: &str,
    filename: String,
) -> DownloadOutcome {
    println!("file {} reception starts", filename);
    let start = Instant::now();
    let result = run_download(config, addr, &filename).await;
    let elapsed = start.elapsed();

    let entry = match &result {
        Ok(bytes) => {
            println!(
                "file {} received in {:.3}s ({} bytes)",
                filename,
                elapsed.as_secs_f64(),
                bytes
            );
            TransferLogEntry::new(
                &filename,
                TransferStatus::Completed,
                *bytes,
                elapsed.as_secs_f64(),
                None,
            )
        }
        Err(e) => {
            eprintln!("file {} failed: {}", filename, e);
            TransferLogEntry::new(
                &filename,
                TransferStatus::Failed,
                0,
                elapsed.as_secs_f64(),
                Some(e.to_string()),
            )
        }
    };
    if let Err(e) = log.add_entry(&entry) {
        eprintln!("transfer log write failed: {}", e);
    }

    DownloadOutcome {
        filename,
        result,
        elapsed,
    }
}

/// One GET exchange on a fresh connection. The connection is closed on
/// every path once the exchange is over.
async fn run_download(config: &Config, addr: &str, filename: &str) -> Result<u64> {
    let mut conn = Connection::open(addr, config).await?;

    let request = format!("{} {}", command::GET, filename);
    let answer = match async {
        conn.send_text(&request).await?;
        conn.recv_text().await
    }
    .await
    {
        Ok(answer) => answer,
        Err(e) => {
            conn.close().await;
            return Err(e);
        }
    };

    if answer.split_whitespace().next() != Some("OK") {
        conn.close().await;
        return if answer == reply::FILE_NOT_FOUND {
            Err(NetError::FileNotFound(filename.into()))
        } else {
            Err(NetError::Protocol(format!(
                "unexpected reply to GET {}: {:?}",
                filename, answer
            )))
        };
    }

    let dest = config.received_root.join(filename);
    let received = conn.receive_file(&dest, config.piece_size).await;
    conn.close().await;
    received
}
