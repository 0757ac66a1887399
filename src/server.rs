//! Request dispatcher: an accept loop with a short poll timeout and one
//! handler task per accepted connection.
//!
//! The accept loop re-checks its cancellation token every poll interval, so
//! a stop request is observed within one interval. Each handler holds a
//! child token; cancelling the server stops every live handler.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::connection::Connection;
use crate::error::{NetError, Result};
use crate::log::{TransferLog, TransferLogEntry, TransferStatus};
use crate::protocol::{self, command, reply};

/// Bind the configured port and serve until cancelled. A bind failure is
/// fatal; everything after that is per-connection.
pub async fn serve(config: Arc<Config>, overlay_addr: String, cancel: CancellationToken) -> Result<()> {
    let bind = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind).await?;
    serve_on(listener, config, overlay_addr, cancel).await
}

/// Accept loop on an already-bound listener. Split out so tests can bind
/// port 0 and learn the ephemeral port before serving.
pub async fn serve_on(
    listener: TcpListener,
    config: Arc<Config>,
    overlay_addr: String,
    cancel: CancellationToken,
) -> Result<()> {
    eprintln!(
        "fling daemon listening on {} root={}",
        listener.local_addr()?,
        config.served_root.display()
    );

    // Served files get the same JSONL trail as client downloads, kept
    // next to the files they came from.
    let log = Arc::new(TransferLog::new(&config.served_root));

    let mut handlers = JoinSet::new();
    let mut counter: u64 = 0;
    while !cancel.is_cancelled() {
        // Short accept poll so a stop request never waits on a quiet socket.
        match timeout(Duration::from_millis(config.accept_poll_ms), listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                let id = counter;
                counter += 1;
                eprintln!("[conn {}] accepted {}", id, peer);
                let config = Arc::clone(&config);
                let overlay = overlay_addr.clone();
                let log = Arc::clone(&log);
                let stop = cancel.child_token();
                handlers.spawn(async move {
                    if let Err(e) = handle_connection(id, stream, config, overlay, log, stop).await {
                        eprintln!("[conn {}] {} dropped: {}", id, peer, e);
                    }
                });
            }
            Ok(Err(e)) => eprintln!("accept failed: {}", e),
            Err(_) => {}
        }
        // Reap finished handlers so the set does not grow unbounded.
        while handlers.try_join_next().is_some() {}
    }

    eprintln!("stopping daemon, waiting for {} handler(s)", handlers.len());
    drop(listener);
    while handlers.join_next().await.is_some() {}
    Ok(())
}

/// One handler owns one accepted connection for its whole lifetime. The
/// readiness wait is the suspension point: on timeout the stop token is
/// re-checked and the wait resumes.
async fn handle_connection(
    id: u64,
    stream: TcpStream,
    config: Arc<Config>,
    overlay_addr: String,
    log: Arc<TransferLog>,
    stop: CancellationToken,
) -> Result<()> {
    let mut conn = Connection::from_stream(stream, config.io_timeout_ms);
    while !stop.is_cancelled() {
        match conn.readable_within(config.ready_timeout_ms).await {
            Ok(true) => {}
            Ok(false) => continue,
            Err(_) => break,
        }
        let request = match conn.recv_text().await {
            Ok(text) => text,
            Err(NetError::ConnectionBroken) => break,
            Err(e) => return Err(e),
        };
        // An empty read means the peer closed its end.
        if request.is_empty() {
            break;
        }
        if !dispatch(id, &mut conn, request.trim_end(), &config, &overlay_addr, &log).await? {
            break;
        }
    }
    Ok(())
}

/// Handle one request. Returns `Ok(false)` when the exchange was terminal
/// (BYE) and the handler should wind down.
async fn dispatch(
    id: u64,
    conn: &mut Connection,
    request: &str,
    config: &Config,
    overlay_addr: &str,
    log: &TransferLog,
) -> Result<bool> {
    let mut tokens = request.split_whitespace();
    match tokens.next() {
        Some(command::GET) => {
            println!("[conn {}] {}", id, request);
            match tokens.next().and_then(|name| locate_served(&config.served_root, name)) {
                Some(path) => {
                    conn.send_text(reply::SENDING_FILE).await?;
                    let name = path.display().to_string();
                    let start = Instant::now();
                    match conn.send_file(&path, config.piece_size).await {
                        Ok(bytes) => {
                            println!("[conn {}] sent {} ({} bytes)", id, name, bytes);
                            record(log, &name, TransferStatus::Completed, bytes, start, None);
                        }
                        Err(e) => {
                            record(log, &name, TransferStatus::Failed, 0, start, Some(e.to_string()));
                            return Err(e);
                        }
                    }
                }
                None => conn.send_text(reply::FILE_NOT_FOUND).await?,
            }
            Ok(true)
        }
        Some(command::INFO) => {
            conn.send_text(&protocol::encode_peer_info(overlay_addr, config.port))
                .await?;
            Ok(true)
        }
        Some(command::BYE) => {
            conn.send_text(reply::BYE_PEER).await?;
            Ok(false)
        }
        _ => {
            conn.send_text(reply::UNEXPECTED_REQUEST).await?;
            Ok(true)
        }
    }
}

fn record(
    log: &TransferLog,
    name: &str,
    status: TransferStatus,
    bytes: u64,
    start: Instant,
    error: Option<String>,
) {
    let entry = TransferLogEntry::new(name, status, bytes, start.elapsed().as_secs_f64(), error);
    if let Err(e) = log.add_entry(&entry) {
        eprintln!("transfer log write failed: {}", e);
    }
}

/// Resolve a requested filename under the served-files root, rejecting any
/// name that would escape it. Returns the path only for an existing regular
/// file.
fn locate_served(root: &Path, name: &str) -> Option<PathBuf> {
    if name.contains('\0') {
        return None;
    }
    let mut safe = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => safe.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if safe.as_os_str().is_empty() {
        return None;
    }
    let path = root.join(safe);
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}
