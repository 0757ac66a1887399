//! Runtime configuration, constructed once in the binaries and passed into
//! every component. There is no module-level mutable state; everything a
//! task needs travels with it.

use std::path::PathBuf;

use crate::protocol::{timeouts, PIECE_SIZE};

/// Default listening port of a fling daemon.
pub const DEFAULT_PORT: u16 = 45154;

#[derive(Clone, Debug)]
pub struct Config {
    /// Port the daemon listens on and reports in INFO replies.
    pub port: u16,
    /// Directory served files are read from.
    pub served_root: PathBuf,
    /// Directory received files are written under (created if absent).
    pub received_root: PathBuf,
    /// Maximum bytes per chunked read/write during file transfer.
    pub piece_size: usize,
    pub io_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub accept_poll_ms: u64,
    pub ready_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            served_root: PathBuf::from("files"),
            received_root: PathBuf::from("recv"),
            piece_size: PIECE_SIZE,
            io_timeout_ms: timeouts::IO_MS,
            connect_timeout_ms: timeouts::CONNECT_MS,
            accept_poll_ms: timeouts::ACCEPT_POLL_MS,
            ready_timeout_ms: timeouts::READY_MS,
        }
    }
}
