//! Error taxonomy for the wire protocol and transfer layers.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetError>;

#[derive(Error, Debug)]
pub enum NetError {
    /// No progress within the time budget on a blocking operation.
    #[error("operation timed out")]
    Timeout,

    /// Peer closed mid-exchange or a write moved zero bytes.
    #[error("connection broken")]
    ConnectionBroken,

    /// Connect-time failure (refused or unreachable). Non-fatal: callers
    /// decide whether to retry or skip the peer.
    #[error("no connection to {0}")]
    Unreachable(String),

    /// Requested file absent or not a regular file.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// Malformed length field, size frame, or reply text.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Overlay-network collaborator failure.
    #[error("overlay network: {0}")]
    Overlay(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<tokio::time::error::Elapsed> for NetError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        NetError::Timeout
    }
}

impl NetError {
    /// Classify an I/O failure on an active exchange: anything that signals
    /// the peer went away becomes ConnectionBroken.
    pub(crate) fn from_stream_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => NetError::ConnectionBroken,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => NetError::Timeout,
            _ => NetError::Io(err),
        }
    }
}
