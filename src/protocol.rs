//! Shared protocol constants for the fling framed transport

use crate::error::{NetError, Result};

/// Width of the decimal length field that prefixes every frame.
pub const SIZE_LENGTH: usize = 16;

/// Maximum bytes moved per chunked read/write during file transfer.
pub const PIECE_SIZE: usize = 1024;

// Maximum frame payload size (64MB) - prevents DoS via memory exhaustion.
// File content travels outside frames, so this only bounds control messages.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Request command tokens (first whitespace-delimited word of a request frame).
pub mod command {
    pub const GET: &str = "GET";
    pub const INFO: &str = "INFO";
    pub const BYE: &str = "BYE";
}

/// Reply payload text.
pub mod reply {
    pub const SENDING_FILE: &str = "OK - SENDING FILE";
    pub const FILE_NOT_FOUND: &str = "ERROR - FILE NOT FOUND";
    pub const BYE_PEER: &str = "OK - BYE PEER";
    pub const UNEXPECTED_REQUEST: &str = "ERROR - UNEXPECTED REQUEST";
}

// Centralized timeout constants so both sides degrade to a distinguishable
// Timeout instead of hanging on a stalled peer.
pub mod timeouts {
    // Per-frame and per-chunk send/receive budget (ms)
    pub const IO_MS: u64 = 3_000;

    // Connection establishment timeout (ms)
    pub const CONNECT_MS: u64 = 5_000;

    // Accept poll interval; bounds how long a stop request can go unnoticed (ms)
    pub const ACCEPT_POLL_MS: u64 = 1_000;

    // Handler readiness wait between requests on one connection (ms)
    pub const READY_MS: u64 = 5_000;
}

/// Serialize the INFO reply: the server's overlay address and listening port
/// as a space-delimited pair.
pub fn encode_peer_info(addr: &str, port: u16) -> String {
    format!("{} {}", addr, port)
}

/// Parse an INFO reply. Token-wise only; received text is never evaluated.
pub fn parse_peer_info(text: &str) -> Result<(String, u16)> {
    let mut tokens = text.split_whitespace();
    let addr = tokens.next();
    let port = tokens.next().and_then(|t| t.parse::<u16>().ok());
    match (addr, port) {
        (Some(addr), Some(port)) if tokens.next().is_none() => Ok((addr.to_string(), port)),
        _ => Err(NetError::Protocol(format!("malformed peer info: {:?}", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_info_round_trip() {
        let text = encode_peer_info("10.147.17.5", 45154);
        assert_eq!(text, "10.147.17.5 45154");
        let (addr, port) = parse_peer_info(&text).unwrap();
        assert_eq!(addr, "10.147.17.5");
        assert_eq!(port, 45154);
    }

    #[test]
    fn peer_info_rejects_garbage() {
        assert!(parse_peer_info("").is_err());
        assert!(parse_peer_info("10.0.0.1").is_err());
        assert!(parse_peer_info("10.0.0.1 notaport").is_err());
        assert!(parse_peer_info("10.0.0.1 45154 extra").is_err());
        assert!(parse_peer_info("10.0.0.1 99999").is_err());
    }
}
