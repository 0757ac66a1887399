//! Connection lifecycle: bounded connect, single-exchange use, best-effort
//! BYE close handshake.
//!
//! The protocol is not persistent or multiplexed. Each logical operation
//! opens a fresh connection, runs one request/response (plus an optional
//! file payload) and closes. A connection is exclusively owned by the task
//! that created or accepted it.

use std::net::SocketAddr;
use std::path::Path;

use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use crate::config::Config;
use crate::error::{NetError, Result};
use crate::protocol::command;
use crate::{frame, transfer};

pub struct Connection {
    stream: TcpStream,
    io_timeout_ms: u64,
}

/// Classify a connect-time failure. Refusal and unreachability are the
/// non-fatal "no connection" cases; anything else stays an I/O error.
fn connect_error(addr: &str, err: std::io::Error) -> NetError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::ConnectionRefused
        | ErrorKind::HostUnreachable
        | ErrorKind::NetworkUnreachable
        | ErrorKind::TimedOut => NetError::Unreachable(addr.to_string()),
        _ => NetError::Io(err),
    }
}

impl Connection {
    /// Connect to a peer with a bounded timeout. Refusal or timeout yields
    /// `Unreachable`, which is non-fatal: the caller decides whether to
    /// retry or skip.
    pub async fn open(addr: &str, config: &Config) -> Result<Connection> {
        let connect = TcpStream::connect(addr);
        let stream = match timeout(Duration::from_millis(config.connect_timeout_ms), connect).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(connect_error(addr, e)),
            Err(_) => return Err(NetError::Unreachable(addr.to_string())),
        };
        let _ = stream.set_nodelay(true);
        Ok(Connection {
            stream,
            io_timeout_ms: config.io_timeout_ms,
        })
    }

    /// Wrap an accepted stream (server side).
    pub fn from_stream(stream: TcpStream, io_timeout_ms: u64) -> Connection {
        let _ = stream.set_nodelay(true);
        Connection {
            stream,
            io_timeout_ms,
        }
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Wait until the stream is readable. `Ok(false)` means the wait timed
    /// out, which is the caller's cue to re-check its stop token and loop.
    pub async fn readable_within(&self, ms: u64) -> Result<bool> {
        match timeout(Duration::from_millis(ms), self.stream.readable()).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(NetError::from_stream_io(e)),
            Err(_) => Ok(false),
        }
    }

    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        frame::send_frame(&mut self.stream, payload, self.io_timeout_ms).await
    }

    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.send(text.as_bytes()).await
    }

    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        frame::recv_frame(&mut self.stream, self.io_timeout_ms).await
    }

    pub async fn recv_text(&mut self) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.recv().await?).into_owned())
    }

    pub async fn send_file(&mut self, path: &Path, piece_size: usize) -> Result<u64> {
        transfer::send_file(&mut self.stream, path, piece_size, self.io_timeout_ms).await
    }

    pub async fn receive_file(&mut self, dest: &Path, piece_size: usize) -> Result<u64> {
        transfer::receive_file(&mut self.stream, dest, piece_size, self.io_timeout_ms).await
    }

    /// Best-effort graceful shutdown: send BYE, await one reply frame,
    /// ignore any error from the handshake (it is advisory only). The
    /// stream is dropped unconditionally afterward.
    pub async fn close(mut self) {
        let _: Result<Vec<u8>> = async {
            self.send_text(command::BYE).await?;
            self.recv().await
        }
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_connect_errors_are_non_fatal() {
        use std::io::{Error, ErrorKind};
        for kind in [
            ErrorKind::ConnectionRefused,
            ErrorKind::HostUnreachable,
            ErrorKind::NetworkUnreachable,
            ErrorKind::TimedOut,
        ] {
            match connect_error("10.0.0.1:45154", Error::from(kind)) {
                NetError::Unreachable(addr) => assert_eq!(addr, "10.0.0.1:45154"),
                other => panic!("{:?} should be unreachable, got {:?}", kind, other),
            }
        }
        // Anything else keeps its I/O identity.
        match connect_error("10.0.0.1:45154", Error::from(ErrorKind::PermissionDenied)) {
            NetError::Io(_) => {}
            other => panic!("expected I/O error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn open_to_closed_port_is_unreachable() {
        // Bind then drop to learn a port nothing is listening on.
        let port = {
            let sock = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            sock.local_addr().unwrap().port()
        };
        let addr = format!("127.0.0.1:{}", port);
        match Connection::open(&addr, &Config::default()).await {
            Err(NetError::Unreachable(a)) => assert_eq!(a, addr),
            other => panic!("expected unreachable, got {:?}", other.map(|_| ())),
        }
    }
}
