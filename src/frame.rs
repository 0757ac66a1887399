//! Length-prefixed frame codec.
//!
//! Every message travels as a frame: a 16-digit zero-padded decimal byte
//! count followed by exactly that many payload bytes. A byte stream carries
//! no message boundaries; the fixed-width prefix removes any need for
//! escaping or delimiter scanning and lets the receiver pre-size its buffer.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Duration};

use crate::error::{NetError, Result};
use crate::protocol::{MAX_FRAME_SIZE, SIZE_LENGTH};

fn encode_length(len: usize) -> Result<[u8; SIZE_LENGTH]> {
    let text = format!("{:0width$}", len, width = SIZE_LENGTH);
    if text.len() != SIZE_LENGTH {
        return Err(NetError::Protocol(format!(
            "payload of {} bytes overflows the length field",
            len
        )));
    }
    let mut field = [0u8; SIZE_LENGTH];
    field.copy_from_slice(text.as_bytes());
    Ok(field)
}

fn parse_length(field: &[u8; SIZE_LENGTH]) -> Result<usize> {
    // Digits only: parse() alone would also take a sign or padding.
    if !field.iter().all(u8::is_ascii_digit) {
        return Err(NetError::Protocol(format!(
            "length field is not numeric: {:?}",
            String::from_utf8_lossy(field)
        )));
    }
    let text = std::str::from_utf8(field)
        .map_err(|_| NetError::Protocol("length field is not ASCII".into()))?;
    text.parse::<usize>()
        .map_err(|_| NetError::Protocol(format!("length field is not numeric: {:?}", text)))
}

/// Write one frame, looping on partial writes until everything is flushed.
/// Fails with Timeout if the budget elapses, ConnectionBroken if the peer
/// is gone.
pub async fn send_frame<S>(stream: &mut S, payload: &[u8], ms: u64) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let field = encode_length(payload.len())?;
    timeout(Duration::from_millis(ms), async {
        stream.write_all(&field).await?;
        if !payload.is_empty() {
            stream.write_all(payload).await?;
        }
        stream.flush().await
    })
    .await
    .map_err(NetError::from)?
    .map_err(NetError::from_stream_io)
}

/// Read one frame: exactly 16 header bytes, then exactly the declared number
/// of payload bytes, accumulating across partial reads.
pub async fn recv_frame<S>(stream: &mut S, ms: u64) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut field = [0u8; SIZE_LENGTH];
    timeout(Duration::from_millis(ms), stream.read_exact(&mut field))
        .await
        .map_err(NetError::from)?
        .map_err(NetError::from_stream_io)?;

    let len = parse_length(&field)?;
    if len > MAX_FRAME_SIZE {
        return Err(NetError::Protocol(format!(
            "frame payload too large: {} bytes (max: {})",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut payload = vec![0u8; len];
    if len > 0 {
        timeout(Duration::from_millis(ms), stream.read_exact(&mut payload))
            .await
            .map_err(NetError::from)?
            .map_err(NetError::from_stream_io)?;
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetError;
    use tokio::io::duplex;

    #[tokio::test]
    async fn frame_round_trip() {
        let (mut a, mut b) = duplex(64 * 1024);
        let payload = b"GET some-file.bin".to_vec();
        send_frame(&mut a, &payload, 1_000).await.unwrap();
        let got = recv_frame(&mut b, 1_000).await.unwrap();
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn empty_frame_round_trip() {
        let (mut a, mut b) = duplex(1024);
        send_frame(&mut a, b"", 1_000).await.unwrap();
        let got = recv_frame(&mut b, 1_000).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn length_field_is_sixteen_zero_padded_digits() {
        let (mut a, mut b) = duplex(1024);
        send_frame(&mut a, b"hello", 1_000).await.unwrap();
        let mut field = [0u8; SIZE_LENGTH];
        b.read_exact(&mut field).await.unwrap();
        assert_eq!(&field, b"0000000000000005");
        let mut rest = [0u8; 5];
        b.read_exact(&mut rest).await.unwrap();
        assert_eq!(&rest, b"hello");
    }

    #[tokio::test]
    async fn non_numeric_length_is_a_protocol_error() {
        let (mut a, mut b) = duplex(1024);
        a.write_all(b"abcdefghijklmnop").await.unwrap();
        match recv_frame(&mut b, 1_000).await {
            Err(NetError::Protocol(_)) => {}
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn signed_or_padded_length_is_a_protocol_error() {
        for header in [
            b"+123456789012345".as_slice(),
            b"-123456789012345".as_slice(),
            b" 000000000000005".as_slice(),
        ] {
            let (mut a, mut b) = duplex(1024);
            a.write_all(header).await.unwrap();
            match recv_frame(&mut b, 1_000).await {
                Err(NetError::Protocol(_)) => {}
                other => panic!("expected protocol error for {:?}, got {:?}", header, other),
            }
        }
    }

    #[tokio::test]
    async fn oversized_length_is_a_protocol_error() {
        let (mut a, mut b) = duplex(1024);
        a.write_all(b"9999999999999999").await.unwrap();
        match recv_frame(&mut b, 1_000).await {
            Err(NetError::Protocol(_)) => {}
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn short_payload_times_out() {
        let (mut a, mut b) = duplex(1024);
        // Header promises 10 bytes but only 3 ever arrive.
        a.write_all(b"0000000000000010").await.unwrap();
        a.write_all(b"abc").await.unwrap();
        match recv_frame(&mut b, 100).await {
            Err(NetError::Timeout) => {}
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn closed_peer_is_connection_broken() {
        let (a, mut b) = duplex(1024);
        drop(a);
        match recv_frame(&mut b, 1_000).await {
            Err(NetError::ConnectionBroken) => {}
            other => panic!("expected broken connection, got {:?}", other),
        }
    }
}
