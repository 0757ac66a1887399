//! Chunked file transfer: one frame declaring the byte count, then the raw
//! content in pieces of at most the configured piece size.
//!
//! Loop termination is strict on both sides: the last piece is clipped to
//! the remaining byte count, so exactly `size` bytes cross the wire and the
//! loop ends there, including when `size` is an exact multiple of the piece
//! size and when `size` is zero.

use std::path::Path;

use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Duration};

use crate::error::{NetError, Result};
use crate::frame;

/// Send a file: a size frame, then `size` bytes in clipped pieces. Returns
/// the number of bytes put on the wire.
pub async fn send_file<S>(stream: &mut S, path: &Path, piece_size: usize, ms: u64) -> Result<u64>
where
    S: AsyncWrite + Unpin,
{
    let meta = fs::metadata(path)
        .await
        .map_err(|_| NetError::FileNotFound(path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(NetError::FileNotFound(path.to_path_buf()));
    }
    let size = meta.len();

    frame::send_frame(stream, size.to_string().as_bytes(), ms).await?;

    let mut file = File::open(path)
        .await
        .map_err(|_| NetError::FileNotFound(path.to_path_buf()))?;
    let mut buf = vec![0u8; piece_size];
    let mut sent: u64 = 0;
    while sent < size {
        let want = piece_size.min((size - sent) as usize);
        let n = file.read(&mut buf[..want]).await?;
        if n == 0 {
            // File shrank under us; the declared size can no longer be met.
            return Err(NetError::Protocol(format!(
                "{} truncated mid-transfer ({} of {} bytes)",
                path.display(),
                sent,
                size
            )));
        }
        timeout(Duration::from_millis(ms), stream.write_all(&buf[..n]))
            .await
            .map_err(NetError::from)?
            .map_err(NetError::from_stream_io)?;
        sent += n as u64;
    }
    timeout(Duration::from_millis(ms), stream.flush())
        .await
        .map_err(NetError::from)?
        .map_err(NetError::from_stream_io)?;
    Ok(sent)
}

/// Receive a file into `dest`, creating the parent directory if absent.
/// A declared size of zero produces an empty file with no further reads.
pub async fn receive_file<S>(stream: &mut S, dest: &Path, piece_size: usize, ms: u64) -> Result<u64>
where
    S: AsyncRead + Unpin,
{
    let size_frame = frame::recv_frame(stream, ms).await?;
    let text = String::from_utf8_lossy(&size_frame);
    let size: u64 = text
        .trim()
        .parse()
        .map_err(|_| NetError::Protocol(format!("bad file size frame: {:?}", text)))?;

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let mut file = File::create(dest).await?;
    if size == 0 {
        return Ok(0);
    }

    let mut buf = vec![0u8; piece_size];
    let mut received: u64 = 0;
    while received < size {
        // Never read past the declared size; the connection carries nothing
        // after the file bytes in this exchange.
        let want = piece_size.min((size - received) as usize);
        let n = match timeout(Duration::from_millis(ms), stream.read(&mut buf[..want])).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(NetError::from_stream_io(e)),
            Err(_) => return Err(NetError::Timeout),
        };
        if n == 0 {
            return Err(NetError::ConnectionBroken);
        }
        file.write_all(&buf[..n]).await?;
        received += n as u64;
    }
    file.flush().await?;
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{ready, Context, Poll};
    use tempfile::TempDir;
    use tokio::io::duplex;

    async fn round_trip(content: &[u8], piece_size: usize) -> Vec<u8> {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();
        let src = src_dir.path().join("src.bin");
        let dst = dst_dir.path().join("sub/dst.bin");
        std::fs::write(&src, content).unwrap();

        let (mut a, mut b) = duplex(64 * 1024);
        let expected = content.len() as u64;
        let sender = tokio::spawn(async move {
            send_file(&mut a, &src, piece_size, 2_000).await.unwrap()
        });
        let received = timeout(
            Duration::from_secs(5),
            receive_file(&mut b, &dst, piece_size, 2_000),
        )
        .await
        .expect("receive stalled")
        .unwrap();
        assert_eq!(received, expected);
        assert_eq!(sender.await.unwrap(), expected);
        std::fs::read(&dst).unwrap()
    }

    #[tokio::test]
    async fn file_round_trip() {
        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(round_trip(&content, 1024).await, content);
    }

    #[tokio::test]
    async fn zero_byte_file_round_trip() {
        assert!(round_trip(b"", 1024).await.is_empty());
    }

    #[tokio::test]
    async fn exact_piece_multiple_terminates() {
        // 4096 = 4 * 1024: the loop must stop at the boundary with no
        // trailing empty piece and no overrun.
        let content = vec![0xabu8; 4096];
        assert_eq!(round_trip(&content, 1024).await, content);
    }

    #[tokio::test]
    async fn missing_source_is_file_not_found() {
        let (mut a, _b) = duplex(1024);
        match send_file(&mut a, Path::new("no/such/file"), 1024, 1_000).await {
            Err(NetError::FileNotFound(_)) => {}
            other => panic!("expected file-not-found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn garbage_size_frame_is_a_protocol_error() {
        let dir = TempDir::new().unwrap();
        let (mut a, mut b) = duplex(1024);
        frame::send_frame(&mut a, b"not-a-number", 1_000).await.unwrap();
        match receive_file(&mut b, &dir.path().join("out"), 1024, 1_000).await {
            Err(NetError::Protocol(_)) => {}
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    struct ChunkRecorder<W> {
        inner: W,
        writes: Vec<usize>,
    }

    impl<W: AsyncWrite + Unpin> AsyncWrite for ChunkRecorder<W> {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, buf))?;
            self.writes.push(n);
            Poll::Ready(Ok(n))
        }
        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }
        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    #[tokio::test]
    async fn chunks_never_exceed_piece_size_and_sum_exactly() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        let size = 10_000usize; // not a multiple of the piece size
        let piece = 1024usize;
        std::fs::write(&src, vec![7u8; size]).unwrap();

        let (a, _b) = duplex(1024 * 1024);
        let mut recorder = ChunkRecorder {
            inner: a,
            writes: Vec::new(),
        };
        let sent = send_file(&mut recorder, &src, piece, 2_000).await.unwrap();
        assert_eq!(sent, size as u64);

        // First two writes carry the length field and the size digits; the
        // rest are content pieces.
        let pieces = &recorder.writes[2..];
        assert!(pieces.iter().all(|&n| n > 0 && n <= piece));
        assert_eq!(pieces.iter().sum::<usize>(), size);
    }
}
