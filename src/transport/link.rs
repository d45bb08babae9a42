//! Byte link to the target and the connectors that open it.
//!
//! - TCP: a serial-over-TCP bridge (`host:port`)
//! - Loopback: an in-process target emulator over `tokio::io::duplex`
//!
//! # Example
//!
//! ```ignore
//! use memwire::transport::Connector;
//!
//! let mut link = Connector::Tcp.open("127.0.0.1:2217").await?;
//! link.clear_input().await?;
//! link.send(&frame_bytes).await?;
//! let reply = link.receive(frame_bytes.len(), timeout).await?;
//! ```

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::loopback::LoopbackTarget;
use crate::error::{ProbeError, Result};

/// Default link endpoint (RFC 2217 port).
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:2217";

/// Default time to wait for a complete reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Any full-duplex async byte stream.
pub trait LinkStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> LinkStream for T {}

/// Configuration for a probe link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Endpoint passed to the connector (`host:port` for TCP).
    pub endpoint: String,
    /// Time allowed for a complete reply frame.
    pub reply_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

/// How a link is opened.
#[derive(Clone)]
pub enum Connector {
    /// Serial-over-TCP bridge.
    Tcp,
    /// In-process emulated target.
    Loopback(LoopbackTarget),
}

impl Connector {
    /// Open a link to `endpoint`.
    pub async fn open(&self, endpoint: &str) -> Result<Link> {
        match self {
            Connector::Tcp => {
                let stream = TcpStream::connect(endpoint).await.map_err(|e| {
                    ProbeError::Transport(format!("Cannot open {}: {}", endpoint, e))
                })?;
                stream.set_nodelay(true)?;
                Ok(Link::new(stream, endpoint))
            }
            Connector::Loopback(target) => Ok(target.attach()),
        }
    }

    /// Short description of the device behind `endpoint`.
    pub fn describe(&self, endpoint: &str) -> String {
        match self {
            Connector::Tcp => format!("Serial bridge at {}", endpoint),
            Connector::Loopback(_) => "Emulated extended-addressing target".to_string(),
        }
    }
}

/// An open byte link.
pub struct Link {
    stream: Box<dyn LinkStream>,
    endpoint: String,
}

impl Link {
    /// Wrap an already connected stream.
    pub fn new(stream: impl LinkStream + 'static, endpoint: &str) -> Self {
        Self {
            stream: Box::new(stream),
            endpoint: endpoint.to_string(),
        }
    }

    /// Discard bytes already waiting on the link.
    ///
    /// Returns the number of bytes dropped.
    pub async fn clear_input(&mut self) -> Result<usize> {
        let mut scratch = [0u8; 256];
        let mut dropped = 0;
        loop {
            match tokio::time::timeout(Duration::ZERO, self.stream.read(&mut scratch)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => dropped += n,
                Ok(Err(e)) => return Err(ProbeError::Io(e)),
                Err(_) => break,
            }
        }
        if dropped > 0 {
            tracing::debug!("Dropped {} stale bytes on {}", dropped, self.endpoint);
        }
        Ok(dropped)
    }

    /// Write all of `bytes` and flush.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read exactly `len` bytes within `timeout`.
    ///
    /// A timeout or end of stream is a transport error naming how many
    /// bytes did arrive.
    pub async fn receive(&mut self, len: usize, timeout: Duration) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(len);
        let mut filled = 0;

        let outcome = tokio::time::timeout(timeout, async {
            while filled < len {
                let n = self.stream.read(&mut buf[filled..]).await?;
                if n == 0 {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
                }
                filled += n;
            }
            Ok::<(), std::io::Error>(())
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(buf.freeze()),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(ProbeError::Transport(format!(
                    "Link closed after {} of {} reply bytes",
                    filled, len
                )))
            }
            Ok(Err(e)) => Err(ProbeError::Io(e)),
            Err(_) => Err(ProbeError::Transport(format!(
                "Timed out after {:?} with {} of {} reply bytes",
                timeout, filled, len
            ))),
        }
    }

    /// Shut down the write side; the link is unusable afterwards.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!("Shutdown of {} failed: {}", self.endpoint, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_send_and_receive() {
        let (host, mut device) = duplex(64);
        let mut link = Link::new(host, "test");

        link.send(&[1, 2, 3]).await.unwrap();
        let mut buf = [0u8; 3];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [1, 2, 3]);

        device.write_all(&[4, 5]).await.unwrap();
        device.write_all(&[6]).await.unwrap();
        let reply = link.receive(3, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&reply[..], &[4, 5, 6]);
    }

    #[tokio::test]
    async fn test_clear_input_drops_stale_bytes() {
        let (host, mut device) = duplex(64);
        let mut link = Link::new(host, "test");

        device.write_all(&[9; 10]).await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(link.clear_input().await.unwrap(), 10);
        assert_eq!(link.clear_input().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_receive_short_reply_times_out() {
        let (host, mut device) = duplex(64);
        let mut link = Link::new(host, "test");

        device.write_all(&[1, 2]).await.unwrap();
        let err = link
            .receive(4, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Transport(_)));
        assert!(err.to_string().contains("2 of 4"));
    }

    #[tokio::test]
    async fn test_receive_after_peer_closed() {
        let (host, device) = duplex(64);
        let mut link = Link::new(host, "test");
        drop(device);

        let err = link.receive(4, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_tcp_connect_failure_is_transport_error() {
        // Port 1 on localhost is essentially never listening
        let err = Connector::Tcp.open("127.0.0.1:1").await.err().unwrap();
        assert!(err.is_transport());
    }
}
