//! Extended-addressing probe session.
//!
//! Each access is one round trip on the link: clear stale input, send the
//! request frame, then wait for a reply of the same length. Reads carry the
//! data after the reply header; writes are answered with an echo.
//!
//! The link sits behind a `tokio::sync::Mutex` that is held for the whole
//! round trip, so frames from concurrent callers never interleave.
//!
//! # Example
//!
//! ```ignore
//! use memwire::probe::{Probe, ProbeSession};
//! use memwire::transport::{Connector, LinkConfig};
//!
//! let session = ProbeSession::new(Connector::Tcp, LinkConfig::default());
//! if session.connect(Some("192.168.1.20:2217")).await {
//!     let bytes = session.read(0xAC25, 2).await?;
//! }
//! ```

use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::Mutex as AsyncMutex;

use super::{DeviceInfo, Probe};
use crate::access::MemoryAccess;
use crate::error::{ProbeError, Result};
use crate::protocol::{decode_reply, Frame, HEADER_SIZE};
use crate::transport::{Connector, Link, LinkConfig};

/// Link state of a [`ProbeSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Probe backend speaking extended-addressing frames.
pub struct ProbeSession {
    connector: Connector,
    config: LinkConfig,
    endpoint: Mutex<String>,
    state: Mutex<SessionState>,
    link: AsyncMutex<Option<Link>>,
}

impl ProbeSession {
    /// Registry name.
    pub const NAME: &'static str = "SKolbusEx";

    /// Create a disconnected session.
    pub fn new(connector: Connector, config: LinkConfig) -> Self {
        Self {
            connector,
            endpoint: Mutex::new(config.endpoint.clone()),
            config,
            state: Mutex::new(SessionState::Disconnected),
            link: AsyncMutex::new(None),
        }
    }

    /// Current link state.
    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    /// Endpoint used by the next `connect`.
    pub fn endpoint(&self) -> String {
        lock(&self.endpoint).clone()
    }

    fn set_state(&self, state: SessionState) {
        *lock(&self.state) = state;
    }

    /// Run one request/reply exchange.
    ///
    /// A transport failure drops the link.
    async fn round_trip(&self, frame: &Frame) -> Result<Bytes> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(ProbeError::NotConnected)?;

        let outcome = async {
            link.clear_input().await?;
            let bytes = frame.to_bytes();
            tracing::debug!("TX {}", hex::encode(&bytes));
            link.send(&bytes).await?;
            let reply = link.receive(frame.len(), self.config.reply_timeout).await?;
            tracing::debug!("RX {}", hex::encode(&reply));
            Ok::<_, ProbeError>(reply)
        }
        .await;

        if let Err(e) = &outcome {
            if e.is_transport() {
                tracing::warn!("Link lost: {}", e);
                if let Some(link) = guard.take() {
                    link.close().await;
                }
                self.set_state(SessionState::Disconnected);
            }
        }
        outcome
    }
}

impl MemoryAccess for ProbeSession {
    async fn read(&self, address: u32, byte_count: usize) -> Result<Bytes> {
        let frame = Frame::read(address, byte_count)?;
        // The truncated word count can leave the last odd byte outside the reply
        if frame.payload.len() < byte_count {
            return Err(ProbeError::Protocol(format!(
                "Read of {} bytes is not covered by {} words",
                byte_count,
                frame.word_count()
            )));
        }
        let reply = self.round_trip(&frame).await?;
        decode_reply(&reply, byte_count)
    }

    async fn write(&self, address: u32, data: &[u8]) -> Result<()> {
        if data.len() % 2 != 0 {
            return Err(ProbeError::Protocol(format!(
                "Write of {} bytes is not a whole number of 16-bit words",
                data.len()
            )));
        }
        let frame = Frame::write(address, data)?;
        let echo = self.round_trip(&frame).await?;
        if echo[..HEADER_SIZE] != frame.header.encode() {
            tracing::debug!("Write echo header differs from request");
        }
        Ok(())
    }

    fn min_access_width(&self) -> usize {
        2
    }
}

impl Probe for ProbeSession {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn connect(&self, uri: Option<&str>) -> bool {
        if let Some(uri) = uri {
            *lock(&self.endpoint) = uri.to_string();
        }

        let mut link = self.link.lock().await;
        if link.is_some() {
            return true;
        }

        let endpoint = self.endpoint();
        self.set_state(SessionState::Connecting);
        match self.connector.open(&endpoint).await {
            Ok(opened) => {
                *link = Some(opened);
                self.set_state(SessionState::Connected);
                tracing::info!("Connected to {}", endpoint);
                true
            }
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                tracing::warn!("Connect to {} failed: {}", endpoint, e);
                false
            }
        }
    }

    async fn disconnect(&self) -> bool {
        let mut link = self.link.lock().await;
        if let Some(open) = link.take() {
            open.close().await;
            tracing::info!("Disconnected from {}", self.endpoint());
        }
        self.set_state(SessionState::Disconnected);
        false
    }

    fn is_open(&self) -> bool {
        self.state() == SessionState::Connected
    }

    fn list_devices(&self) -> Vec<DeviceInfo> {
        let endpoint = self.endpoint();
        vec![DeviceInfo {
            description: self.connector.describe(&endpoint),
            id: endpoint,
        }]
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
