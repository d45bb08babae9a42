//! Remote probe client.
//!
//! [`RemoteProbe`] speaks the command envelope protocol to a [`Server`]
//! and implements [`MemoryAccess`], so every typed helper works against a
//! probe attached to another machine.
//!
//! The channel is opened on first use and reopened after an I/O failure.
//! Calls are serialized; each one is correlated with its reply by `id`.
//!
//! # Example
//!
//! ```ignore
//! use memwire::access::{Kind, Symbol, TypedAccess, Format};
//! use memwire::RemoteProbe;
//!
//! let probe = RemoteProbe::new("127.0.0.1:8765");
//! probe.set_probe("SKolbusEx").await?;
//! probe.connect(Some("192.168.1.20:2217")).await?;
//!
//! let sym = Symbol::new(Kind::F32, 0xC28A);
//! let value = probe.read_symbol(&sym, Format::Dec).await?;
//! ```
//!
//! [`Server`]: crate::Server

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::access::MemoryAccess;
use crate::error::{ProbeError, Result};
use crate::probe::DeviceInfo;
use crate::router::{Request, Response};

struct Channel {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Channel {
    async fn open(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ProbeError::Transport(format!("Cannot reach server {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        tracing::info!("Connected to command server at {}", addr);
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    async fn exchange(&mut self, request: Request, id: u64) -> Result<Response> {
        let mut line = request.with_id(id).into_value().to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;

        loop {
            let Some(text) = self.lines.next_line().await? else {
                return Err(ProbeError::Transport("Server closed the channel".into()));
            };
            let response: Response = serde_json::from_str(&text)?;
            let ours = response.id.as_ref().and_then(Value::as_u64) == Some(id);
            // Envelope-level failures (bad JSON) carry no id
            if ours || (response.id.is_none() && !response.is_success()) {
                return Ok(response);
            }
            tracing::warn!("Skipping reply with unexpected id {:?}", response.id);
        }
    }
}

/// Memory access through a remote command server.
pub struct RemoteProbe {
    addr: String,
    channel: Mutex<Option<Channel>>,
    next_id: AtomicU64,
    min_width: AtomicUsize,
}

impl RemoteProbe {
    /// Create a client for the server at `addr` (`host:port`).
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            channel: Mutex::new(None),
            next_id: AtomicU64::new(1),
            min_width: AtomicUsize::new(1),
        }
    }

    /// Server address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Declare the remote backend's minimum access width.
    ///
    /// Set this to 2 when the server drives the extended-addressing
    /// backend so byte writes are widened on this side.
    pub fn set_min_access_width(&self, width: usize) {
        self.min_width.store(width.max(1), Ordering::SeqCst);
    }

    /// Send one command and wait for its reply.
    ///
    /// Failure envelopes become [`ProbeError::Remote`].
    pub async fn call(&self, request: Request) -> Result<Response> {
        let mut guard = self.channel.lock().await;
        if guard.is_none() {
            *guard = Some(Channel::open(&self.addr).await?);
        }
        let Some(channel) = guard.as_mut() else {
            return Err(ProbeError::NotConnected);
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        match channel.exchange(request, id).await {
            Ok(response) => response.into_result(),
            Err(e) => {
                tracing::warn!("Command channel to {} lost: {}", self.addr, e);
                *guard = None;
                Err(e)
            }
        }
    }

    /// Close the command channel. The next call reopens it.
    pub async fn close(&self) {
        self.channel.lock().await.take();
    }

    /// Backend names the server offers.
    pub async fn list_probes(&self) -> Result<Vec<String>> {
        let response = self.call(Request::new("list_probes")).await?;
        field(&response, "probes")
    }

    /// Select the server's active backend.
    pub async fn set_probe(&self, name: &str) -> Result<()> {
        self.call(Request::new("set_probe").param("probe_name", name))
            .await
            .map(|_| ())
    }

    /// Devices the active backend can reach.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let response = self.call(Request::new("list_devices")).await?;
        field(&response, "devices")
    }

    /// Open the active backend's link. Returns whether it is open.
    pub async fn connect(&self, uri: Option<&str>) -> Result<bool> {
        let mut request = Request::new("connect");
        if let Some(uri) = uri {
            request = request.param("uri", uri);
        }
        let response = self.call(request).await?;
        field(&response, "is_open")
    }

    /// Close the active backend's link. Returns whether it is still open.
    pub async fn disconnect(&self) -> Result<bool> {
        let response = self.call(Request::new("disconnect")).await?;
        field(&response, "is_open")
    }
}

fn field<T: serde::de::DeserializeOwned>(response: &Response, name: &str) -> Result<T> {
    let value = response
        .field(name)
        .cloned()
        .ok_or_else(|| ProbeError::Protocol(format!("Response is missing '{}'", name)))?;
    Ok(serde_json::from_value(value)?)
}

impl MemoryAccess for RemoteProbe {
    async fn read(&self, address: u32, byte_count: usize) -> Result<Bytes> {
        let request = Request::new("read")
            .param("addr", address)
            .param("nb", byte_count);
        let response = self.call(request).await?;
        let data: String = field(&response, "data")?;
        let bytes = hex::decode(data)?;
        if bytes.len() != byte_count {
            return Err(ProbeError::Protocol(format!(
                "Server returned {} bytes, expected {}",
                bytes.len(),
                byte_count
            )));
        }
        Ok(Bytes::from(bytes))
    }

    async fn write(&self, address: u32, data: &[u8]) -> Result<()> {
        let request = Request::new("write")
            .param("addr", address)
            .param("data", Value::String(hex::encode(data)));
        self.call(request).await.map(|_| ())
    }

    fn min_access_width(&self) -> usize {
        self.min_width.load(Ordering::SeqCst)
    }
}
