//! Command server: newline-delimited JSON envelopes over TCP.
//!
//! The [`ServerBuilder`] collects configuration and the probe registry;
//! [`Server::bind`] opens the listener. Every accepted connection is served
//! by its own task, and commands on one connection are answered strictly in
//! order.
//!
//! # Example
//!
//! ```ignore
//! use memwire::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder()
//!         .bind_addr("0.0.0.0:8765")
//!         .default_probe("DummyProbe")
//!         .bind()
//!         .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{ProbeError, Result};
use crate::probe::{ProbeRegistry, ProbeSession};
use crate::router::{CommandRouter, Response};
use crate::transport::LinkConfig;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8765";

/// Longest command line accepted on a channel (1 MiB).
pub const MAX_LINE_LEN: usize = 1 << 20;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address.
    pub bind_addr: String,
    /// Backend active at startup.
    pub default_probe: String,
    /// Link settings for the extended-addressing backend.
    pub link: LinkConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            default_probe: ProbeSession::NAME.to_string(),
            link: LinkConfig::default(),
        }
    }
}

/// Builder for configuring and creating a [`Server`].
pub struct ServerBuilder {
    config: ServerConfig,
    registry: Option<ProbeRegistry>,
}

impl ServerBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the listen address.
    ///
    /// Default: `127.0.0.1:8765`
    pub fn bind_addr(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Set the backend active at startup.
    ///
    /// Default: `SKolbusEx`
    pub fn default_probe(mut self, name: &str) -> Self {
        self.config.default_probe = name.to_string();
        self
    }

    /// Set the serial bridge endpoint used by the extended-addressing backend.
    pub fn link_endpoint(mut self, endpoint: &str) -> Self {
        self.config.link.endpoint = endpoint.to_string();
        self
    }

    /// Set the reply timeout of the extended-addressing backend.
    ///
    /// Default: 2 seconds
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.config.link.reply_timeout = timeout;
        self
    }

    /// Use a custom probe registry instead of the standard one.
    pub fn registry(mut self, registry: ProbeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the router and start listening.
    pub async fn bind(self) -> Result<Server> {
        let registry = self
            .registry
            .unwrap_or_else(|| ProbeRegistry::standard(self.config.link.clone()));
        let router = CommandRouter::new(registry, &self.config.default_probe)?;
        Server::bind(&self.config.bind_addr, router).await
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A listening command server.
pub struct Server {
    listener: TcpListener,
    router: Arc<CommandRouter>,
    clients: Arc<AtomicUsize>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Listen on `addr` with an existing router.
    pub async fn bind(addr: &str, router: CommandRouter) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Command server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            router: Arc::new(router),
            clients: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept clients until `shutdown` completes.
    ///
    /// Connections already accepted keep running.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    self.spawn_client(stream, peer);
                }
                _ = &mut shutdown => {
                    tracing::info!("Command server stopped");
                    return Ok(());
                }
            }
        }
    }

    fn spawn_client(&self, stream: TcpStream, peer: SocketAddr) {
        let router = self.router.clone();
        let clients = self.clients.clone();
        let total = clients.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("Client {} connected. Total clients: {}", peer, total);

        tokio::spawn(async move {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!("Cannot disable Nagle for {}: {}", peer, e);
            }
            let (reader, writer) = stream.into_split();
            if let Err(e) = serve_channel(&router, reader, writer).await {
                tracing::warn!("Client {} dropped: {}", peer, e);
            }
            let total = clients.fetch_sub(1, Ordering::SeqCst) - 1;
            tracing::info!("Client {} disconnected. Total clients: {}", peer, total);
        });
    }
}

/// Serve one channel: read envelopes line by line and answer each in order.
///
/// Malformed lines (bad JSON, invalid UTF-8, over [`MAX_LINE_LEN`]) are
/// answered with a failure envelope and the channel stays open. Returns when
/// the peer closes its side.
pub async fn serve_channel<R, W>(router: &CommandRouter, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        let limit = MAX_LINE_LEN as u64 + 1;
        let n = (&mut reader).take(limit).read_until(b'\n', &mut line).await?;
        if n == 0 {
            break;
        }

        let reply = if line.len() > MAX_LINE_LEN && line.last() != Some(&b'\n') {
            skip_line(&mut reader).await?;
            tracing::warn!("Dropped command line longer than {} bytes", MAX_LINE_LEN);
            let error = ProbeError::Protocol(format!(
                "Command line exceeds {} bytes",
                MAX_LINE_LEN
            ));
            Response::failure(None, &error).into_value().to_string()
        } else {
            let text = trim(&line);
            if text.is_empty() {
                continue;
            }
            router.execute_line(text).await
        };

        tracing::debug!("Sending response: {}", reply);
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

fn trim(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|b| !b.is_ascii_whitespace());
    let end = line.iter().rposition(|b| !b.is_ascii_whitespace());
    match (start, end) {
        (Some(start), Some(end)) => &line[start..=end],
        _ => &[],
    }
}

/// Discard input up to and including the next newline.
async fn skip_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<()> {
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}
