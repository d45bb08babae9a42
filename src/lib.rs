//! # memwire
//!
//! Typed remote memory access for embedded targets.
//!
//! A command server accepts JSON envelopes from clients and performs reads
//! and writes through a selectable probe backend. The extended-addressing
//! backend talks to the target over a serial link using a compact binary
//! frame with 20-bit addresses.
//!
//! ## Architecture
//!
//! - **access**: typed values, formats and symbols over raw byte access
//! - **protocol**: the extended-addressing frame codec
//! - **transport**: TCP and loopback byte links
//! - **probe**: backends, their lifecycle and the registry
//! - **router**: command envelopes and dispatch
//! - **server** / **client**: the JSON line channel, both ends
//!
//! ## Example
//!
//! ```ignore
//! use memwire::access::TypedAccess;
//! use memwire::{RemoteProbe, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder().bind_addr("127.0.0.1:0").bind().await?;
//!     let addr = server.local_addr()?.to_string();
//!     tokio::spawn(server.run());
//!
//!     let probe = RemoteProbe::new(&addr);
//!     probe.set_probe("DummyProbe").await?;
//!     probe.write_as(0x2000_0000, 42u32).await?;
//!     assert_eq!(probe.read_as::<u32>(0x2000_0000).await?, 42);
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod error;
pub mod probe;
pub mod protocol;
pub mod router;
pub mod transport;

mod client;
mod server;

pub use client::RemoteProbe;
pub use error::{ErrorClass, ProbeError, Result};
pub use router::CommandRouter;
pub use server::{
    serve_channel, Server, ServerBuilder, ServerConfig, DEFAULT_BIND_ADDR, MAX_LINE_LEN,
};
