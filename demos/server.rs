//! Command server - exposes a probe to remote clients.
//!
//! Settings come from the environment:
//! - `MEMWIRE_BIND` - listen address (default `127.0.0.1:8765`)
//! - `MEMWIRE_PROBE` - backend active at startup (default `SKolbusEx`)
//! - `MEMWIRE_LINK` - serial bridge `host:port` for `SKolbusEx`
//! - `MEMWIRE_LOOPBACK` - set to use the emulated target instead of a bridge
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=memwire=debug MEMWIRE_LOOPBACK=1 cargo run --example server
//! ```
//!
//! Then send one JSON command per line:
//!
//! ```sh
//! printf '{"cmd":"connect","id":1}\n{"cmd":"read","id":2,"addr":"0xAC25","nb":2}\n' | nc 127.0.0.1 8765
//! ```

use memwire::probe::ProbeRegistry;
use memwire::transport::{LinkConfig, LoopbackTarget};
use memwire::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut config = ServerConfig::default();
    if let Ok(addr) = std::env::var("MEMWIRE_BIND") {
        config.bind_addr = addr;
    }
    if let Ok(probe) = std::env::var("MEMWIRE_PROBE") {
        config.default_probe = probe;
    }
    if let Ok(endpoint) = std::env::var("MEMWIRE_LINK") {
        config.link = LinkConfig {
            endpoint,
            ..config.link
        };
    }

    let registry = if std::env::var_os("MEMWIRE_LOOPBACK").is_some() {
        let target = LoopbackTarget::new();
        target.poke(0xAC25, &0x1234u16.to_le_bytes());
        target.poke(0xC28A, &496.12f32.to_le_bytes());
        ProbeRegistry::loopback(target)
    } else {
        ProbeRegistry::standard(config.link.clone())
    };

    let server = Server::builder()
        .config(config)
        .registry(registry)
        .bind()
        .await?;

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
