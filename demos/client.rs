//! Remote client - typed reads and writes through a command server.
//!
//! Start the server demo with `MEMWIRE_LOOPBACK=1` first, then:
//!
//! ```sh
//! RUST_LOG=info cargo run --example client
//! ```
//!
//! `MEMWIRE_SERVER` overrides the server address (default `127.0.0.1:8765`).

use memwire::access::{Format, Kind, Symbol, TypedAccess};
use memwire::{RemoteProbe, DEFAULT_BIND_ADDR};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let addr = std::env::var("MEMWIRE_SERVER").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let probe = RemoteProbe::new(&addr);

    println!("Probes: {:?}", probe.list_probes().await?);
    probe.set_probe("SKolbusEx").await?;
    probe.set_min_access_width(2);

    if !probe.connect(None).await? {
        return Err("probe link did not open".into());
    }
    println!("Devices: {:?}", probe.list_devices().await?);

    let counter: u16 = probe.read_as(0xAC25).await?;
    println!("counter @ 0xAC25 = 0x{:04x}", counter);

    let sym = Symbol::new(Kind::F32, 0xC28A);
    for format in [Format::Raw, Format::Dec, Format::Hex] {
        let value = probe.read_symbol(&sym, format).await?;
        let text = serde_json::to_string(&value)?;
        println!("{:?} @ {} as {:?} = {}", sym.typ, sym.adr, format, text);
    }

    probe.write_symbol(&sym, "12.5").await?;
    println!("after write: {:?}", probe.read_symbol(&sym, Format::Dec).await?);

    probe.disconnect().await?;
    Ok(())
}
