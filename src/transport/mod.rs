//! Transport module - byte links to the target.
//!
//! Provides:
//! - TCP links to a serial-over-TCP bridge
//! - Loopback links to an in-process emulated target

mod link;
mod loopback;

pub use link::{
    Connector, Link, LinkConfig, LinkStream, DEFAULT_ENDPOINT, DEFAULT_REPLY_TIMEOUT,
};
pub use loopback::LoopbackTarget;
