//! Probe module - backends that carry memory accesses to a target.
//!
//! - [`ProbeSession`] - extended-addressing frames over a byte link
//! - [`DummyProbe`] - simulated target memory
//! - [`Backend`] - the closed set of backends the router can hold
//! - [`ProbeRegistry`] - name to constructor table used by `set_probe`

mod dummy;
mod registry;
mod session;

use std::future::Future;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use dummy::DummyProbe;
pub use registry::{ProbeFactory, ProbeRegistry};
pub use session::{ProbeSession, SessionState};

use crate::access::MemoryAccess;
use crate::error::Result;

/// A device a backend can talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub description: String,
}

/// Lifecycle shared by all backends.
pub trait Probe: MemoryAccess {
    /// Registry name of this backend.
    fn name(&self) -> &'static str;

    /// Open the link, optionally to a new `uri`. Returns whether it is open.
    fn connect(&self, uri: Option<&str>) -> impl Future<Output = bool> + Send;

    /// Close the link. Returns whether it is still open.
    fn disconnect(&self) -> impl Future<Output = bool> + Send;

    fn is_open(&self) -> bool;

    fn list_devices(&self) -> Vec<DeviceInfo>;
}

/// Every backend the router can select.
pub enum Backend {
    KolbusEx(ProbeSession),
    Dummy(DummyProbe),
}

impl MemoryAccess for Backend {
    async fn read(&self, address: u32, byte_count: usize) -> Result<Bytes> {
        match self {
            Backend::KolbusEx(p) => p.read(address, byte_count).await,
            Backend::Dummy(p) => p.read(address, byte_count).await,
        }
    }

    async fn write(&self, address: u32, data: &[u8]) -> Result<()> {
        match self {
            Backend::KolbusEx(p) => p.write(address, data).await,
            Backend::Dummy(p) => p.write(address, data).await,
        }
    }

    fn min_access_width(&self) -> usize {
        match self {
            Backend::KolbusEx(p) => p.min_access_width(),
            Backend::Dummy(p) => p.min_access_width(),
        }
    }
}

impl Probe for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::KolbusEx(p) => p.name(),
            Backend::Dummy(p) => p.name(),
        }
    }

    async fn connect(&self, uri: Option<&str>) -> bool {
        match self {
            Backend::KolbusEx(p) => p.connect(uri).await,
            Backend::Dummy(p) => p.connect(uri).await,
        }
    }

    async fn disconnect(&self) -> bool {
        match self {
            Backend::KolbusEx(p) => p.disconnect().await,
            Backend::Dummy(p) => p.disconnect().await,
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Backend::KolbusEx(p) => p.is_open(),
            Backend::Dummy(p) => p.is_open(),
        }
    }

    fn list_devices(&self) -> Vec<DeviceInfo> {
        match self {
            Backend::KolbusEx(p) => p.list_devices(),
            Backend::Dummy(p) => p.list_devices(),
        }
    }
}

impl From<ProbeSession> for Backend {
    fn from(session: ProbeSession) -> Self {
        Backend::KolbusEx(session)
    }
}

impl From<DummyProbe> for Backend {
    fn from(probe: DummyProbe) -> Self {
        Backend::Dummy(probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::TypedAccess;
    use crate::transport::{Connector, LinkConfig, LoopbackTarget};

    #[tokio::test]
    async fn test_backend_dispatch() {
        let dummy = Backend::from(DummyProbe::new());
        assert_eq!(dummy.name(), "DummyProbe");
        assert_eq!(dummy.min_access_width(), 1);

        let target = LoopbackTarget::new();
        let session = Backend::from(ProbeSession::new(
            Connector::Loopback(target.clone()),
            LinkConfig::default(),
        ));
        assert_eq!(session.name(), "SKolbusEx");
        assert_eq!(session.min_access_width(), 2);
        assert!(!session.is_open());

        assert!(session.connect(None).await);
        session.write_as(0x100, 0xBEEFu16).await.unwrap();
        assert_eq!(target.peek(0x100, 2), vec![0xEF, 0xBE]);
        assert!(!session.disconnect().await);
    }
}
