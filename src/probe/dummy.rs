//! Simulated probe backed by sparse memory.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use super::{DeviceInfo, Probe};
use crate::access::MemoryAccess;
use crate::error::Result;

/// Byte-addressable simulated target.
///
/// Unwritten bytes read as zero. Clones share memory, so a test can keep a
/// handle to a probe that has been moved into a router.
#[derive(Clone, Default)]
pub struct DummyProbe {
    memory: Arc<Mutex<BTreeMap<u32, u8>>>,
    open: Arc<AtomicBool>,
}

impl DummyProbe {
    /// Registry name.
    pub const NAME: &'static str = "DummyProbe";

    pub fn new() -> Self {
        Self::default()
    }

    fn memory(&self) -> MutexGuard<'_, BTreeMap<u32, u8>> {
        self.memory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MemoryAccess for DummyProbe {
    async fn read(&self, address: u32, byte_count: usize) -> Result<Bytes> {
        let memory = self.memory();
        let bytes: Vec<u8> = (0..byte_count)
            .map(|i| {
                let at = address.wrapping_add(i as u32);
                memory.get(&at).copied().unwrap_or(0)
            })
            .collect();
        Ok(Bytes::from(bytes))
    }

    async fn write(&self, address: u32, data: &[u8]) -> Result<()> {
        let mut memory = self.memory();
        for (i, byte) in data.iter().enumerate() {
            memory.insert(address.wrapping_add(i as u32), *byte);
        }
        Ok(())
    }
}

impl Probe for DummyProbe {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn connect(&self, _uri: Option<&str>) -> bool {
        self.open.store(true, Ordering::SeqCst);
        true
    }

    async fn disconnect(&self) -> bool {
        self.open.store(false, Ordering::SeqCst);
        false
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn list_devices(&self) -> Vec<DeviceInfo> {
        vec![DeviceInfo {
            id: "dummy".to_string(),
            description: "Simulated target memory".to_string(),
        }]
    }
}
