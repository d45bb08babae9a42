//! Probe registry mapping backend names to constructors.
//!
//! Names are kept in registration order; the first entry is the default.
//!
//! # Example
//!
//! ```
//! use memwire::probe::{DummyProbe, ProbeRegistry};
//!
//! let mut registry = ProbeRegistry::new();
//! registry.register(DummyProbe::NAME, || DummyProbe::new().into());
//!
//! assert_eq!(registry.names(), vec!["DummyProbe"]);
//! assert!(registry.create("DummyProbe").is_ok());
//! assert!(registry.create("Nope").is_err());
//! ```

use super::{Backend, DummyProbe, ProbeSession};
use crate::error::{ProbeError, Result};
use crate::transport::{Connector, LinkConfig, LoopbackTarget};

/// Constructor for a backend.
pub type ProbeFactory = Box<dyn Fn() -> Backend + Send + Sync>;

/// Entry for a registered backend.
struct ProbeEntry {
    name: String,
    factory: ProbeFactory,
}

/// Ordered table of selectable backends.
#[derive(Default)]
pub struct ProbeRegistry {
    entries: Vec<ProbeEntry>,
}

impl ProbeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the built-in backends.
    ///
    /// The extended-addressing session opens TCP links configured by
    /// `link`.
    pub fn standard(link: LinkConfig) -> Self {
        let mut registry = Self::new();
        registry.register(ProbeSession::NAME, move || {
            ProbeSession::new(Connector::Tcp, link.clone()).into()
        });
        registry.register(DummyProbe::NAME, || DummyProbe::new().into());
        registry
    }

    /// Register the built-in backends with the extended-addressing session
    /// wired to an emulated target.
    pub fn loopback(target: LoopbackTarget) -> Self {
        let mut registry = Self::new();
        registry.register(ProbeSession::NAME, move || {
            let link = LinkConfig {
                endpoint: "loopback".to_string(),
                ..LinkConfig::default()
            };
            ProbeSession::new(Connector::Loopback(target.clone()), link).into()
        });
        registry.register(DummyProbe::NAME, || DummyProbe::new().into());
        registry
    }

    /// Register a backend constructor. A name registered twice keeps its
    /// position and takes the new constructor.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Backend + Send + Sync + 'static,
    {
        let factory: ProbeFactory = Box::new(factory);
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.factory = factory,
            None => self.entries.push(ProbeEntry {
                name: name.to_string(),
                factory,
            }),
        }
    }

    /// Registered names in order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Name of the first registered backend.
    pub fn default_name(&self) -> Option<&str> {
        self.entries.first().map(|e| e.name.as_str())
    }

    /// Construct a fresh backend by name.
    pub fn create(&self, name: &str) -> Result<Backend> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| (e.factory)())
            .ok_or_else(|| ProbeError::UnknownProbe(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
