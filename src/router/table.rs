//! Command table for dispatching envelopes by name.
//!
//! Each entry holds the handler, the minimum parameter count (excluding
//! `cmd` and `id`), and whether the handler runs inline or awaits I/O.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use super::envelope::{Fields, Request};
use super::CommandRouter;
use crate::error::Result;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Handler that completes without awaiting.
pub type SyncHandler = fn(&CommandRouter, &Request) -> Result<Fields>;

/// Handler that awaits backend I/O.
pub type AsyncHandler = for<'a> fn(&'a CommandRouter, &'a Request) -> BoxFuture<'a, Result<Fields>>;

/// A command implementation.
#[derive(Clone, Copy)]
pub enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

impl Handler {
    pub fn is_async(&self) -> bool {
        matches!(self, Handler::Async(_))
    }

    /// Run the handler.
    pub async fn call(&self, router: &CommandRouter, request: &Request) -> Result<Fields> {
        match self {
            Handler::Sync(f) => f(router, request),
            Handler::Async(f) => f(router, request).await,
        }
    }
}

/// Entry for a registered command.
#[derive(Clone, Copy)]
pub struct CommandEntry {
    pub handler: Handler,
    /// Minimum parameter count.
    pub required: usize,
}

/// Table mapping command names to handlers.
#[derive(Clone, Default)]
pub struct CommandTable {
    commands: HashMap<&'static str, CommandEntry>,
}

impl CommandTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command.
    pub fn register(&mut self, name: &'static str, required: usize, handler: Handler) {
        self.commands.insert(name, CommandEntry { handler, required });
    }

    /// Look up a command by name.
    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(name)
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &CommandRouter, _: &Request) -> Result<Fields> {
        Ok(Fields::new())
    }

    fn noop_async<'a>(_: &'a CommandRouter, _: &'a Request) -> BoxFuture<'a, Result<Fields>> {
        Box::pin(async { Ok(Fields::new()) })
    }

    #[test]
    fn test_register_and_lookup() {
        let mut table = CommandTable::new();
        assert!(table.is_empty());

        table.register("ping", 0, Handler::Sync(noop));
        table.register("fetch", 2, Handler::Async(noop_async));

        assert_eq!(table.len(), 2);
        assert_eq!(table.names(), vec!["fetch", "ping"]);
        assert_eq!(table.get("fetch").map(|e| e.required), Some(2));
        assert!(table.get("fetch").unwrap().handler.is_async());
        assert!(!table.get("ping").unwrap().handler.is_async());
        assert!(table.get("nope").is_none());
    }
}
