//! Router module - JSON command dispatch against the active backend.
//!
//! The [`CommandRouter`] turns command envelopes into response envelopes:
//! 1. Decode the envelope
//! 2. Look the command up and check its parameter count
//! 3. Run the handler against the active backend
//! 4. Encode fields or the error into a response
//!
//! Failures never escape [`CommandRouter::execute`]; they become envelopes
//! with a nonzero `status`.
//!
//! # Example
//!
//! ```
//! use memwire::probe::ProbeRegistry;
//! use memwire::router::CommandRouter;
//! use memwire::transport::LinkConfig;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = ProbeRegistry::standard(LinkConfig::default());
//! let router = CommandRouter::new(registry, "DummyProbe").unwrap();
//! let reply = router.execute(json!({"cmd": "list_probes", "id": 1})).await;
//! assert_eq!(reply["status"], 0);
//! assert_eq!(reply["probes"], json!(["SKolbusEx", "DummyProbe"]));
//! # }
//! ```

mod commands;
mod envelope;
mod table;

use std::sync::{Arc, RwLock};

use serde_json::Value;

pub use envelope::{Fields, Request, Response, ENVELOPE_VERSION, MAX_TRANSFER_SIZE};
pub use table::{AsyncHandler, BoxFuture, CommandEntry, CommandTable, Handler, SyncHandler};

use crate::error::{ProbeError, Result};
use crate::probe::{Backend, Probe, ProbeRegistry};

/// Dispatches command envelopes to the active backend.
pub struct CommandRouter {
    registry: ProbeRegistry,
    table: CommandTable,
    active: RwLock<Arc<Backend>>,
}

impl CommandRouter {
    /// Create a router with `initial` as the active backend.
    pub fn new(registry: ProbeRegistry, initial: &str) -> Result<Self> {
        let backend = registry.create(initial)?;
        Ok(Self {
            registry,
            table: commands::standard_table(),
            active: RwLock::new(Arc::new(backend)),
        })
    }

    /// Create a router around an already constructed backend.
    pub fn with_backend(registry: ProbeRegistry, backend: Backend) -> Self {
        Self {
            registry,
            table: commands::standard_table(),
            active: RwLock::new(Arc::new(backend)),
        }
    }

    /// The active backend.
    pub fn backend(&self) -> Arc<Backend> {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    /// Replace the active backend with a fresh instance of `name`.
    ///
    /// An unknown name leaves the active backend in place. The replaced
    /// backend is disconnected once in-flight accesses on it finish.
    pub async fn select(&self, name: &str) -> Result<()> {
        let fresh = Arc::new(self.registry.create(name)?);
        let previous = {
            let mut active = self
                .active
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *active, fresh)
        };
        tracing::info!("Probe {} replaced by {}", previous.name(), name);
        previous.disconnect().await;
        Ok(())
    }

    /// Execute one command envelope.
    pub async fn execute(&self, command: Value) -> Value {
        let id = command.get("id").cloned();
        let response = match self.dispatch(command).await {
            Ok(fields) => Response::success(id, fields),
            Err(e) => Response::failure(id, &e),
        };
        response.into_value()
    }

    /// Execute one command envelope given as JSON text.
    pub async fn execute_text(&self, text: &str) -> String {
        let reply = match serde_json::from_str::<Value>(text) {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                tracing::warn!("Invalid JSON from client: {}", e);
                invalid_json()
            }
        };
        reply.to_string()
    }

    /// Execute one raw line received from a channel.
    ///
    /// Bytes that are not UTF-8 get the same reply as malformed JSON.
    pub async fn execute_line(&self, line: &[u8]) -> String {
        match std::str::from_utf8(line) {
            Ok(text) => self.execute_text(text).await,
            Err(e) => {
                tracing::warn!("Non UTF-8 command from client: {}", e);
                invalid_json().to_string()
            }
        }
    }

    async fn dispatch(&self, command: Value) -> Result<Fields> {
        let request = Request::parse(command)?;
        tracing::info!("Got command {}", request.cmd);

        let entry = self
            .table
            .get(&request.cmd)
            .copied()
            .ok_or_else(|| ProbeError::UnknownCommand(request.cmd.clone()))?;
        if request.param_count() < entry.required {
            return Err(ProbeError::MissingParams {
                command: request.cmd.clone(),
                required: entry.required,
            });
        }

        let outcome = entry.handler.call(self, &request).await;
        if let Err(e) = &outcome {
            tracing::error!("Error executing command '{}': {}", request.cmd, e);
        }
        outcome
    }
}

fn invalid_json() -> Value {
    let error = ProbeError::Protocol("Invalid JSON format".into());
    Response::failure(None, &error).into_value()
}
