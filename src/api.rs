//! HTTP API
//!
//! A transport-neutral way to drive conversations, plus a liveness probe.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::registry::SessionRegistry;
use crate::runtime::ProductionDispatcher;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Drives HTTP conversations only. Its registry is never shared with
    /// another transport, so an HTTP caller cannot read or advance a
    /// Telegram chat's form by guessing its id.
    pub dispatcher: Arc<ProductionDispatcher>,
    /// Registries of the other transports, counted by `/health`
    pub other_sessions: Vec<Arc<SessionRegistry>>,
}

impl AppState {
    pub fn new(dispatcher: Arc<ProductionDispatcher>) -> Self {
        Self {
            dispatcher,
            other_sessions: Vec::new(),
        }
    }

    pub fn with_sessions(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.other_sessions.push(registry);
        self
    }

    fn active_sessions(&self) -> usize {
        self.dispatcher.registry().len()
            + self.other_sessions.iter().map(|r| r.len()).sum::<usize>()
    }
}
