//! Shared handler state.

use std::sync::Arc;

use cronsentry_core::{JobService, PingHandler};
use cronsentry_protocols::JobStore;

pub struct AppState {
    pub jobs: JobService,
    pub ping: PingHandler,
    /// Used by the health probe only.
    pub store: Arc<dyn JobStore>,
    /// Owner assumed when a request carries no identity header.
    pub default_owner: Option<String>,
}

impl AppState {
    pub fn new(jobs: JobService, ping: PingHandler, store: Arc<dyn JobStore>) -> Self {
        Self {
            jobs,
            ping,
            store,
            default_owner: None,
        }
    }

    pub fn with_default_owner(mut self, owner: impl Into<String>) -> Self {
        self.default_owner = Some(owner.into());
        self
    }
}
