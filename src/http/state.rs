//! Application state for the HTTP server.

use crate::scheduler::SchedulerEngine;
use std::sync::Arc;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The scheduling engine owning the projector pool
    pub engine: Arc<SchedulerEngine>,
}

impl AppState {
    /// Create a new application state with the given engine.
    pub fn new(engine: Arc<SchedulerEngine>) -> Self {
        Self { engine }
    }
}
