//! Application state for the API server

use crate::{Config, Leecher};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; every field is Arc-backed.
#[derive(Clone)]
pub struct AppState {
    /// The leech service
    pub leecher: Leecher,

    /// Configuration (read access for handlers)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(leecher: Leecher, config: Arc<Config>) -> Self {
        Self { leecher, config }
    }
}
