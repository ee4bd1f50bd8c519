use std::sync::Arc;

use noteweave_index::IndexEngine;

/// Shared application state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<IndexEngine>,
}

impl AppState {
    pub fn new(engine: Arc<IndexEngine>) -> Self {
        Self { engine }
    }
}
