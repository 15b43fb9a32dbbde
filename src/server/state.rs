//! Shared state handed to every handler.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::EngineQueue;

/// Shared by every request handler.
pub struct AppState<H> {
    pub engine: EngineQueue<H>,
    pub config: Arc<ServerConfig>,
}

impl<H> AppState<H> {
    pub fn new(engine: EngineQueue<H>, config: ServerConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }
}

impl<H> Clone for AppState<H> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            config: Arc::clone(&self.config),
        }
    }
}
