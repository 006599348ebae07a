pub mod http;

use std::sync::Arc;

use flowwatch_core::config::EngineConfig;
use flowwatch_core::error::Result;
use flowwatch_core::traits::EngineApi;

pub use http::HttpEngine;

/// Create the engine client described by the config.
pub fn create_client(config: &EngineConfig) -> Result<Arc<dyn EngineApi>> {
    Ok(Arc::new(HttpEngine::new(config)?))
}
