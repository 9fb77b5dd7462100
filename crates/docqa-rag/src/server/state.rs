//! Application state for the HTTP server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::processing::RagPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RagPipeline>,
}

impl AppState {
    /// Build the pipeline with production backends
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing document Q&A pipeline...");
        let pipeline = RagPipeline::from_config(config)?;
        tracing::info!(
            "Pipeline ready ({} documents registered)",
            pipeline.registry().len()
        );
        Ok(Self::from_pipeline(Arc::new(pipeline)))
    }

    pub fn from_pipeline(pipeline: Arc<RagPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &RagPipeline {
        &self.pipeline
    }

    pub fn config(&self) -> &RagConfig {
        self.pipeline.config()
    }
}
