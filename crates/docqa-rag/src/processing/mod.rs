//! Request flows and the document registry

mod pipeline;
mod registry;

pub use pipeline::{PipelineComponents, RagPipeline};
pub use registry::DocumentRegistry;
