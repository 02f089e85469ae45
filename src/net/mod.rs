pub mod pipeline;

// Re-export the essential types
pub use pipeline::{
    FetchInit, FetchRequest, RequestParameters, RequestPipeline, RequestTransform, ResourceType,
};
