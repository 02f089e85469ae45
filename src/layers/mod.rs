pub mod registry;

// Re-export the essential types
pub use registry::{LayerDescriptor, LayerRegistry, MemoryLayerRegistry};
