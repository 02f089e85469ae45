pub mod builder;
pub mod geo;
pub mod host;
pub mod surface;
pub mod viewport;

// Re-export the essential types
pub use builder::{HostBuilder, HostOptions};
pub use geo::{LngLat, LngLatBounds};
pub use host::MapHost;
pub use surface::{LayerSpec, MapSurface, MemorySurface, SourceSpec};
pub use viewport::ViewportState;
