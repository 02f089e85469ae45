pub mod base;
pub mod context;
pub mod manager;

// Re-export the essential types
pub use base::{Plugin, PluginPersistence};
pub use context::{PluginContext, StateBucket};
pub use manager::PluginManager;
