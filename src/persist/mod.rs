pub mod migrate;
pub mod serializer;
pub mod snapshot;

// Re-export the essential types
pub use migrate::{MigrationInfo, MigrationRegistry};
pub use serializer::{RestoreReport, StateSerializer};
pub use snapshot::{ConfigEnvelope, PersistedSnapshot, MIN_SUPPORTED_VERSION, SCHEMA_VERSION};
