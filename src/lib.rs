//! # Maphost
//!
//! A plugin-driven coordination runtime for interactive map applications.
//!
//! The crate provides the host controller that owns a single map surface and
//! coordinates independently registered extensions: plugin lifecycle and
//! private plugin state, exclusive interaction modes, prioritized cursor and
//! hotkey arbitration, a typed event bus, a request transform pipeline, and
//! versioned workspace persistence with forward-compatible migrations. The
//! rendering engine itself is an external collaborator behind the
//! [`MapSurface`](crate::core::surface::MapSurface) trait.

pub mod basemap;
pub mod core;
pub mod errors;
pub mod events;
pub mod input;
pub mod layers;
pub mod net;
pub mod persist;
pub mod plugins;
pub mod sync;

pub mod prelude;

// Re-export public API
pub use crate::core::{
    builder::{HostBuilder, HostOptions},
    geo::{LngLat, LngLatBounds},
    host::MapHost,
    surface::{LayerSpec, MapSurface, MemorySurface, SourceSpec},
    viewport::ViewportState,
};

pub use crate::events::{bus::EventBus, schema::{EventKind, HostEvent}};

pub use crate::input::{
    cursor::{CursorArbiter, CursorGrant},
    keyboard::{HotkeyGrant, KeyCombo, KeyEvent, KeyboardArbiter},
    modes::{InteractionEvent, InteractionKind, InteractionModeStore, ModeOptions},
};

pub use crate::plugins::{
    base::{Plugin, PluginPersistence},
    context::{PluginContext, StateBucket},
    manager::PluginManager,
};

pub use crate::errors::{
    reporter::ErrorReporter,
    ErrorCategory, ErrorRecord, Severity,
};

pub use crate::layers::registry::{LayerDescriptor, LayerRegistry, MemoryLayerRegistry};

pub use crate::net::pipeline::{
    FetchInit, FetchRequest, RequestParameters, RequestPipeline, RequestTransform, ResourceType,
};

pub use crate::persist::{
    migrate::{MigrationInfo, MigrationRegistry},
    serializer::{RestoreReport, StateSerializer},
    snapshot::{ConfigEnvelope, PersistedSnapshot, MIN_SUPPORTED_VERSION, SCHEMA_VERSION},
};

pub use crate::basemap::{BasemapSwapResult, BasemapTransitionController};

pub use crate::sync::{SyncCoordinator, SyncMembership};

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("'{id}' is already registered")]
    DuplicateRegistration { id: String },

    #[error("plugin '{plugin_id}' failed to activate: {source}")]
    ActivationFailure {
        plugin_id: String,
        #[source]
        source: Box<HostError>,
    },

    #[error("plugin '{plugin_id}' failed to deactivate: {source}")]
    DeactivationFailure {
        plugin_id: String,
        #[source]
        source: Box<HostError>,
    },

    #[error("snapshot version {found} is below the minimum supported version {minimum}")]
    SchemaVersionTooOld { found: u32, minimum: u32 },

    #[error("snapshot version {found} is newer than the current schema version {current}")]
    SchemaVersionNewer { found: u32, current: u32 },

    #[error("config type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("basemap swap failed: {0}")]
    BasemapSwap(String),

    #[error("{0}")]
    Caught(String),
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, HostError>;

/// Error type alias for convenience
pub type Error = HostError;
