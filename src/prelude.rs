//! Prelude module for common maphost types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use maphost::prelude::*;`

pub use crate::core::{
    builder::{HostBuilder, HostOptions},
    geo::{LngLat, LngLatBounds},
    host::MapHost,
    surface::{LayerSpec, MapSurface, MemorySurface, SourceSpec},
    viewport::ViewportState,
};

pub use crate::events::{
    bus::{EventBus, Subscription},
    schema::{EventKind, HostEvent},
};

pub use crate::input::{
    cursor::{CursorArbiter, CursorEntry, CursorGrant},
    keyboard::{HotkeyGrant, KeyCombo, KeyEvent, KeyboardArbiter},
    modes::{InteractionEvent, InteractionKind, InteractionModeStore, ModeGrant, ModeOptions},
};

pub use crate::plugins::{
    base::{Plugin, PluginPersistence},
    context::{PluginContext, StateBucket},
    manager::PluginManager,
};

pub use crate::errors::{reporter::ErrorReporter, ErrorCategory, ErrorRecord, Severity};

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

pub use crate::{Error as HostError, Result};

pub use std::{
    sync::Arc,
    time::Duration,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
