//! Host builder for fluent API configuration

use crate::core::host::MapHost;
use crate::core::surface::MapSurface;
use crate::layers::registry::{LayerRegistry, MemoryLayerRegistry};
use crate::{HostError, Result};
use std::sync::Arc;

/// Host-level tuning knobs
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Maximum number of records the error reporter retains
    pub error_history_cap: usize,
    /// Whether key events are dispatched at all
    pub keyboard_enabled: bool,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            error_history_cap: 100,
            keyboard_enabled: true,
        }
    }
}

/// Builder for creating and configuring [`MapHost`] instances
pub struct HostBuilder {
    surface: Option<Arc<dyn MapSurface>>,
    layers: Option<Arc<dyn LayerRegistry>>,
    options: HostOptions,
}

impl HostBuilder {
    /// Create a new HostBuilder with default settings
    pub fn new() -> Self {
        Self {
            surface: None,
            layers: None,
            options: HostOptions::default(),
        }
    }

    /// Set the map surface the host controls
    pub fn with_surface(mut self, surface: Arc<dyn MapSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Set the layer registry collaborator
    pub fn with_layer_registry(mut self, layers: Arc<dyn LayerRegistry>) -> Self {
        self.layers = Some(layers);
        self
    }

    /// Set all host options at once
    pub fn with_options(mut self, options: HostOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the error-history capacity
    pub fn with_error_history(mut self, cap: usize) -> Self {
        self.options.error_history_cap = cap;
        self
    }

    /// Enable or disable keyboard dispatch
    pub fn with_keyboard(mut self, enabled: bool) -> Self {
        self.options.keyboard_enabled = enabled;
        self
    }

    /// Build the host. A surface is required; the layer registry defaults
    /// to an empty in-memory one.
    pub fn build(self) -> Result<MapHost> {
        let surface = self
            .surface
            .ok_or_else(|| HostError::InvalidConfig("host requires a map surface".to_string()))?;
        let layers = self
            .layers
            .unwrap_or_else(|| Arc::new(MemoryLayerRegistry::new()));
        Ok(MapHost::with_options(surface, layers, self.options))
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}
