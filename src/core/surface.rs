use crate::core::geo::{LngLat, LngLatBounds};
use crate::core::viewport::ViewportState;
use crate::prelude::HashSet;
use crate::{HostError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// A data source registered on the map surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Renderer-specific source definition (tile URLs, GeoJSON, ...)
    #[serde(default)]
    pub spec: Value,
}

impl SourceSpec {
    pub fn new(id: &str, kind: &str, spec: Value) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            spec,
        }
    }
}

/// A style layer registered on the map surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Source this layer draws from, when it needs one
    #[serde(default)]
    pub source: Option<String>,
    /// Renderer-specific paint/layout definition
    #[serde(default)]
    pub spec: Value,
}

impl LayerSpec {
    pub fn new(id: &str, kind: &str, source: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            source: source.map(str::to_string),
            spec: Value::Null,
        }
    }
}

/// The rendering-engine collaborator.
///
/// The runtime never draws; it reads the view, claims the cursor, manages
/// custom sources and layers, and swaps the style document through this
/// trait. Embedders forward the renderer's pointer and key events into
/// [`MapHost`](crate::core::host::MapHost) themselves.
///
/// Swapping the style document destroys every custom source and layer; the
/// basemap transition controller snapshots and re-registers them.
#[async_trait]
pub trait MapSurface: Send + Sync {
    fn center(&self) -> LngLat;
    fn zoom(&self) -> f64;
    fn bearing(&self) -> f64;
    fn pitch(&self) -> f64;
    fn bounds(&self) -> Option<LngLatBounds>;

    /// Moves the view to the given state
    fn fly_to(&self, view: &ViewportState);

    /// Applies the effective pointer cursor
    fn set_cursor(&self, cursor: &str);

    fn add_source(&self, source: SourceSpec) -> Result<()>;
    fn remove_source(&self, id: &str) -> Result<()>;
    fn add_layer(&self, layer: LayerSpec) -> Result<()>;
    fn remove_layer(&self, id: &str) -> Result<()>;
    fn has_source(&self, id: &str) -> bool;
    fn has_layer(&self, id: &str) -> bool;

    fn set_layout_property(&self, layer_id: &str, name: &str, value: Value) -> Result<()>;

    /// Custom sources currently registered, in registration order
    fn custom_sources(&self) -> Vec<SourceSpec>;
    /// Custom layers currently registered, in registration order
    fn custom_layers(&self) -> Vec<LayerSpec>;

    /// Replaces the style document. Destroys custom sources and layers.
    async fn set_style(&self, style_url: &str) -> Result<()>;
    /// Resolves once the pending style document has loaded
    async fn wait_style_loaded(&self) -> Result<()>;
}

struct SurfaceState {
    view: ViewportState,
    cursor: String,
    style_url: Option<String>,
    style_loaded: bool,
    sources: Vec<SourceSpec>,
    layers: Vec<LayerSpec>,
    fail_next_style: bool,
    poisoned_layers: HashSet<String>,
}

/// An in-memory [`MapSurface`] for headless hosts and tests.
///
/// Mirrors the renderer contract faithfully, including the destructive
/// style swap: `set_style` drops every custom source and layer. Failure
/// injection knobs cover the swap and individual layer re-registration.
#[derive(Clone)]
pub struct MemorySurface {
    state: Arc<Mutex<SurfaceState>>,
    style_notify: Arc<Notify>,
}

impl MemorySurface {
    pub fn new(center: LngLat, zoom: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SurfaceState {
                view: ViewportState::new(center, zoom),
                cursor: String::new(),
                style_url: None,
                style_loaded: true,
                sources: Vec::new(),
                layers: Vec::new(),
                fail_next_style: false,
                poisoned_layers: HashSet::default(),
            })),
            style_notify: Arc::new(Notify::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Moves the view without animation
    pub fn set_view(&self, center: LngLat, zoom: f64) {
        let mut state = self.state();
        state.view.center = center;
        state.view.zoom = zoom;
    }

    /// Sets the visible bounding box reported by [`MapSurface::bounds`]
    pub fn set_reported_bounds(&self, bounds: Option<LngLatBounds>) {
        self.state().view.bounds = bounds;
    }

    /// The style document currently applied
    pub fn style_url(&self) -> Option<String> {
        self.state().style_url.clone()
    }

    /// The cursor last applied to the surface
    pub fn cursor(&self) -> String {
        self.state().cursor.clone()
    }

    /// Makes the next `set_style` call fail
    pub fn fail_next_style_swap(&self) {
        self.state().fail_next_style = true;
    }

    /// Makes every future `add_layer` for this id fail
    pub fn poison_layer(&self, id: &str) {
        self.state().poisoned_layers.insert(id.to_string());
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new(LngLat::default(), 0.0)
    }
}

#[async_trait]
impl MapSurface for MemorySurface {
    fn center(&self) -> LngLat {
        self.state().view.center
    }

    fn zoom(&self) -> f64 {
        self.state().view.zoom
    }

    fn bearing(&self) -> f64 {
        self.state().view.bearing
    }

    fn pitch(&self) -> f64 {
        self.state().view.pitch
    }

    fn bounds(&self) -> Option<LngLatBounds> {
        self.state().view.bounds
    }

    fn fly_to(&self, view: &ViewportState) {
        self.state().view = view.clone();
    }

    fn set_cursor(&self, cursor: &str) {
        self.state().cursor = cursor.to_string();
    }

    fn add_source(&self, source: SourceSpec) -> Result<()> {
        let mut state = self.state();
        if state.sources.iter().any(|s| s.id == source.id) {
            return Err(HostError::DuplicateRegistration { id: source.id });
        }
        state.sources.push(source);
        Ok(())
    }

    fn remove_source(&self, id: &str) -> Result<()> {
        self.state().sources.retain(|s| s.id != id);
        Ok(())
    }

    fn add_layer(&self, layer: LayerSpec) -> Result<()> {
        let mut state = self.state();
        if state.poisoned_layers.contains(&layer.id) {
            return Err(HostError::Caught(format!(
                "renderer rejected layer '{}'",
                layer.id
            )));
        }
        if state.layers.iter().any(|l| l.id == layer.id) {
            return Err(HostError::DuplicateRegistration { id: layer.id });
        }
        if let Some(source) = &layer.source {
            if !state.sources.iter().any(|s| &s.id == source) {
                return Err(HostError::InvalidConfig(format!(
                    "layer '{}' references missing source '{}'",
                    layer.id, source
                )));
            }
        }
        state.layers.push(layer);
        Ok(())
    }

    fn remove_layer(&self, id: &str) -> Result<()> {
        self.state().layers.retain(|l| l.id != id);
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.state().sources.iter().any(|s| s.id == id)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.state().layers.iter().any(|l| l.id == id)
    }

    fn set_layout_property(&self, layer_id: &str, name: &str, value: Value) -> Result<()> {
        let mut state = self.state();
        let layer = state
            .layers
            .iter_mut()
            .find(|l| l.id == layer_id)
            .ok_or_else(|| HostError::InvalidConfig(format!("unknown layer '{}'", layer_id)))?;

        if !layer.spec.is_object() {
            layer.spec = Value::Object(serde_json::Map::new());
        }
        let layout = layer
            .spec
            .as_object_mut()
            .and_then(|spec| {
                if !spec.contains_key("layout") {
                    spec.insert("layout".to_string(), Value::Object(serde_json::Map::new()));
                }
                spec.get_mut("layout")
            })
            .and_then(Value::as_object_mut);
        if let Some(layout) = layout {
            layout.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn custom_sources(&self) -> Vec<SourceSpec> {
        self.state().sources.clone()
    }

    fn custom_layers(&self) -> Vec<LayerSpec> {
        self.state().layers.clone()
    }

    async fn set_style(&self, style_url: &str) -> Result<()> {
        {
            let mut state = self.state();
            if state.fail_next_style {
                state.fail_next_style = false;
                return Err(HostError::BasemapSwap(format!(
                    "style '{}' failed to load",
                    style_url
                )));
            }
            // The destructive reload: everything custom is gone.
            state.sources.clear();
            state.layers.clear();
            state.style_url = Some(style_url.to_string());
            state.style_loaded = true;
        }
        self.style_notify.notify_waiters();
        Ok(())
    }

    async fn wait_style_loaded(&self) -> Result<()> {
        loop {
            let notified = self.style_notify.notified();
            if self.state().style_loaded {
                return Ok(());
            }
            notified.await;
        }
    }
}
