use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

fn default_category() -> String {
    "overlay".to_string()
}

/// Descriptor for one application layer, as consumed verbatim by the state
/// serializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub visible: bool,
    pub opacity: f64,
    /// Stacking position; lower orders render first
    pub order: i32,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub metadata: Value,
}

impl LayerDescriptor {
    pub fn new(id: &str, kind: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            visible: true,
            opacity: 1.0,
            order: 0,
            category: default_category(),
            metadata: Value::Null,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }
}

/// The layer-registry collaborator the serializer reads from
pub trait LayerRegistry: Send + Sync {
    /// All layers, ordered by stacking position
    fn all_layers(&self) -> Vec<LayerDescriptor>;
}

/// A simple in-memory layer registry for hosts and tests
#[derive(Clone, Default)]
pub struct MemoryLayerRegistry {
    layers: Arc<Mutex<Vec<LayerDescriptor>>>,
}

impl MemoryLayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn layers(&self) -> MutexGuard<'_, Vec<LayerDescriptor>> {
        self.layers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds or replaces a layer descriptor by id
    pub fn upsert(&self, descriptor: LayerDescriptor) {
        let mut layers = self.layers();
        match layers.iter().position(|l| l.id == descriptor.id) {
            Some(index) => layers[index] = descriptor,
            None => layers.push(descriptor),
        }
    }

    /// Removes a layer by id; unknown ids are ignored
    pub fn remove(&self, id: &str) {
        self.layers().retain(|l| l.id != id);
    }

    /// Updates a layer's visibility; unknown ids are ignored
    pub fn set_visible(&self, id: &str, visible: bool) {
        if let Some(layer) = self.layers().iter_mut().find(|l| l.id == id) {
            layer.visible = visible;
        }
    }

    pub fn len(&self) -> usize {
        self.layers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers().is_empty()
    }
}

impl LayerRegistry for MemoryLayerRegistry {
    fn all_layers(&self) -> Vec<LayerDescriptor> {
        let mut layers = self.layers().clone();
        layers.sort_by_key(|l| l.order);
        layers
    }
}
