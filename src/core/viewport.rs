use crate::core::geo::{LngLat, LngLatBounds};
use crate::core::surface::MapSurface;
use serde::{Deserialize, Serialize};

/// A serializable snapshot of the map view: center, zoom, bearing, pitch and
/// the visible bounding box.
///
/// Bounds may be absent when the surface cannot compute them (e.g. a tilted
/// globe view); consumers must tolerate `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// The center of the map view in geographical coordinates
    pub center: LngLat,
    /// The current zoom level
    pub zoom: f64,
    /// Rotation of the view in degrees clockwise from north
    #[serde(default)]
    pub bearing: f64,
    /// Tilt of the view in degrees away from the screen plane
    #[serde(default)]
    pub pitch: f64,
    /// The visible bounding box, when the surface can provide one
    #[serde(default)]
    pub bounds: Option<LngLatBounds>,
}

impl ViewportState {
    /// Creates a flat, north-up viewport state
    pub fn new(center: LngLat, zoom: f64) -> Self {
        Self {
            center,
            zoom,
            bearing: 0.0,
            pitch: 0.0,
            bounds: None,
        }
    }

    /// Reads the current view directly from a map surface
    pub fn capture(surface: &dyn MapSurface) -> Self {
        Self {
            center: surface.center(),
            zoom: surface.zoom(),
            bearing: surface.bearing(),
            pitch: surface.pitch(),
            bounds: surface.bounds(),
        }
    }
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new(LngLat::default(), 0.0)
    }
}
