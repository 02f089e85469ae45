use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

const MAX_LATITUDE: f64 = 85.0511287798;

/// Represents a geographical coordinate with longitude and latitude.
///
/// Persisted as a `[lng, lat]` pair, matching the workspace snapshot format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    /// Creates a new LngLat coordinate
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Wraps longitude to [-180, 180] range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = lng % 360.0;
        if wrapped > 180.0 {
            wrapped - 360.0
        } else if wrapped < -180.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }

    /// Clamps latitude to the Web Mercator displayable range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }
}

impl Default for LngLat {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Serialize for LngLat {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [self.lng, self.lat].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LngLat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let pair = <[f64; 2]>::deserialize(deserializer)?;
        Ok(Self::new(pair[0], pair[1]))
    }
}

/// A geographical bounding box.
///
/// Persisted as a `[west, south, east, north]` quadruple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLatBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl LngLatBounds {
    /// Creates bounds from the four edges
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Creates bounds spanning two corner coordinates
    pub fn from_corners(sw: LngLat, ne: LngLat) -> Self {
        Self::new(sw.lng, sw.lat, ne.lng, ne.lat)
    }

    /// Checks whether the given coordinate lies within the bounds
    pub fn contains(&self, point: &LngLat) -> bool {
        point.lng >= self.west
            && point.lng <= self.east
            && point.lat >= self.south
            && point.lat <= self.north
    }

    /// Returns the center of the bounds
    pub fn center(&self) -> LngLat {
        LngLat::new(
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }
}

impl Serialize for LngLatBounds {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [self.west, self.south, self.east, self.north].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LngLatBounds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let edges = <[f64; 4]>::deserialize(deserializer)?;
        if edges[0] > edges[2] || edges[1] > edges[3] {
            return Err(de::Error::custom("bounds edges out of order"));
        }
        Ok(Self::new(edges[0], edges[1], edges[2], edges[3]))
    }
}
