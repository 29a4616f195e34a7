//! Geographic gating primitives.
//!
//! Schedule items, overlays, actions, and ads may carry a GeoJSON fence; the
//! resolver drops anything whose fence does not cover the player's current
//! position. Distances are great-circle metres so the geo watcher can decide
//! whether the player moved far enough to warrant a schedule refresh.

use geo::{Contains, Distance, Haversine};
use geo_types::{GeometryCollection, Point};
use geojson::GeoJson;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A player location fix in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl PlayerPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// GPS hardware reports (0, 0) before the first lock; treat it as no fix.
    pub fn is_unknown(&self) -> bool {
        !self.latitude.is_finite()
            || !self.longitude.is_finite()
            || (self.latitude == 0.0 && self.longitude == 0.0)
    }

    /// Great-circle distance to `other` in metres.
    pub fn distance_m(&self, other: &PlayerPosition) -> f64 {
        Haversine.distance(self.point(), other.point())
    }

    fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// A parsed GeoJSON fence guarding a schedule entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFence {
    raw: String,
    geometries: GeometryCollection<f64>,
}

impl GeoFence {
    /// Parse a GeoJSON feature, feature collection, or bare geometry.
    pub fn parse(raw: &str) -> Result<Self> {
        let geojson: GeoJson = raw
            .parse()
            .map_err(|err: geojson::Error| ModelError::InvalidFence(err.to_string()))?;
        let geometries = geojson::quick_collection(&geojson)
            .map_err(|err| ModelError::InvalidFence(err.to_string()))?;
        if geometries.is_empty() {
            return Err(ModelError::InvalidFence("no geometries".to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            geometries,
        })
    }

    /// Whether any fence geometry covers the given fix.
    pub fn contains(&self, fix: &PlayerPosition) -> bool {
        let point = Point::new(fix.longitude, fix.latitude);
        self.geometries.iter().any(|geometry| geometry.contains(&point))
    }

    /// The original GeoJSON text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

// Fences round-trip through their raw GeoJSON text.
impl Serialize for GeoFence {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for GeoFence {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        GeoFence::parse(&raw).map_err(serde::de::Error::custom)
    }
}
