//! Map units and rectangular areas
//!
//! Coordinates are integers with 24 bits per full circle, the resolution
//! used by the density grids and all tile boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of map units in 360 degrees
pub const MAP_UNITS_PER_CIRCLE: i64 = 1 << 24;

/// Convert degrees to map units, rounding half a unit away from zero
pub fn to_map_unit(degrees: f64) -> i32 {
    let units = MAP_UNITS_PER_CIRCLE as f64;
    let delta = 360.0 / units / 2.0;
    if degrees > 0.0 {
        ((degrees + delta) * units / 360.0) as i32
    } else {
        ((degrees - delta) * units / 360.0) as i32
    }
}

/// Convert map units to degrees
pub fn to_degrees(map_units: i32) -> f64 {
    map_units as f64 * (360.0 / MAP_UNITS_PER_CIRCLE as f64)
}

/// Axis-aligned bounding box in map units. Max values are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapArea {
    pub min_lat: i32,
    pub min_lon: i32,
    pub max_lat: i32,
    pub max_lon: i32,
}

impl MapArea {
    pub fn new(min_lat: i32, min_lon: i32, max_lat: i32, max_lon: i32) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Build an area from degree values
    pub fn from_degrees(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self::new(
            to_map_unit(min_lat),
            to_map_unit(min_lon),
            to_map_unit(max_lat),
            to_map_unit(max_lon),
        )
    }

    pub fn width(&self) -> i64 {
        self.max_lon as i64 - self.min_lon as i64
    }

    pub fn height(&self) -> i64 {
        self.max_lat as i64 - self.min_lat as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn intersects(&self, other: &MapArea) -> bool {
        self.min_lat < other.max_lat
            && other.min_lat < self.max_lat
            && self.min_lon < other.max_lon
            && other.min_lon < self.max_lon
    }

    pub fn contains(&self, other: &MapArea) -> bool {
        self.min_lat <= other.min_lat
            && self.min_lon <= other.min_lon
            && self.max_lat >= other.max_lat
            && self.max_lon >= other.max_lon
    }
}

impl fmt::Display for MapArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6},{:.6}) to ({:.6},{:.6})",
            to_degrees(self.min_lat),
            to_degrees(self.min_lon),
            to_degrees(self.max_lat),
            to_degrees(self.max_lon)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_unit_round_trip() {
        assert_eq!(to_map_unit(0.0), 0);
        assert_eq!(to_map_unit(180.0), 1 << 23);
        assert_eq!(to_map_unit(-90.0), -(1 << 22));
        let deg = to_degrees(to_map_unit(52.5));
        assert!((deg - 52.5).abs() < 360.0 / MAP_UNITS_PER_CIRCLE as f64);
    }

    #[test]
    fn test_area_geometry() {
        let a = MapArea::new(0, 0, 100, 200);
        assert_eq!(a.width(), 200);
        assert_eq!(a.height(), 100);
        assert!(!a.is_empty());

        let b = MapArea::new(50, 150, 150, 250);
        assert!(a.intersects(&b));
        assert!(!a.contains(&b));
        assert!(a.contains(&MapArea::new(10, 10, 20, 20)));

        // touching edges do not intersect
        let c = MapArea::new(100, 0, 200, 200);
        assert!(!a.intersects(&c));
        assert!(MapArea::new(0, 0, 0, 10).is_empty());
    }
}
