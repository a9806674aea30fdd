//! Common utilities for the tile-splitter toolkit

pub mod area;
pub mod error;

pub use area::{to_degrees, to_map_unit, MapArea, MAP_UNITS_PER_CIRCLE};
pub use error::{Error, Result};
