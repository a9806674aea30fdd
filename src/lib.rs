//! # Tile-splitter
//!
//! Splits a node density grid of OpenStreetMap data into rectangular tiles so
//! that no tile holds more than a given number of nodes, while keeping the
//! number of tiles low and their shapes close to square.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tile_splitter::{DensityGridBuilder, MapArea, Partitioner, SplitConfig};
//!
//! # fn main() -> tile_splitter::Result<()> {
//! let bounds = MapArea::from_degrees(50.0, 4.0, 51.0, 6.0);
//! let mut builder = DensityGridBuilder::new(bounds, 11)?;
//! builder.add_node(bounds.min_lat + 1000, bounds.min_lon + 1000);
//! let grid = builder.build()?;
//!
//! let config = SplitConfig {
//!     max_nodes: 1_000_000,
//!     ..Default::default()
//! };
//! let mut partitioner = Partitioner::new(grid, config)?;
//! for area in partitioner.split()? {
//!     println!("{} {}", area.map_id, area.bounds);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Bounding polygons are `geo::MultiPolygon<f64>` values in map units with
//! x as longitude and y as latitude.

mod core;

pub use crate::core::{
    Axis, DensityGrid, DensityGridBuilder, EnhancedDensityGrid, HeuristicTuning, NamedPolygon,
    Partitioner, RaceConfig, RasterShape, SearchStrategy, Solution, Solver, SolverOutcome,
    SolverParams, SplitArea, SplitConfig, SplitSearchState, Tile,
};
pub use crate::core::candidates::gen_tests;
pub use crate::core::partitioner::MAX_SINGLE_POLYGON_VERTICES;
pub use crate::core::solution::NICE_MAX_ASPECT_RATIO;
pub use crate::core::solver::MAX_SEARCH_LIMIT;
pub use splitter_common::{to_degrees, to_map_unit, Error, MapArea, Result, MAP_UNITS_PER_CIRCLE};
