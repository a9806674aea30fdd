//! Core library modules for tile-splitter
//!
//! Grid storage and lookup tables, the tile search and the split drivers.

pub mod candidates;
pub mod config;
pub mod enhanced;
pub mod grid;
pub mod partitioner;
pub mod polygon;
pub mod race;
pub mod search_state;
pub mod solution;
pub mod solver;
pub mod tile;

// Re-export main types for internal use
pub use config::{HeuristicTuning, RaceConfig, SplitConfig};
pub use enhanced::EnhancedDensityGrid;
pub use grid::{DensityGrid, DensityGridBuilder};
pub use partitioner::{NamedPolygon, Partitioner, SplitArea};
pub use polygon::RasterShape;
pub use search_state::SplitSearchState;
pub use solution::Solution;
pub use solver::{SearchStrategy, Solver, SolverOutcome, SolverParams};
pub use tile::{Axis, Tile};
