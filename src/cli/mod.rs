//! CLI-specific utilities for tile-splitter
//!
//! Code used only by the command-line interface, separate from the library.

pub mod polygon;
pub mod progress;
pub mod synthetic;

pub use polygon::parse_polygon;
pub use progress::ProgressManager;
pub use synthetic::SyntheticGrid;
