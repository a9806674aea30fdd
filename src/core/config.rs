//! Split configuration
//!
//! All knobs of a split run live in [`SplitConfig`]. Defaults match the values
//! that work well for country sized extracts; every field can be overridden
//! from a TOML file or from the command line.

use serde::{Deserialize, Serialize};
use splitter_common::{Error, Result};
use std::path::Path;

/// Top-level configuration of a split run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    /// Maximum number of nodes in one tile
    pub max_nodes: u64,
    /// Number of bad split candidates a solver may test before giving up on a tile
    pub search_limit: u32,
    /// Shrink the outer tiles to the populated extent
    pub trim_shape: bool,
    /// Accept empty sub-regions (needed for polygons with unpopulated gaps)
    pub allow_empty: bool,
    /// Id of the first produced area
    pub first_map_id: u32,
    /// Start a challenger solver for poor fan-out results
    pub enable_extra_opt: bool,
    /// Stack size of solver threads in MiB
    pub solver_stack_mib: usize,
    /// Worker threads for the parallel fan-out, 0 = number of CPUs
    pub fan_out_threads: usize,
    pub race: RaceConfig,
    pub heuristic: HeuristicTuning,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            max_nodes: 1_600_000,
            search_limit: 200_000,
            trim_shape: true,
            allow_empty: false,
            first_map_id: 63_240_001,
            enable_extra_opt: true,
            solver_stack_mib: 256,
            fan_out_threads: 0,
            race: RaceConfig::default(),
            heuristic: HeuristicTuning::default(),
        }
    }
}

/// When to stop racing solvers once one of them has a nice solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RaceConfig {
    pub poll_interval_ms: u64,
    /// Stop when every tile holds at least this share of max_nodes ...
    pub good_fill_ratio: f64,
    /// ... and this many seconds passed since the first nice result
    pub good_fill_wait_secs: u64,
    pub poor_fill_ratio: f64,
    /// Stop when more than this percentage of tiles is below `poor_fill_ratio` ...
    pub poor_fill_max_percent: f64,
    /// ... and this many seconds passed since the first nice result
    pub poor_fill_wait_secs: u64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            good_fill_ratio: 0.85,
            good_fill_wait_secs: 10,
            poor_fill_ratio: 0.75,
            poor_fill_max_percent: 5.0,
            poor_fill_wait_secs: 30,
        }
    }
}

/// Tuned constants of the heuristic split candidate generator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeuristicTuning {
    /// Tiles with an aspect ratio beyond this are not split heuristically
    pub extreme_ratio: f64,
    /// Aspect ratio beyond which only the long axis is split
    pub axis_ratio: f64,
    /// Range above which huge tiles are split at a few fixed fractions
    pub large_range: i32,
    /// Range above which sparse tiles get evenly spread candidates
    pub sparse_range: i32,
    pub sparse_steps: i32,
    pub dense_steps: i32,
    /// Tiles above `dense_factor * max_nodes` count as dense
    pub dense_factor: u64,
    /// Number of candidates tested around a promising position
    pub around_window: i32,
}

impl Default for HeuristicTuning {
    fn default() -> Self {
        Self {
            extreme_ratio: 32.0,
            axis_ratio: 16.0,
            large_range: 1024,
            sparse_range: 256,
            sparse_steps: 20,
            dense_steps: 7,
            dense_factor: 4,
            around_window: 20,
        }
    }
}

impl SplitConfig {
    /// Parse a configuration from TOML text, missing fields use defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SplitConfig =
            toml::from_str(text).map_err(|e| Error::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_nodes == 0 {
            return Err(Error::invalid_config("max_nodes must be positive"));
        }
        if self.search_limit == 0 {
            return Err(Error::invalid_config("search_limit must be positive"));
        }
        if self.solver_stack_mib == 0 {
            return Err(Error::invalid_config("solver_stack_mib must be positive"));
        }
        if self.race.poll_interval_ms == 0 {
            return Err(Error::invalid_config("race.poll_interval_ms must be positive"));
        }
        for (name, value) in [
            ("race.good_fill_ratio", self.race.good_fill_ratio),
            ("race.poor_fill_ratio", self.race.poor_fill_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::invalid_config(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if !(self.race.poor_fill_max_percent > 0.0 && self.race.poor_fill_max_percent <= 100.0) {
            return Err(Error::invalid_config(
                "race.poor_fill_max_percent must be in (0, 100]",
            ));
        }
        let h = &self.heuristic;
        if h.extreme_ratio < 1.0 || h.axis_ratio < 1.0 {
            return Err(Error::invalid_config("heuristic ratios must be at least 1"));
        }
        if h.sparse_steps <= 0 || h.dense_steps <= 0 || h.around_window <= 0 || h.dense_factor == 0
        {
            return Err(Error::invalid_config("heuristic step counts must be positive"));
        }
        Ok(())
    }

    /// Stack size of solver threads in bytes
    pub fn solver_stack_bytes(&self) -> usize {
        self.solver_stack_mib.saturating_mul(1024 * 1024)
    }

    /// Number of fan-out worker threads
    pub fn fan_out_thread_count(&self) -> usize {
        if self.fan_out_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.fan_out_threads
        }
    }
}
