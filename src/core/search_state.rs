//! Per-branch split search state
//!
//! Caches partial row and column sums of one tile together with the valid
//! split bounds for the current `min_nodes`. A child tile that shares the row
//! range (or column range) of its parent starts with the parent's sums, and
//! hands whatever it computed back when its search is done.

use super::enhanced::EnhancedDensityGrid;
use super::tile::Tile;

const UNKNOWN: u64 = u64::MAX;

#[derive(Debug, Clone)]
pub struct SplitSearchState {
    min_nodes: u64,
    /// Sum of each tile row over the tile's columns
    row_sums: Vec<u64>,
    /// Sum of each tile column over the tile's rows
    col_sums: Vec<u64>,
    pub(crate) first_non_zero_x: Option<i32>,
    pub(crate) first_non_zero_y: Option<i32>,
    pub(crate) last_non_zero_x: Option<i32>,
    pub(crate) last_non_zero_y: Option<i32>,
    pub(crate) valid_start_x: Option<i32>,
    pub(crate) valid_start_y: Option<i32>,
    pub(crate) valid_end_x: Option<i32>,
    pub(crate) valid_end_y: Option<i32>,
    num_outside: u64,
}

impl SplitSearchState {
    /// Create the state for `tile`. With a parent, sums over a shared row or
    /// column range are copied and a parent fully inside the polygon makes the
    /// outside count zero without scanning.
    pub fn new(
        grid: &EnhancedDensityGrid,
        tile: &Tile,
        parent: Option<(&Tile, &SplitSearchState)>,
    ) -> Self {
        let mut state = Self {
            min_nodes: 0,
            row_sums: vec![UNKNOWN; tile.height.max(0) as usize],
            col_sums: vec![UNKNOWN; tile.width.max(0) as usize],
            first_non_zero_x: None,
            first_non_zero_y: None,
            last_non_zero_x: None,
            last_non_zero_y: None,
            valid_start_x: None,
            valid_start_y: None,
            valid_end_x: None,
            valid_end_y: None,
            num_outside: 0,
        };

        match parent {
            Some((parent, parent_state)) => {
                if parent.width == tile.width && parent.x == tile.x {
                    let offset = (tile.y - parent.y) as usize;
                    if let Some(src) = parent_state.row_sums.get(offset..offset + state.row_sums.len()) {
                        state.row_sums.copy_from_slice(src);
                        if offset == 0 {
                            state.first_non_zero_y = parent_state.first_non_zero_y;
                        }
                    }
                }
                if parent.height == tile.height && parent.y == tile.y {
                    let offset = (tile.x - parent.x) as usize;
                    if let Some(src) = parent_state.col_sums.get(offset..offset + state.col_sums.len()) {
                        state.col_sums.copy_from_slice(src);
                        if offset == 0 {
                            state.first_non_zero_x = parent_state.first_non_zero_x;
                        }
                    }
                }
                state.num_outside = if parent_state.num_outside == 0 {
                    0
                } else {
                    tile.count_cells_outside(grid)
                };
            }
            None => state.num_outside = tile.count_cells_outside(grid),
        }
        state
    }

    pub fn min_nodes(&self) -> u64 {
        self.min_nodes
    }

    /// Change the threshold, the cached valid bounds depend on it
    pub fn set_min_nodes(&mut self, min_nodes: u64) {
        if self.min_nodes == min_nodes {
            return;
        }
        self.min_nodes = min_nodes;
        self.valid_start_x = None;
        self.valid_start_y = None;
        self.valid_end_x = None;
        self.valid_end_y = None;
    }

    /// Number of tile cells outside the bounding polygon
    pub fn num_outside(&self) -> u64 {
        self.num_outside
    }

    pub(crate) fn col_sum(&mut self, grid: &EnhancedDensityGrid, tile: &Tile, col: i32) -> u64 {
        let slot = &mut self.col_sums[col as usize];
        if *slot == UNKNOWN {
            *slot = tile.col_sum(grid, col);
        }
        *slot
    }

    pub(crate) fn row_sum(&mut self, grid: &EnhancedDensityGrid, tile: &Tile, row: i32) -> u64 {
        let slot = &mut self.row_sums[row as usize];
        if *slot == UNKNOWN {
            *slot = tile.row_sum(grid, row);
        }
        *slot
    }

    /// Copy sums computed for `tile` into the state of `parent` where both
    /// cover the same rows or columns
    pub fn propagate_to_parent(&self, parent_state: &mut SplitSearchState, tile: &Tile, parent: &Tile) {
        if parent.width == tile.width && parent.x == tile.x && parent.height != tile.height {
            let offset = (tile.y - parent.y) as usize;
            if let Some(dest) = parent_state.row_sums.get_mut(offset..offset + self.row_sums.len()) {
                copy_known(&self.row_sums, dest);
            }
        } else if parent.height == tile.height && parent.y == tile.y && parent.width != tile.width {
            let offset = (tile.x - parent.x) as usize;
            if let Some(dest) = parent_state.col_sums.get_mut(offset..offset + self.col_sums.len()) {
                copy_known(&self.col_sums, dest);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn known_col_sums(&self) -> usize {
        self.col_sums.iter().filter(|&&s| s != UNKNOWN).count()
    }
}

fn copy_known(src: &[u64], dest: &mut [u64]) {
    for (d, &s) in dest.iter_mut().zip(src) {
        if s != UNKNOWN {
            *d = s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::DensityGrid;
    use splitter_common::MapArea;
    use std::sync::Arc;

    fn grid() -> EnhancedDensityGrid {
        // 4x2 grid, column sums 1, 2, 3, 4
        let cells = vec![1, 0, 1, 1, 0, 3, 2, 2];
        let grid = DensityGrid::from_cells(MapArea::new(0, 0, 2, 4), 0, cells).unwrap();
        EnhancedDensityGrid::new(Arc::new(grid), None)
    }

    #[test]
    fn test_sums_are_memoized() {
        let grid = grid();
        let tile = Tile::whole(&grid);
        let mut state = SplitSearchState::new(&grid, &tile, None);
        assert_eq!(state.known_col_sums(), 0);
        assert_eq!(state.col_sum(&grid, &tile, 3), 4);
        assert_eq!(state.col_sum(&grid, &tile, 1), 2);
        assert_eq!(state.known_col_sums(), 2);
        assert_eq!(state.row_sum(&grid, &tile, 1), 6);
    }

    #[test]
    fn test_child_inherits_and_propagates() {
        let grid = grid();
        let parent = Tile::whole(&grid);
        let mut parent_state = SplitSearchState::new(&grid, &parent, None);
        parent_state.set_min_nodes(1);
        assert_eq!(parent_state.col_sum(&grid, &parent, 2), 3);

        // right half shares the rows of the parent
        let child = Tile::from_rect(&grid, 2, 0, 2, 2).unwrap();
        let mut child_state = SplitSearchState::new(&grid, &child, Some((&parent, &parent_state)));
        assert_eq!(child_state.known_col_sums(), 1);
        assert_eq!(child_state.col_sum(&grid, &child, 1), 4);

        child_state.propagate_to_parent(&mut parent_state, &child, &parent);
        assert_eq!(parent_state.known_col_sums(), 2);
        assert_eq!(parent_state.col_sum(&grid, &parent, 3), 4);
    }

    #[test]
    fn test_min_nodes_resets_bounds() {
        let grid = grid();
        let tile = Tile::whole(&grid);
        let mut state = SplitSearchState::new(&grid, &tile, None);
        state.set_min_nodes(3);
        assert_eq!(tile.find_valid_start_x(&grid, &mut state), 2);
        state.set_min_nodes(1);
        assert_eq!(state.valid_start_x, None);
        assert_eq!(tile.find_valid_start_x(&grid, &mut state), 1);
    }
}
