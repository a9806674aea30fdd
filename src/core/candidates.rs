//! Split position candidates
//!
//! The exhaustive strategy tests every valid position, ordered from the middle
//! outwards. The heuristic strategy only tests a few positions chosen from the
//! ratio between the tile count and `max_nodes`. Both start with the axis that
//! cuts the longer side and switch to the other axis once.

use super::config::HeuristicTuning;
use super::enhanced::EnhancedDensityGrid;
use super::search_state::SplitSearchState;
use super::tile::{Axis, Tile};

/// All positions in `start..=end`, the middle first, then alternating outwards
pub fn gen_tests(start: i32, end: i32) -> Vec<i32> {
    if end < start {
        return Vec::new();
    }
    let mid = (start + end) / 2;
    let to_add = (end - start + 1) as usize;
    let mut list = Vec::with_capacity(to_add);
    list.push(mid);
    for i in 1..(to_add / 2) as i32 {
        list.push(mid + i);
        list.push(mid - i);
    }
    if list.len() < to_add {
        list.push(end);
    }
    if list.len() < to_add {
        list.push(start);
    }
    list
}

/// Settings shared by all generators of one solver
#[derive(Debug, Clone, Copy)]
pub struct CandidateParams {
    pub exhaustive: bool,
    pub max_nodes: u64,
    /// Tiles at least this wide (in cells) count as huge
    pub max_tile_width: i32,
    pub max_tile_height: i32,
    pub tuning: HeuristicTuning,
}

/// Produces split candidates `(axis, position)` for one tile
#[derive(Debug)]
pub struct CandidateGenerator {
    axis: Axis,
    switched: bool,
    todo: Vec<i32>,
    used: usize,
}

impl CandidateGenerator {
    pub fn new(
        params: &CandidateParams,
        grid: &EnhancedDensityGrid,
        tile: &Tile,
        state: &mut SplitSearchState,
    ) -> Self {
        let axis = if tile.aspect_ratio(grid) >= 1.0 {
            Axis::Horizontal
        } else {
            Axis::Vertical
        };
        let todo = generate(params, grid, tile, state, axis);
        Self {
            axis,
            switched: false,
            todo,
            used: 0,
        }
    }

    pub fn next(
        &mut self,
        params: &CandidateParams,
        grid: &EnhancedDensityGrid,
        tile: &Tile,
        state: &mut SplitSearchState,
    ) -> Option<(Axis, i32)> {
        if self.used >= self.todo.len() {
            if self.switched {
                return None;
            }
            self.switched = true;
            self.axis = self.axis.other();
            self.todo = generate(params, grid, tile, state, self.axis);
            self.used = 0;
        }
        let pos = *self.todo.get(self.used)?;
        self.used += 1;
        Some((self.axis, pos))
    }
}

fn generate(
    params: &CandidateParams,
    grid: &EnhancedDensityGrid,
    tile: &Tile,
    state: &mut SplitSearchState,
    axis: Axis,
) -> Vec<i32> {
    let start = tile.find_valid_start(grid, axis, state);
    let end = tile.find_valid_end(grid, axis, state);
    let mid = (start + end) / 2;
    let range = end - start;
    if params.exhaustive || range < 4 {
        return gen_tests(start, end);
    }

    let t = &params.tuning;
    let max_nodes = params.max_nodes;
    let ratio = tile.aspect_ratio(grid);
    let mut tests = Vec::new();
    if ratio < 1.0 / t.extreme_ratio
        || ratio > t.extreme_ratio
        || (ratio < 1.0 / t.axis_ratio && axis == Axis::Horizontal)
        || (ratio > t.axis_ratio && axis == Axis::Vertical)
    {
        return tests;
    }

    let huge = match axis {
        Axis::Horizontal => tile.width >= params.max_tile_width,
        Axis::Vertical => tile.height >= params.max_tile_height,
    };
    let dense_limit = max_nodes.saturating_mul(t.dense_factor);
    if range > t.large_range && huge {
        // just a few fixed fractions
        for i in (2..=5).rev() {
            tests.push(start + range / i);
        }
    } else if tile.count() < dense_limit && range > t.sparse_range {
        // rather few nodes on a large range
        let step = (range / t.sparse_steps).max(1);
        tests.extend((start..=end).step_by(step as usize));
        if tests.last() != Some(&end) {
            tests.push(end);
        }
    } else if tile.count() > dense_limit {
        let step = (range / t.dense_steps).max(1);
        tests.extend((start..=end).step_by(step as usize));
    } else {
        // one of the last splits
        let min_count = if state.num_outside() > 0 {
            tile.count_inside(grid)
        } else {
            tile.count()
        };
        let n_min = min_count.div_ceil(max_nodes.max(1)).max(1);
        let limit = min_count / n_min;
        let d_min = min_count as f64 / max_nodes as f64;
        let around = if (d_min > 1.8 && d_min < 2.0 && ratio > 0.125 && ratio < 8.0)
            || (d_min > 2.8 && d_min < 3.0)
        {
            Some(tile.find_first_higher(grid, axis, state, limit))
        } else if d_min > 3.8 {
            Some(tile.find_first_higher(grid, axis, state, 2 * limit))
        } else {
            None
        };
        if let Some(around) = around {
            // a promising position, test its neighbourhood
            let half = t.around_window / 2;
            let p1 = start.max(around - half);
            let p2 = end.min(around + half);
            let mut near: Vec<i32> = (p1..=p2).collect();
            near.sort_by_key(|&p| (p - around).abs());
            return near;
        }
        if n_min == 4 {
            tests.push(tile.find_first_higher(grid, axis, state, 2 * limit));
        }
        tests.push(tile.find_first_higher(grid, axis, state, limit));
    }

    if tests.len() > 4 {
        tests.sort_by_key(|&p| (p - mid).abs());
        if tests[0] != mid {
            tests.insert(0, mid);
        }
    }
    tests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::DensityGrid;
    use splitter_common::MapArea;
    use std::sync::Arc;

    fn ones(width: i32, height: i32) -> EnhancedDensityGrid {
        let grid = DensityGrid::from_cells(
            MapArea::new(0, 0, height, width),
            0,
            vec![1; (width * height) as usize],
        )
        .unwrap();
        EnhancedDensityGrid::new(Arc::new(grid), None)
    }

    fn drain(
        params: &CandidateParams,
        grid: &EnhancedDensityGrid,
        tile: &Tile,
        state: &mut SplitSearchState,
    ) -> Vec<(Axis, i32)> {
        let mut generator = CandidateGenerator::new(params, grid, tile, state);
        let mut out = Vec::new();
        while let Some(c) = generator.next(params, grid, tile, state) {
            out.push(c);
        }
        out
    }

    #[test]
    fn test_gen_tests_order() {
        assert_eq!(gen_tests(1, 5), vec![3, 4, 2, 5, 1]);
        assert_eq!(gen_tests(1, 4), vec![2, 3, 1, 4]);
        assert_eq!(gen_tests(2, 2), vec![2]);
        assert_eq!(gen_tests(2, 3), vec![2, 3]);
        assert!(gen_tests(3, 2).is_empty());
    }

    #[test]
    fn test_gen_tests_covers_range() {
        for (start, end) in [(0, 9), (1, 10), (5, 6), (3, 40)] {
            let mut list = gen_tests(start, end);
            list.sort_unstable();
            assert_eq!(list, (start..=end).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_exhaustive_switches_axis_once() {
        let grid = ones(6, 4);
        let tile = Tile::whole(&grid);
        let tuning = HeuristicTuning::default();
        let params = CandidateParams {
            exhaustive: true,
            max_nodes: 6,
            max_tile_width: i32::MAX,
            max_tile_height: i32::MAX,
            tuning,
        };
        let mut state = SplitSearchState::new(&grid, &tile, None);
        state.set_min_nodes(4);
        let candidates = drain(&params, &grid, &tile, &mut state);
        // wide tile: x positions 1..=5 first, then y positions 1..=3
        let xs: Vec<i32> = candidates
            .iter()
            .filter(|(a, _)| *a == Axis::Horizontal)
            .map(|&(_, p)| p)
            .collect();
        let ys: Vec<i32> = candidates
            .iter()
            .filter(|(a, _)| *a == Axis::Vertical)
            .map(|&(_, p)| p)
            .collect();
        assert_eq!(candidates[0], (Axis::Horizontal, 3));
        assert_eq!(xs, vec![3, 4, 2, 5, 1]);
        assert_eq!(ys, vec![2, 3, 1]);
    }

    #[test]
    fn test_heuristic_dense_tile_uses_steps() {
        // 100 columns, every column holds 10 nodes
        let grid = ones(100, 10);
        let tile = Tile::whole(&grid);
        let tuning = HeuristicTuning::default();
        let params = CandidateParams {
            exhaustive: false,
            max_nodes: 100,
            max_tile_width: i32::MAX,
            max_tile_height: i32::MAX,
            tuning,
        };
        let mut state = SplitSearchState::new(&grid, &tile, None);
        state.set_min_nodes(10);
        let mut generator = CandidateGenerator::new(&params, &grid, &tile, &mut state);
        let mut xs = Vec::new();
        while let Some((axis, pos)) = generator.next(&params, &grid, &tile, &mut state) {
            if axis == Axis::Vertical {
                break;
            }
            xs.push(pos);
        }
        // valid range 1..=99, step 98 / 7 = 14, sorted around the middle 50
        assert_eq!(xs[0], 50);
        assert!(xs.len() >= 8 && xs.len() <= 9);
        assert!(xs.contains(&1) && xs.contains(&99));
    }

    #[test]
    fn test_heuristic_skips_extreme_tiles() {
        let grid = ones(100, 2);
        let tile = Tile::whole(&grid);
        let tuning = HeuristicTuning::default();
        let params = CandidateParams {
            exhaustive: false,
            max_nodes: 50,
            max_tile_width: i32::MAX,
            max_tile_height: i32::MAX,
            tuning,
        };
        let mut state = SplitSearchState::new(&grid, &tile, None);
        state.set_min_nodes(2);
        // aspect ratio 50 is beyond the extreme ratio, only the tiny vertical
        // range is still listed in full
        assert_eq!(
            drain(&params, &grid, &tile, &mut state),
            vec![(Axis::Vertical, 1)]
        );
    }

    #[test]
    fn test_heuristic_last_split_near_balance_point() {
        // 20 columns of 10 nodes, max 110: two parts needed
        let grid = ones(20, 10);
        let tile = Tile::whole(&grid);
        let tuning = HeuristicTuning::default();
        let params = CandidateParams {
            exhaustive: false,
            max_nodes: 110,
            max_tile_width: i32::MAX,
            max_tile_height: i32::MAX,
            tuning,
        };
        let mut state = SplitSearchState::new(&grid, &tile, None);
        state.set_min_nodes(50);
        let candidates = drain(&params, &grid, &tile, &mut state);
        // d_min = 200 / 110 ~ 1.82, limit 100 is exceeded in column 10
        assert_eq!(candidates[0], (Axis::Horizontal, 10));
        assert!(candidates.iter().any(|&c| c == (Axis::Horizontal, 5)));
    }
}
