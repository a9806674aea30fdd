//! Recursive split search
//!
//! A [`Solver`] looks for a partition of one start tile into tiles holding at
//! most `max_nodes` nodes. It runs a depth first search over split positions
//! and repeats it with a tightened `min_nodes` threshold as long as that
//! yields fewer or better balanced tiles. Two caches speed up the loops:
//! tiles known to have no solution for a given threshold, and the position
//! where the last search was aborted because it hit the search limit.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use log::{debug, log, Level};
use rustc_hash::FxHashMap;
use splitter_common::area::to_map_unit;

use super::candidates::{CandidateGenerator, CandidateParams};
use super::config::HeuristicTuning;
use super::enhanced::EnhancedDensityGrid;
use super::search_state::SplitSearchState;
use super::solution::{Solution, NICE_MAX_ASPECT_RATIO};
use super::tile::Tile;

const MAX_LOOPS: usize = 100;
pub const MAX_SEARCH_LIMIT: usize = 5_000_000;
const VERY_NICE_FILL_RATIO: f64 = 0.94;
/// With a huge max_nodes every tile is accepted whatever its map size
const LARGE_MAX_NODES: u64 = 10_000_000;
const MAX_OUTSIDE_RATIO: f64 = 0.5;
/// Smaller tiles are not worth caching
const MIN_TILE_AREA_BAD_CACHE: i64 = 100;
const MAX_DEPTH_STATS: usize = 10;
const MAX_DEPTH: usize = 4096;
const MAX_LAT_DEGREES: f64 = 85.0;
const MAX_LON_DEGREES: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Test every valid split position
    Exhaustive,
    /// Test a few promising positions only
    Heuristic,
}

impl SearchStrategy {
    pub fn other(self) -> Self {
        match self {
            SearchStrategy::Exhaustive => SearchStrategy::Heuristic,
            SearchStrategy::Heuristic => SearchStrategy::Exhaustive,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SearchStrategy::Exhaustive => "FULL",
            SearchStrategy::Heuristic => "SOME",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverParams {
    pub id: usize,
    pub strategy: SearchStrategy,
    pub max_nodes: u64,
    pub start_tile: Tile,
    /// Wanted number of tiles, 0 for as few as possible
    pub stop_number: usize,
    /// Trim parts to the polygon while splitting
    pub trim_tiles: bool,
    pub search_limit: usize,
    pub allow_empty: bool,
    pub max_aspect_ratio: f64,
    pub tuning: HeuristicTuning,
    /// Log progress at debug level
    pub quiet: bool,
}

/// Final state of a solver run
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    pub name: String,
    pub strategy: SearchStrategy,
    pub start_tile: Tile,
    pub solution: Solution,
    /// A part without nodes was rejected, retrying with `allow_empty` may help
    pub has_empty_part: bool,
    /// Search limit in effect when the solver finished
    pub search_limit: usize,
    pub stopped: bool,
}

pub struct Solver<'g> {
    grid: &'g EnhancedDensityGrid,
    name: String,
    strategy: SearchStrategy,
    search_all: bool,
    max_nodes: u64,
    start_tile: Tile,
    stop_number: usize,
    trim_tiles: bool,
    allow_empty: bool,
    tuning: HeuristicTuning,
    quiet: bool,
    max_tile_width: i32,
    max_tile_height: i32,
    stop: Arc<AtomicBool>,

    start_search_limit: usize,
    search_limit: usize,
    count_bad: usize,
    min_nodes: u64,
    max_aspect_ratio: f64,
    local_opt_min_nodes: u64,
    best_possible: usize,
    has_empty_part: bool,
    best_solution: Solution,
    smallest_solution: Solution,
    /// Tile -> lowest `min_nodes` for which no solution exists
    known_bad: FxHashMap<Tile, u64>,
    /// Tile -> number of candidates already tested when the limit was hit
    incomplete: FxHashMap<Tile, usize>,
    last_good_counts: [i64; MAX_DEPTH_STATS],
    opt_loops: usize,
}

impl<'g> Solver<'g> {
    pub fn new(grid: &'g EnhancedDensityGrid, params: SolverParams) -> Self {
        let shift = grid.grid().shift();
        let max_tile_height = to_map_unit(MAX_LAT_DEGREES) >> shift;
        let max_tile_width = to_map_unit(MAX_LON_DEGREES) >> shift;
        Self {
            grid,
            name: format!("S{} {}", params.id, params.strategy.label()),
            strategy: params.strategy,
            search_all: params.strategy == SearchStrategy::Exhaustive,
            max_nodes: params.max_nodes,
            start_tile: params.start_tile,
            stop_number: params.stop_number,
            trim_tiles: params.trim_tiles,
            allow_empty: params.allow_empty,
            tuning: params.tuning,
            quiet: params.quiet,
            max_tile_width,
            max_tile_height,
            stop: Arc::new(AtomicBool::new(false)),
            start_search_limit: params.search_limit.max(1),
            search_limit: params.search_limit.max(1),
            count_bad: 0,
            min_nodes: 0,
            max_aspect_ratio: params.max_aspect_ratio,
            local_opt_min_nodes: 0,
            best_possible: 0,
            has_empty_part: false,
            best_solution: Solution::new(params.max_nodes),
            smallest_solution: Solution::new(params.max_nodes),
            known_bad: FxHashMap::default(),
            incomplete: FxHashMap::default(),
            last_good_counts: [0; MAX_DEPTH_STATS],
            opt_loops: 0,
        }
    }

    /// Use a shared flag to stop the solver from another thread
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn best_solution(&self) -> &Solution {
        &self.best_solution
    }

    pub fn has_empty_part(&self) -> bool {
        self.has_empty_part
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(AtomicOrdering::Relaxed)
    }

    fn level(&self) -> Level {
        if self.quiet {
            Level::Debug
        } else {
            Level::Info
        }
    }

    /// Run the search and keep the result in the solver
    pub fn solve(&mut self) -> &Solution {
        self.best_possible = if self.stop_number > 0 {
            self.stop_number
        } else {
            self.start_tile.min_parts(self.grid, self.max_nodes)
        };
        log!(
            self.level(),
            "{}: goal is {} tiles, starting with {}",
            self.name,
            self.best_possible,
            self.start_tile
        );
        self.solve_loops();
        if self.smallest_solution.is_smaller_or_better(&self.best_solution) {
            self.best_solution = self.smallest_solution.clone();
        }
        log!(
            self.level(),
            "{}: goal was {} tiles, solver {} with: {}",
            self.name,
            self.best_possible,
            if self.is_stopped() { "was stopped" } else { "finished" },
            self.best_solution
        );
        debug!(
            "{}: {} local optimization loops, candidates tested per depth {:?}",
            self.name, self.opt_loops, self.last_good_counts
        );
        self.known_bad.clear();
        self.incomplete.clear();
        &self.best_solution
    }

    pub fn outcome(&self) -> SolverOutcome {
        SolverOutcome {
            name: self.name.clone(),
            strategy: self.strategy,
            start_tile: self.start_tile,
            solution: self.best_solution.clone(),
            has_empty_part: self.has_empty_part,
            search_limit: self.search_limit,
            stopped: self.is_stopped(),
        }
    }

    pub fn into_outcome(self) -> SolverOutcome {
        let stopped = self.is_stopped();
        SolverOutcome {
            name: self.name,
            strategy: self.strategy,
            start_tile: self.start_tile,
            solution: self.best_solution,
            has_empty_part: self.has_empty_part,
            search_limit: self.search_limit,
            stopped,
        }
    }

    /// Leaves with a known node count must also fit on the map
    fn check_size(&self, tile: &Tile) -> bool {
        tile.height <= self.max_tile_height && tile.width <= self.max_tile_width
    }

    fn candidate_params(&self) -> CandidateParams {
        CandidateParams {
            exhaustive: self.search_all,
            max_nodes: self.max_nodes,
            max_tile_width: self.max_tile_width,
            max_tile_height: self.max_tile_height,
            tuning: self.tuning,
        }
    }

    /// Repeat the search with changing thresholds until no further
    /// improvement is found
    fn solve_loops(&mut self) {
        let grid = self.grid;
        let max_nodes = self.max_nodes;
        self.known_bad.clear();
        self.incomplete.clear();
        self.last_good_counts = [0; MAX_DEPTH_STATS];
        self.best_solution = Solution::new(max_nodes);
        self.smallest_solution = Solution::new(max_nodes);
        self.local_opt_min_nodes = 0;
        self.search_limit = self.start_search_limit;

        let start = self.start_tile;
        let largest_cell = start.largest_cell(grid);
        self.min_nodes = ((0.05 * max_nodes as f64) as u64).min(largest_cell).max(1);
        let very_nice_min_nodes = (VERY_NICE_FILL_RATIO * max_nodes as f64) as u64;
        let mut start_state = SplitSearchState::new(grid, &start, None);
        let mut clear_incomplete = false;

        for num_loops in 1..MAX_LOOPS {
            if self.is_stopped() {
                return;
            }
            if clear_incomplete {
                self.incomplete.clear();
            }
            let save_ratio = self.max_aspect_ratio;
            let save_min_nodes = self.min_nodes;
            self.count_bad = 0;
            start_state.set_min_nodes(self.min_nodes);
            let old_cache_size = self.known_bad.len();
            debug!(
                "{}: step {} searching with min_nodes {}, max aspect ratio {:.1}, search limit {}",
                self.name, num_loops, self.min_nodes, self.max_aspect_ratio, self.search_limit
            );
            let solution = self.find_solution(0, start, &start, &mut start_state);
            if self.is_stopped() {
                return;
            }

            match solution {
                Some(solution) => {
                    if solution.is_smaller_or_better(&self.smallest_solution) {
                        self.smallest_solution = solution.clone();
                    }
                    let mut usable = true;
                    if solution.size() < self.stop_number {
                        // too few tiles, aim at a threshold between the best and this one
                        let best_worst = if self.best_solution.is_empty() {
                            solution.worst_min_nodes()
                        } else {
                            self.best_solution.worst_min_nodes()
                        };
                        self.min_nodes = best_worst / 2 + solution.worst_min_nodes() / 2;
                        if self.min_nodes != save_min_nodes {
                            continue;
                        }
                        usable = false;
                    }
                    if usable {
                        if self.best_solution.cmp_quality(&solution) == Ordering::Greater {
                            let prev_best = std::mem::replace(&mut self.best_solution, solution);
                            log!(
                                self.level(),
                                "{}: step {} found {}",
                                self.name,
                                num_loops,
                                self.best_solution
                            );
                            let best_worst = self.best_solution.worst_min_nodes();
                            let mut factor = 1.10;
                            if !prev_best.is_empty() && prev_best.is_nice() {
                                factor = (best_worst as f64 / prev_best.worst_min_nodes() as f64).min(1.30);
                            }
                            self.min_nodes = (max_nodes / 3).max((best_worst as f64 * factor) as u64);
                            if self.local_opt_min_nodes == 0 {
                                self.min_nodes = best_worst.saturating_add(1);
                                self.local_opt_min_nodes = self.min_nodes;
                            }
                        } else {
                            self.min_nodes = solution.worst_min_nodes().saturating_add(1);
                        }
                    }
                }
                None => {
                    let best_worst = self.best_solution.worst_min_nodes();
                    if !self.best_solution.is_empty() && self.min_nodes > best_worst + 1 {
                        // back off halfway towards the last working threshold
                        self.min_nodes = (best_worst + self.min_nodes) / 2;
                        if (self.min_nodes as f64) < best_worst as f64 * 1.001 {
                            self.min_nodes = best_worst + 1;
                        }
                    } else if !self.search_all
                        && old_cache_size < self.known_bad.len()
                        && self.best_solution.is_empty()
                    {
                        clear_incomplete = false;
                        continue;
                    }
                }
            }

            if !self.best_solution.is_empty() {
                let size = self.best_solution.size();
                if self.stop_number as f64 * 0.95 > size as f64 {
                    return;
                }
                if size == 1 {
                    return;
                }
                if size == self.best_possible && num_loops > 6 {
                    return;
                }
            }
            if self.stop_number == 0 && self.min_nodes > very_nice_min_nodes {
                self.min_nodes = very_nice_min_nodes;
            }
            clear_incomplete = true;
            self.max_aspect_ratio = (self.best_solution.worst_aspect_ratio() / 2.0)
                .max(NICE_MAX_ASPECT_RATIO)
                .min(32.0);

            if save_ratio == self.max_aspect_ratio && save_min_nodes == self.min_nodes {
                if !self.try_again(&mut clear_incomplete) {
                    return;
                }
            }
        }
    }

    /// Nothing changed in the last loop. Adjust the limits for another try if
    /// the best solution is still poor.
    fn try_again(&mut self, clear_incomplete: &mut bool) -> bool {
        let best_worst = self.best_solution.worst_min_nodes();
        if !(self.best_solution.is_empty() || (best_worst as f64) < 0.5 * self.max_nodes as f64) {
            return false;
        }
        if self.count_bad > self.search_limit && self.search_limit < MAX_SEARCH_LIMIT {
            self.search_limit = (self.search_limit * 2).min(MAX_SEARCH_LIMIT);
            self.known_bad.clear();
            *clear_incomplete = false;
            log!(
                self.level(),
                "{}: no good solution found, duplicated search limit to {}",
                self.name,
                self.search_limit
            );
            return true;
        }
        if self.best_solution.is_empty() && self.min_nodes > 1 {
            self.min_nodes = 1;
            self.search_limit = if self.search_all {
                self.start_search_limit
            } else {
                self.start_search_limit.max(MAX_SEARCH_LIMIT)
            };
            log!(
                self.level(),
                "{}: no good solution found, trying to find one accepting anything",
                self.name
            );
            return true;
        }
        let smallest = &self.smallest_solution;
        if !self.best_solution.is_empty()
            && smallest.size() < self.best_solution.size()
            && self.min_nodes != smallest.worst_min_nodes().saturating_add(1)
        {
            self.min_nodes = smallest.worst_min_nodes().saturating_add(1);
            log!(
                self.level(),
                "{}: trying to improve the smallest solution {}",
                self.name,
                smallest
            );
            return true;
        }
        false
    }

    /// Accept `tile` as a leaf, rejecting it when it mostly lies outside the polygon
    fn leaf(&self, depth: usize, tile: Tile, parent_state: &SplitSearchState) -> Option<Solution> {
        if depth > 0
            && parent_state.num_outside() as f64 > MAX_OUTSIDE_RATIO * tile.area() as f64
            && !tile.outside_ratio_is_ok(self.grid, MAX_OUTSIDE_RATIO)
        {
            return None;
        }
        let mut solution = Solution::new(self.max_nodes);
        solution.add(tile, self.grid);
        Some(solution)
    }

    /// Find the best partition of `tile`, a part of `parent`
    fn find_solution(
        &mut self,
        depth: usize,
        tile: Tile,
        parent: &Tile,
        parent_state: &mut SplitSearchState,
    ) -> Option<Solution> {
        if self.is_stopped() || depth > MAX_DEPTH {
            return None;
        }
        let grid = self.grid;
        let max_nodes = self.max_nodes;
        let count = tile.count();

        if count == 0 {
            if !self.allow_empty {
                self.has_empty_part = true;
                return None;
            }
            if tile.area() <= 4 {
                return None;
            }
            return Some(Solution::new(max_nodes));
        }
        let accept = if count > max_nodes && tile.width == 1 && tile.height == 1 {
            // can't split a single cell
            true
        } else if count < self.min_nodes {
            if depth > 0 {
                return None;
            }
            true
        } else if count <= max_nodes {
            if tile.normalized_aspect_ratio(grid) > self.max_aspect_ratio {
                return None;
            }
            self.stop_number > 0 || max_nodes >= LARGE_MAX_NODES || self.check_size(&tile)
        } else {
            if tile.width < 2 && tile.height < 2 {
                return None;
            }
            false
        };
        if accept {
            return self.leaf(depth, tile, parent_state);
        }

        if count < self.min_nodes.saturating_mul(2) {
            return None;
        }
        if !self.trim_tiles
            && (tile.min_parts(grid, max_nodes) as u64).saturating_mul(self.min_nodes) > count
        {
            return None;
        }

        let mut already_done = None;
        if self.count_bad == 0 && !self.incomplete.is_empty() {
            // resume an aborted search where it stopped
            already_done = self.incomplete.remove(&tile);
            if already_done.is_none() {
                self.incomplete.clear();
            }
        }
        let is_cache_candidate = depth > 0 && tile.area() > MIN_TILE_AREA_BAD_CACHE;
        if already_done.is_none() && is_cache_candidate {
            if let Some(&bad_min) = self.known_bad.get(&tile) {
                if bad_min <= self.min_nodes {
                    return None;
                }
            }
        }

        let mut state = SplitSearchState::new(grid, &tile, Some((parent, &*parent_state)));
        state.set_min_nodes(self.min_nodes);
        let params = self.candidate_params();
        let mut generator = CandidateGenerator::new(&params, grid, &tile, &mut state);
        let mut count_done = 0usize;
        let mut best: Option<Solution> = None;

        while let Some((axis, pos)) = generator.next(&params, grid, &tile, &mut state) {
            count_done += 1;
            if already_done.is_some_and(|done| count_done <= done) {
                continue;
            }
            let Some((mut first, mut second)) = tile.split(grid, axis, pos, &mut state) else {
                continue;
            };
            if first.count() > second.count() {
                std::mem::swap(&mut first, &mut second);
            }
            let mut parts = [first, second];
            let mut solutions: [Option<Solution>; 2] = [None, None];
            for i in 0..2 {
                if self.trim_tiles && state.num_outside() > 0 {
                    parts[i] = parts[i].trim(grid);
                }
                if self.incomplete.is_empty() || self.incomplete.contains_key(&parts[i]) {
                    match self.find_solution(depth + 1, parts[i], &tile, &mut state) {
                        Some(solution) => solutions[i] = Some(solution),
                        None => {
                            self.count_bad += 1;
                            break;
                        }
                    }
                }
            }
            let [first_sol, second_sol] = solutions;
            if let (Some(mut solution), Some(other)) = (first_sol, second_sol) {
                solution.merge(other);
                if best
                    .as_ref()
                    .map_or(true, |b| b.cmp_quality(&solution) == Ordering::Greater)
                {
                    best = Some(solution);
                }
                if depth > 0 || count > 2 * max_nodes {
                    break;
                }
            } else if self.count_bad >= self.search_limit {
                if depth < MAX_DEPTH_STATS {
                    self.last_good_counts[depth] = -1;
                }
                self.incomplete.insert(tile, count_done - 1);
                break;
            }
        }

        if depth < MAX_DEPTH_STATS && self.count_bad < self.search_limit {
            self.last_good_counts[depth] = count_done as i64;
        }
        state.propagate_to_parent(parent_state, &tile, parent);

        if best.is_none() && self.count_bad < self.search_limit && is_cache_candidate {
            let entry = self.known_bad.entry(tile).or_insert(u64::MAX);
            if *entry > self.min_nodes {
                *entry = self.min_nodes;
            }
        }

        match best {
            Some(solution)
                if self.local_opt_min_nodes > 0 && (3..=32).contains(&solution.size()) =>
            {
                Some(self.optimize_locally(depth, tile, parent, parent_state, solution))
            }
            other => other,
        }
    }

    /// Try to find a solution with fewer or better filled tiles for a small
    /// part of the start tile
    fn optimize_locally(
        &mut self,
        depth: usize,
        tile: Tile,
        parent: &Tile,
        parent_state: &mut SplitSearchState,
        mut best: Solution,
    ) -> Solution {
        let backup_min_nodes = self.min_nodes;
        let backup_search_all = self.search_all;
        let backup_count_bad = self.count_bad;
        let min_parts = tile.min_parts(self.grid, self.max_nodes);
        while best.size() > min_parts && !self.is_stopped() {
            self.local_opt_min_nodes = (tile.count() / best.size() as u64)
                .max(best.worst_min_nodes().saturating_add(1));
            self.min_nodes = self.local_opt_min_nodes;
            self.search_all = false;
            self.count_bad = 0;
            let candidate = self.find_solution(depth, tile, parent, parent_state);
            self.opt_loops += 1;
            self.min_nodes = backup_min_nodes;
            self.search_all = backup_search_all;
            match candidate {
                Some(candidate) if candidate.is_smaller_or_better(&best) => {
                    debug!(
                        "{}: local optimization improved {} tiles to {} for {}",
                        self.name,
                        best.size(),
                        candidate.size(),
                        tile
                    );
                    best = candidate;
                }
                _ => break,
            }
        }
        self.count_bad = backup_count_bad;
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::DensityGrid;
    use splitter_common::MapArea;

    fn enhanced(width: i32, height: i32, cells: Vec<u32>) -> EnhancedDensityGrid {
        let grid = DensityGrid::from_cells(MapArea::new(0, 0, height, width), 0, cells).unwrap();
        EnhancedDensityGrid::new(Arc::new(grid), None)
    }

    fn params(start_tile: Tile, strategy: SearchStrategy, max_nodes: u64) -> SolverParams {
        SolverParams {
            id: 1,
            strategy,
            max_nodes,
            start_tile,
            stop_number: 0,
            trim_tiles: false,
            search_limit: 200_000,
            allow_empty: false,
            max_aspect_ratio: NICE_MAX_ASPECT_RATIO,
            tuning: HeuristicTuning::default(),
            quiet: true,
        }
    }

    fn assert_partition(grid: &EnhancedDensityGrid, start: &Tile, solution: &Solution) {
        assert_eq!(solution.total_count(), start.count());
        let mut covered = vec![0u8; (grid.width() * grid.height()) as usize];
        for tile in solution.tiles() {
            assert!(tile.verify(grid), "bad count for {tile}");
            for x in tile.x..tile.x + tile.width {
                for y in tile.y..tile.y + tile.height {
                    let slot = &mut covered[(x * grid.height() + y) as usize];
                    assert_eq!(*slot, 0, "cell ({x},{y}) covered twice");
                    *slot = 1;
                }
            }
        }
    }

    #[test]
    fn test_uniform_grid_four_tiles() {
        let grid = enhanced(4, 4, vec![1; 16]);
        let start = Tile::whole(&grid);
        for strategy in [SearchStrategy::Exhaustive, SearchStrategy::Heuristic] {
            let mut solver = Solver::new(&grid, params(start, strategy, 4));
            let solution = solver.solve().clone();
            assert_eq!(solution.size(), 4, "{strategy:?}");
            assert!(solution.tiles().iter().all(|t| t.count() == 4));
            assert!(solution.is_nice());
            assert_partition(&grid, &start, &solution);
        }
    }

    #[test]
    fn test_heavy_single_cell() {
        let mut cells = vec![0; 9];
        cells[4] = 100;
        let grid = enhanced(3, 3, cells);
        let start = Tile::whole(&grid).trim(&grid);
        let mut solver = Solver::new(&grid, params(start, SearchStrategy::Exhaustive, 10));
        let solution = solver.solve();
        assert_eq!(solution.size(), 1);
        assert_eq!(solution.tiles()[0].count(), 100);
        assert!(solution.is_nice());
    }

    #[test]
    fn test_fits_in_one_tile() {
        let grid = enhanced(3, 3, vec![2; 9]);
        let start = Tile::whole(&grid);
        let mut solver = Solver::new(&grid, params(start, SearchStrategy::Heuristic, 100));
        solver.solve();
        let outcome = solver.into_outcome();
        assert_eq!(outcome.solution.size(), 1);
        assert_eq!(outcome.name, "S1 SOME");
        assert!(!outcome.stopped);
    }

    #[test]
    fn test_uneven_density_respects_max() {
        // dense left columns, sparse right columns
        let mut cells = Vec::new();
        for x in 0..12 {
            for _ in 0..6 {
                cells.push(if x < 3 { 9 } else { 1 });
            }
        }
        let grid = enhanced(12, 6, cells);
        let start = Tile::whole(&grid);
        let mut solver = Solver::new(&grid, params(start, SearchStrategy::Exhaustive, 40));
        let solution = solver.solve().clone();
        assert!(!solution.is_empty());
        assert!(solution.tiles().iter().all(|t| t.count() <= 40));
        assert!(solution.size() >= start.min_parts(&grid, 40));
        assert_partition(&grid, &start, &solution);
    }

    #[test]
    fn test_gap_between_clusters() {
        // two populated blocks separated by empty columns
        let mut cells = vec![0; 10 * 4];
        for x in [0, 1, 8, 9] {
            for y in 0..4 {
                cells[x * 4 + y] = 5;
            }
        }
        let grid = enhanced(10, 4, cells);
        let start = Tile::whole(&grid);
        let mut solver = Solver::new(&grid, params(start, SearchStrategy::Exhaustive, 40));
        let solution = solver.solve().clone();
        assert_eq!(solution.total_count(), 80);
        assert!(solution.tiles().iter().all(|t| t.count() <= 40));
    }

    #[test]
    fn test_stop_flag() {
        let grid = enhanced(4, 4, vec![1; 16]);
        let start = Tile::whole(&grid);
        let stop = Arc::new(AtomicBool::new(true));
        let mut solver =
            Solver::new(&grid, params(start, SearchStrategy::Exhaustive, 4)).with_stop_flag(Arc::clone(&stop));
        assert!(solver.solve().is_empty());
        let outcome = solver.outcome();
        assert!(outcome.stopped);
        assert_eq!(outcome.strategy, SearchStrategy::Exhaustive);
    }

    #[test]
    fn test_stop_number_aims_at_target() {
        let grid = enhanced(8, 8, vec![1; 64]);
        let start = Tile::whole(&grid);
        let mut p = params(start, SearchStrategy::Exhaustive, 20);
        p.stop_number = 4;
        let mut solver = Solver::new(&grid, p);
        let solution = solver.solve().clone();
        assert!(solution.size() >= 4);
        assert!(solution.tiles().iter().all(|t| t.count() <= 20));
        assert_partition(&grid, &start, &solution);
    }
}
