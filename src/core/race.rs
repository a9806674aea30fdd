//! Solver races and parallel fan-out
//!
//! A start tile is either raced by an exhaustive and a heuristic solver on
//! dedicated threads, or, when it is huge, divided into large parts that are
//! solved independently on the fan-out pool. The race is stopped as soon as
//! one finished solver holds a solution that is good enough for long enough.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use log::{log, warn, Level};
use rayon::prelude::*;
use rayon::ThreadPool;
use splitter_common::{Error, Result};

use super::config::SplitConfig;
use super::enhanced::EnhancedDensityGrid;
use super::solution::{Solution, NICE_MAX_ASPECT_RATIO};
use super::solver::{SearchStrategy, Solver, SolverOutcome, SolverParams};
use super::tile::Tile;

const VERY_NICE_FILL_RATIO: f64 = 0.94;
/// Tiles with more nodes are divided before solving
const FAN_OUT_FACTOR: u64 = 256;
const FAN_OUT_PART_FACTOR: u64 = 64;
const EXHAUSTIVE_MAX_AREA: i64 = 32_000;
const EXHAUSTIVE_MAX_FACTOR: u64 = 16;
const EXTRA_OPT_MAX_AREA: i64 = 200_000;
const EXHAUSTIVE_MAX_PARTS: u64 = 300;
const HEURISTIC_MIN_PARTS: u64 = 10;

/// Best solution for one start tile
#[derive(Debug, Clone)]
pub(crate) struct RaceResult {
    pub solution: Solution,
    /// A part without nodes was rejected somewhere
    pub has_empty_part: bool,
}

impl RaceResult {
    fn empty(max_nodes: u64) -> Self {
        Self {
            solution: Solution::new(max_nodes),
            has_empty_part: false,
        }
    }
}

/// Everything the solvers of one split pass share
pub(crate) struct Race<'a> {
    pub grid: &'a EnhancedDensityGrid,
    pub config: &'a SplitConfig,
    pub pool: &'a ThreadPool,
    pub next_solver_id: &'a AtomicUsize,
    pub max_nodes: u64,
    pub stop_number: usize,
    pub trim_tiles: bool,
    pub allow_empty: bool,
    pub quiet: bool,
}

impl Race<'_> {
    fn level(&self) -> Level {
        if self.quiet {
            Level::Debug
        } else {
            Level::Info
        }
    }

    /// Solve one start tile, possibly dividing it first
    pub fn solve_rectangular_area(&self, start: Tile) -> Result<RaceResult> {
        let best_possible = if self.stop_number > 0 {
            self.stop_number
        } else {
            start.min_parts(self.grid, self.max_nodes)
        };
        log!(
            self.level(),
            "Splitting tile {}, goal is to get near {} tiles",
            start,
            best_possible
        );
        self.solve_parallel(start, 0)
    }

    fn solver_params(&self, strategy: SearchStrategy, tile: Tile, stop_number: usize, ratio: f64) -> SolverParams {
        SolverParams {
            id: self.next_solver_id.fetch_add(1, AtomicOrdering::Relaxed) + 1,
            strategy,
            max_nodes: self.max_nodes,
            start_tile: tile,
            stop_number,
            trim_tiles: self.trim_tiles,
            search_limit: self.config.search_limit as usize,
            allow_empty: self.allow_empty,
            max_aspect_ratio: ratio,
            tuning: self.config.heuristic,
            quiet: self.quiet,
        }
    }

    /// Start bound for the aspect ratio: generous for grids that need only a
    /// few tiles, else the ratio of the tile itself
    fn start_ratio(&self, start: &Tile) -> f64 {
        if self.grid.total_count() / self.max_nodes < 4 {
            return 32.0;
        }
        start.normalized_aspect_ratio(self.grid).max(NICE_MAX_ASPECT_RATIO)
    }

    fn solve_parallel(&self, start: Tile, depth: usize) -> Result<RaceResult> {
        let max_nodes = self.max_nodes;
        if depth == 0 && (self.stop_number > 0 || start.count() < max_nodes.saturating_mul(FAN_OUT_FACTOR)) {
            return self.solve_one(start);
        }
        let grid = self.grid;
        let part_size = if depth > 0 {
            start.count().saturating_sub(1).max(1)
        } else {
            max_nodes.saturating_mul(FAN_OUT_PART_FACTOR)
        };
        let todo = start.divide(grid, part_size);
        if depth > 0 && todo.len() < 2 {
            warn!("Cannot divide {} any further, no solution for it", start);
            return Ok(RaceResult::empty(max_nodes));
        }
        log!(self.level(), "Initial simple split returned {} tile(s)", todo.len());

        let ratio = self.start_ratio(&start);
        let mut params = Vec::with_capacity(todo.len());
        for tile in todo {
            if tile.outside_polygon(grid) {
                continue;
            }
            let tile = if self.trim_tiles { tile.trim(grid) } else { tile };
            let area = tile.area();
            let strategy = if area < EXHAUSTIVE_MAX_AREA
                || tile.count() < max_nodes.saturating_mul(EXHAUSTIVE_MAX_FACTOR)
            {
                SearchStrategy::Exhaustive
            } else {
                SearchStrategy::Heuristic
            };
            let p = self.solver_params(strategy, tile, 0, ratio);
            let trim_note = if self.trim_tiles && tile.count_cells_outside(grid) > 0 {
                "trim needed"
            } else {
                "trim not needed"
            };
            log!(
                self.level(),
                "Using S{} on {} grid elements, {}",
                p.id,
                area,
                trim_note
            );
            params.push(p);
        }

        let outcomes = self.run_all(params)?;
        let mut challengers = Vec::new();
        if self.config.enable_extra_opt {
            for outcome in &outcomes {
                let sol = &outcome.solution;
                let goal = outcome.start_tile.min_parts(grid, max_nodes);
                if outcome.start_tile.area() > EXTRA_OPT_MAX_AREA {
                    continue;
                }
                if sol.size() > 1 && (!sol.is_nice() || sol.size() >= goal + 3) {
                    log!(self.level(), "trying to improve poor solution from {}", outcome.name);
                    challengers.push(self.solver_params(
                        outcome.strategy.other(),
                        outcome.start_tile,
                        self.stop_number,
                        ratio,
                    ));
                }
            }
        }
        let challenger_outcomes = self.run_all(challengers)?;

        let mut result = RaceResult::empty(max_nodes);
        let mut unsolved = 0;
        for outcome in outcomes {
            let mut sol = outcome.solution;
            if let Some(challenger) = challenger_outcomes
                .iter()
                .find(|c| c.start_tile == outcome.start_tile)
            {
                if challenger.solution.is_nice() && challenger.solution.is_smaller_or_better(&sol) {
                    log!(
                        self.level(),
                        "{}: replaced solution from {}",
                        challenger.name,
                        outcome.name
                    );
                    sol = challenger.solution.clone();
                }
            }
            result.has_empty_part |= outcome.has_empty_part;
            if sol.is_empty() {
                let retry = self.solve_parallel(outcome.start_tile, depth + 1)?;
                result.has_empty_part |= retry.has_empty_part;
                sol = retry.solution;
            }
            if sol.is_empty() {
                unsolved += 1;
                continue;
            }
            result.solution.merge(sol);
        }
        if unsolved > 0 {
            // never drop the nodes of an unsolved part
            log!(
                self.level(),
                "{} part(s) of {} have no solution, giving up on the tile",
                unsolved,
                start
            );
            return Ok(RaceResult {
                solution: Solution::new(max_nodes),
                has_empty_part: result.has_empty_part,
            });
        }
        Ok(result)
    }

    /// Solve every parameter set on the fan-out pool, results keep the input order
    fn run_all(&self, params: Vec<SolverParams>) -> Result<Vec<SolverOutcome>> {
        if params.is_empty() {
            return Ok(Vec::new());
        }
        let grid = self.grid;
        let results: Vec<thread::Result<SolverOutcome>> = self.pool.install(|| {
            params
                .into_par_iter()
                .map(|p| {
                    panic::catch_unwind(AssertUnwindSafe(|| {
                        let mut solver = Solver::new(grid, p);
                        solver.solve();
                        solver.into_outcome()
                    }))
                })
                .collect()
        });
        results
            .into_iter()
            .map(|r| r.map_err(|payload| Error::SolverCrashed(panic_message(payload))))
            .collect()
    }

    /// Race the two search strategies on one tile
    fn solve_one(&self, start: Tile) -> Result<RaceResult> {
        let max_nodes = self.max_nodes;
        if start.count() == 0 {
            return Ok(RaceResult::empty(max_nodes));
        }
        let ratio = self.start_ratio(&start);
        let mut params = Vec::with_capacity(2);
        for strategy in [SearchStrategy::Heuristic, SearchStrategy::Exhaustive] {
            match strategy {
                // too complex for a full search
                SearchStrategy::Exhaustive if start.count() > max_nodes.saturating_mul(EXHAUSTIVE_MAX_PARTS) => continue,
                // too simple for the heuristic
                SearchStrategy::Heuristic
                    if self.stop_number == 0 && start.count() < max_nodes.saturating_mul(HEURISTIC_MIN_PARTS) =>
                {
                    continue
                }
                _ => {}
            }
            params.push(self.solver_params(strategy, start, self.stop_number, ratio));
        }

        let mut outcomes = self.race(params)?;
        outcomes.sort_by(|a, b| a.solution.race_order(&b.solution));
        let Some(best) = outcomes.into_iter().next() else {
            return Ok(RaceResult::empty(max_nodes));
        };
        if best.solution.is_empty() {
            self.resolution_hint();
        }
        self.finish_message(&best);
        Ok(RaceResult {
            solution: best.solution,
            has_empty_part: best.has_empty_part,
        })
    }

    /// Run the solvers on their own threads until all finished or one of them
    /// is good enough
    fn race(&self, params: Vec<SolverParams>) -> Result<Vec<SolverOutcome>> {
        let race = &self.config.race;
        let stop = Arc::new(AtomicBool::new(false));
        let poll = Duration::from_millis(race.poll_interval_ms);
        let good_fill = race.good_fill_ratio * self.max_nodes as f64;
        let poor_fill = race.poor_fill_ratio * self.max_nodes as f64;
        let grid = self.grid;
        let count = params.len();

        thread::scope(|scope| {
            let (tx, rx) = crossbeam_channel::unbounded();
            for (slot, p) in params.into_iter().enumerate() {
                let tx = tx.clone();
                let solver_stop = Arc::clone(&stop);
                let spawned = thread::Builder::new()
                    .name(format!("solver-{}", p.id))
                    .stack_size(self.config.solver_stack_bytes())
                    .spawn_scoped(scope, move || {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            let mut solver = Solver::new(grid, p).with_stop_flag(solver_stop);
                            solver.solve();
                            solver.into_outcome()
                        }));
                        // the receiver only goes away after a crash
                        let _ = tx.send((slot, result));
                    });
                if let Err(e) = spawned {
                    stop.store(true, AtomicOrdering::Relaxed);
                    return Err(Error::from(e));
                }
            }
            drop(tx);

            let mut finished: Vec<Option<SolverOutcome>> = vec![None; count];
            let mut crash = None;
            let mut first_nice: Option<Instant> = None;
            loop {
                match rx.recv_timeout(poll) {
                    Ok((slot, Ok(outcome))) => finished[slot] = Some(outcome),
                    Ok((_, Err(payload))) => {
                        stop.store(true, AtomicOrdering::Relaxed);
                        crash.get_or_insert_with(|| panic_message(payload));
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                if stop.load(AtomicOrdering::Relaxed) {
                    continue;
                }
                for outcome in finished.iter().flatten() {
                    let sol = &outcome.solution;
                    if !sol.is_nice() {
                        continue;
                    }
                    let waited = first_nice.get_or_insert_with(Instant::now).elapsed().as_secs();
                    let good = sol.worst_min_nodes() as f64 >= good_fill && waited > race.good_fill_wait_secs;
                    let below = sol.tiles().iter().filter(|t| (t.count() as f64) < poor_fill).count();
                    let below_percent = 100.0 * below as f64 / sol.size() as f64;
                    let poor = below_percent > race.poor_fill_max_percent && waited > race.poor_fill_wait_secs;
                    if good || poor {
                        log!(self.level(), "{} is good enough, stopping the other solvers", outcome.name);
                        stop.store(true, AtomicOrdering::Relaxed);
                        break;
                    }
                }
            }

            if let Some(message) = crash {
                return Err(Error::SolverCrashed(message));
            }
            Ok(finished.into_iter().flatten().collect())
        })
    }

    fn resolution_hint(&self) {
        let highest = self.grid.max_cell_count() as u64;
        let ratio = highest as f64 / self.max_nodes as f64;
        if ratio > 4.0 {
            warn!(
                "max-nodes value {} is far below highest node count {} in single grid element, consider using a higher resolution",
                self.max_nodes, highest
            );
        } else if ratio > 1.0 {
            warn!(
                "max-nodes value {} is below highest node count {} in single grid element, consider using a higher resolution",
                self.max_nodes, highest
            );
        } else if ratio < 0.25 {
            warn!(
                "max-nodes value {} is far above highest node count {} in single grid element, consider using a lower resolution",
                self.max_nodes, highest
            );
        }
    }

    fn finish_message(&self, best: &SolverOutcome) {
        let sol = &best.solution;
        if sol.is_empty() {
            return;
        }
        if sol.worst_min_nodes() as f64 > VERY_NICE_FILL_RATIO * self.max_nodes as f64 && sol.is_nice() {
            log!(
                self.level(),
                "Solution is very nice. No need to search for a better solution: {}",
                sol
            );
        } else {
            log!(
                self.level(),
                "Solution is {}nice. Can't find a better solution with search limit {}: {}",
                if sol.is_nice() { "" } else { "not " },
                best.search_limit,
                sol
            );
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "solver panicked".to_string()
    }
}

/// Build the fan-out pool with solver sized stacks
pub(crate) fn build_pool(config: &SplitConfig) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.fan_out_thread_count())
        .stack_size(config.solver_stack_bytes())
        .thread_name(|i| format!("fan-out-{i}"))
        .build()
        .map_err(|e| Error::invalid_config(format!("cannot build fan-out pool: {e}")))
}
