//! Top-level split orchestration
//!
//! The [`Partitioner`] turns a [`DensityGrid`] into a list of [`SplitArea`]s.
//! It strips large empty bands, races solvers on every remaining start tile,
//! handles bounding polygons and named polygon sets, and can bisect
//! `max_nodes` to hit a wanted number of tiles.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use geo::{Area, BooleanOps, BoundingRect, Coord, Intersects, MultiPolygon, Polygon, Rect};
use log::{info, log, warn, Level};
use rayon::ThreadPool;
use serde::Serialize;
use splitter_common::{to_map_unit, Error, MapArea, Result, MAP_UNITS_PER_CIRCLE};

use super::config::SplitConfig;
use super::enhanced::EnhancedDensityGrid;
use super::grid::DensityGrid;
use super::polygon::RasterShape;
use super::race::{build_pool, Race};
use super::solution::Solution;
use super::tile::{Axis, Tile};

/// Shapes with more outline vertices are replaced by their bounding rectangle
pub const MAX_SINGLE_POLYGON_VERTICES: usize = 40;
const MAX_EMPTY_BAND_DEGREES: f64 = 30.0;
const MIN_EMPTY_BAND_DEGREES: f64 = 10.0;
/// Below this area (in square map units) a polygon is considered empty
const EMPTY_AREA: f64 = 1e-6;

/// One output rectangle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitArea {
    pub map_id: u32,
    pub bounds: MapArea,
    pub count: u64,
}

/// A bounding polygon with a name used in log messages
#[derive(Debug, Clone)]
pub struct NamedPolygon {
    pub name: String,
    pub polygon: MultiPolygon<f64>,
}

impl NamedPolygon {
    pub fn new(name: impl Into<String>, polygon: MultiPolygon<f64>) -> Self {
        Self {
            name: name.into(),
            polygon,
        }
    }
}

type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

pub struct Partitioner {
    grid: Arc<DensityGrid>,
    config: SplitConfig,
    max_nodes: u64,
    stop_number: usize,
    trim_tiles: bool,
    allow_empty: bool,
    quiet: bool,
    next_map_id: u32,
    solver_ids: Arc<AtomicUsize>,
    pool: Arc<ThreadPool>,
    progress: Option<ProgressFn>,
}

impl Partitioner {
    pub fn new(grid: DensityGrid, config: SplitConfig) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(build_pool(&config)?);
        Ok(Self {
            grid: Arc::new(grid),
            max_nodes: config.max_nodes,
            allow_empty: config.allow_empty,
            next_map_id: config.first_map_id,
            config,
            stop_number: 0,
            trim_tiles: false,
            quiet: false,
            solver_ids: Arc::new(AtomicUsize::new(0)),
            pool,
            progress: None,
        })
    }

    /// Called with `(done, total)` after each start tile is solved
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn grid(&self) -> &DensityGrid {
        &self.grid
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    pub fn max_nodes(&self) -> u64 {
        self.max_nodes
    }

    /// Partitioner for a part of the grid sharing pool, ids and settings
    fn sub_partitioner(&self, grid: DensityGrid) -> Partitioner {
        Partitioner {
            grid: Arc::new(grid),
            config: self.config.clone(),
            max_nodes: self.max_nodes,
            stop_number: self.stop_number,
            trim_tiles: false,
            allow_empty: self.allow_empty,
            quiet: self.quiet,
            next_map_id: self.next_map_id,
            solver_ids: Arc::clone(&self.solver_ids),
            pool: Arc::clone(&self.pool),
            progress: None,
        }
    }

    fn level(&self) -> Level {
        if self.quiet {
            Level::Debug
        } else {
            Level::Info
        }
    }

    fn race<'a>(&'a self, grid: &'a EnhancedDensityGrid) -> Race<'a> {
        Race {
            grid,
            config: &self.config,
            pool: &self.pool,
            next_solver_id: &self.solver_ids,
            max_nodes: self.max_nodes,
            stop_number: self.stop_number,
            trim_tiles: self.trim_tiles,
            allow_empty: self.allow_empty,
            quiet: self.quiet,
        }
    }

    /// Build the lookup tables for a split pass
    fn prepare(&mut self, polygon: Option<&MultiPolygon<f64>>) -> Arc<EnhancedDensityGrid> {
        let enhanced = Arc::new(EnhancedDensityGrid::new(Arc::clone(&self.grid), polygon));
        log!(
            self.level(),
            "Highest node count in a single grid element is {}",
            enhanced.max_cell_count()
        );
        if polygon.is_some() {
            log!(
                self.level(),
                "Highest node count in a single grid element within the bounding polygon is {}",
                enhanced.polygon_max_cell_count()
            );
        }
        self.trim_tiles = polygon.is_some();
        enhanced
    }

    /// Split the whole grid
    pub fn split(&mut self) -> Result<Vec<SplitArea>> {
        let (grid, solution) = self.split_solution()?;
        self.get_areas(&grid, solution, None)
    }

    /// Solve every start tile of the grid. Without a wanted tile count, a
    /// start tile without solution is an error.
    fn split_solution(&mut self) -> Result<(Arc<EnhancedDensityGrid>, Solution)> {
        let grid = self.prepare(None);
        let mut full = Solution::new(self.max_nodes);
        if grid.total_count() == 0 {
            return Ok((grid, full));
        }
        let start = Tile::whole(&grid);
        let start_tiles = if self.config.trim_shape
            || self.grid.bounds().width() >= MAP_UNITS_PER_CIRCLE
        {
            // look for large empty areas like oceans first
            self.check_for_empty_clusters(&grid, 0, start, Axis::Horizontal)?
        } else {
            vec![start]
        };

        let mut count_no_sol;
        loop {
            count_no_sol = 0;
            let mut has_empty_part = false;
            for (done, tile) in start_tiles.iter().enumerate() {
                log!(self.level(), "Solving partition {}", tile.describe(&grid));
                let result = self.solve_start_tile(&grid, *tile)?;
                has_empty_part |= result.1;
                if result.0.is_empty() {
                    count_no_sol += 1;
                    if !self.quiet {
                        warn!("No solution found for partition {}", tile.describe(&grid));
                    }
                } else {
                    full.merge(result.0);
                }
                if let Some(progress) = &self.progress {
                    progress(done + 1, start_tiles.len());
                }
            }
            if !self.retry_with_empty_parts(count_no_sol, has_empty_part) {
                break;
            }
            log!(self.level(), "Retrying the split with empty parts allowed");
            self.allow_empty = true;
            full = Solution::new(self.max_nodes);
        }
        if count_no_sol > 0 && self.stop_number == 0 {
            return Err(Error::split_failed("Failed to find a correct split"));
        }
        if !self.quiet {
            final_split_message(&full);
        }
        Ok((grid, full))
    }

    /// A failed pass is repeated with empty parts allowed when a solver had
    /// to reject a part without nodes
    fn retry_with_empty_parts(&self, count_no_sol: usize, has_empty_part: bool) -> bool {
        count_no_sol > 0 && has_empty_part && !self.allow_empty
    }

    /// Solve one start tile.
    ///
    /// Without shape trimming the solvers still work on the trimmed tile, and
    /// the outer tiles of the result are grown back with `expand_to` so that
    /// the whole start tile is covered. The aspect ratio bound is only checked
    /// on the trimmed tiles, so a grown outer tile can exceed it when the
    /// trimmed margin is wide.
    fn solve_start_tile(&self, grid: &EnhancedDensityGrid, tile: Tile) -> Result<(Solution, bool)> {
        let race = self.race(grid);
        if self.config.trim_shape || self.trim_tiles {
            let result = race.solve_rectangular_area(tile)?;
            return Ok((result.solution, result.has_empty_part));
        }
        let trimmed = tile.trim(grid);
        let result = race.solve_rectangular_area(trimmed)?;
        let mut solution = result.solution;
        if !solution.is_empty() {
            solution.expand_to(tile.x, tile.y, tile.width, tile.height);
        }
        Ok((solution, result.has_empty_part))
    }

    /// Cut large empty bands out of `tile`. Every remaining piece is checked
    /// again along the other axis.
    fn check_for_empty_clusters(
        &self,
        grid: &EnhancedDensityGrid,
        depth: usize,
        tile: Tile,
        axis: Axis,
    ) -> Result<Vec<Tile>> {
        let shift = grid.grid().shift();
        let max_empty = to_map_unit(MAX_EMPTY_BAND_DEGREES) >> shift;
        let min_empty = to_map_unit(MIN_EMPTY_BAND_DEGREES) >> shift;
        let third = self.max_nodes / 3;
        let len = match axis {
            Axis::Horizontal => tile.width,
            Axis::Vertical => tile.height,
        };

        let mut bands = Vec::new();
        let mut first_empty = None;
        let mut count_empty = 0;
        let mut count_last_part = 0u64;
        let mut count_remaining = tile.count();
        for i in 0..len {
            let count = match axis {
                Axis::Horizontal => tile.col_sum(grid, i),
                Axis::Vertical => tile.row_sum(grid, i),
            };
            if count == 0 {
                first_empty.get_or_insert(i);
                count_empty += 1;
                continue;
            }
            if let Some(start) = first_empty {
                if count_empty > max_empty
                    || (count_empty > min_empty && count_last_part > third && count_remaining > third)
                {
                    bands.push((start, start + count_empty));
                    count_last_part = 0;
                }
            }
            count_remaining -= count;
            first_empty = None;
            count_empty = 0;
            count_last_part += count;
        }

        // pieces between the removed bands
        let mut pieces = Vec::new();
        let mut pos = 0;
        for &(start, end) in &bands {
            if start > pos {
                pieces.push((pos, start));
            }
            pos = end;
        }
        if pos < len {
            pieces.push((pos, len));
        }

        if pieces.len() <= 1 {
            if depth == 0 {
                // try also the other axis
                return self.check_for_empty_clusters(grid, depth + 1, tile.trim(grid), axis.other());
            }
            return Ok(vec![tile.trim(grid)]);
        }
        let mut clusters = Vec::new();
        for (start, end) in pieces {
            let part = match axis {
                Axis::Horizontal => Tile::from_rect(grid, tile.x + start, tile.y, end - start, tile.height)?,
                Axis::Vertical => Tile::from_rect(grid, tile.x, tile.y + start, tile.width, end - start)?,
            };
            if part.count() > 0 {
                clusters.extend(self.check_for_empty_clusters(grid, depth + 1, part.trim(grid), axis.other())?);
            }
        }
        Ok(clusters)
    }

    /// Split the part of the grid inside `polygon`
    pub fn split_polygon(&mut self, polygon: &MultiPolygon<f64>) -> Result<Vec<SplitArea>> {
        let singular = polygon.0.len() == 1 && polygon.0[0].interiors().is_empty();
        if singular {
            return self.split_singular_polygon(polygon);
        }
        if !polygon.intersects(&grid_rect(&self.grid)) {
            warn!("Bounding polygon doesn't intersect with the bounding box of the grid");
            return Ok(Vec::new());
        }
        let mut result = Vec::new();
        for part in &polygon.0 {
            let Some(rect) = part.exterior().bounding_rect() else {
                continue;
            };
            let mut shape = Polygon::new(part.exterior().clone(), Vec::new());
            // closed rings repeat the first point
            if part.exterior().0.len() > MAX_SINGLE_POLYGON_VERTICES + 1 {
                warn!("Shape is too complex, using rectangle {:?} instead", rect);
                shape = rect.to_polygon();
            }
            let bounds = MapArea::new(
                rect.min().y.floor() as i32,
                rect.min().x.floor() as i32,
                rect.max().y.ceil() as i32,
                rect.max().x.ceil() as i32,
            );
            let sub_grid = self.grid.subset(&bounds);
            if sub_grid.total_count() == 0 {
                warn!("A part of the bounding polygon would be empty and is ignored: {}", bounds);
                continue;
            }
            let mut sub = self.sub_partitioner(sub_grid);
            let areas = sub.split_singular_polygon(&MultiPolygon::new(vec![shape]))?;
            self.next_map_id = sub.next_map_id;
            result.extend(areas);
        }
        Ok(result)
    }

    fn split_singular_polygon(&mut self, polygon: &MultiPolygon<f64>) -> Result<Vec<SplitArea>> {
        let grid = self.prepare(Some(polygon));
        let Some(shape) = RasterShape::rasterize(&grid) else {
            warn!("Bounding polygon doesn't intersect with the bounding box of the grid");
            return Ok(Vec::new());
        };
        let mut areas = Vec::new();
        for part in shape.components() {
            let solution = self.solve_shape(&grid, 0, &part)?;
            if solution.is_empty() {
                warn!("No solution found for polygon part at cells {:?}", part.bounds());
                continue;
            }
            areas.extend(self.get_areas(&grid, solution, Some(polygon))?);
        }
        Ok(areas)
    }

    /// Solve a rasterised shape. A non-rectangular shape is cut at one of its
    /// vertices, an empty solution means failure.
    fn solve_shape(&self, grid: &EnhancedDensityGrid, depth: usize, shape: &RasterShape) -> Result<Solution> {
        let failed = Solution::new(self.max_nodes);
        let components = shape.components();
        if components.len() > 1 {
            let mut all = Solution::new(self.max_nodes);
            for part in &components {
                let solution = self.solve_shape(grid, depth + 1, part)?;
                if solution.is_empty() {
                    return Ok(failed);
                }
                all.merge(solution);
            }
            return Ok(all);
        }
        if shape.is_rectangular() {
            return self.solve_shape_rect(grid, shape.bounds());
        }
        let vertices = shape.vertices();
        if vertices.len() > MAX_SINGLE_POLYGON_VERTICES {
            warn!(
                "Rastered shape is too complex, using rectangle {:?} instead",
                shape.bounds()
            );
            return self.solve_shape_rect(grid, shape.bounds());
        }

        let (bx, by, bw, bh) = shape.bounds();
        for (cut_x, cut_y) in vertices {
            for axis in [Axis::Horizontal, Axis::Vertical] {
                let (mut r1, mut r2) = match axis {
                    Axis::Horizontal => ((bx, by, cut_x - bx, bh), (cut_x, by, bx + bw - cut_x, bh)),
                    Axis::Vertical => ((bx, by, bw, cut_y - by), (bx, cut_y, bw, by + bh - cut_y)),
                };
                if r1.2 * r1.3 > r2.2 * r2.3 {
                    std::mem::swap(&mut r1, &mut r2);
                }
                if r1.2 <= 0 || r1.3 <= 0 || r2.2 <= 0 || r2.3 <= 0 {
                    continue;
                }
                let (Some(part0), Some(part1)) = (
                    shape.intersect_rect(r1.0, r1.1, r1.2, r1.3),
                    shape.intersect_rect(r2.0, r2.1, r2.2, r2.3),
                ) else {
                    continue;
                };
                let mut solution = self.solve_shape(grid, depth + 1, &part0)?;
                if solution.is_empty() {
                    continue;
                }
                let other = self.solve_shape(grid, depth + 1, &part1)?;
                if other.is_empty() {
                    continue;
                }
                solution.merge(other);
                return Ok(solution);
            }
        }
        Ok(failed)
    }

    fn solve_shape_rect(&self, grid: &EnhancedDensityGrid, rect: (i32, i32, i32, i32)) -> Result<Solution> {
        let (x, y, width, height) = rect;
        let tile = Tile::from_rect(grid, x, y, width, height)?;
        let mut solution = Solution::new(self.max_nodes);
        if tile.count() == 0 {
            // an unpopulated part of the polygon
            if self.allow_empty {
                solution.add(tile, grid);
            }
            return Ok(solution);
        }
        Ok(self.race(grid).solve_rectangular_area(tile)?.solution)
    }

    /// Split a set of named polygons. The region owned by only one polygon and
    /// every region shared by several of them are split separately.
    pub fn split_named(&mut self, polygons: &[NamedPolygon]) -> Result<Vec<SplitArea>> {
        if polygons.is_empty() {
            return self.split();
        }
        struct SharedPart {
            area: MultiPolygon<f64>,
            shared_by: Vec<usize>,
        }
        let bounds = grid_rect(&self.grid);
        let mut result = Vec::new();
        let mut shared: Vec<SharedPart> = Vec::new();

        for (i, named) in polygons.iter().enumerate() {
            let mut distinct = named.polygon.clone();
            let mut was_distinct = true;
            for (j, other) in polygons.iter().enumerate() {
                if j == i {
                    continue;
                }
                let overlap = named.polygon.intersection(&other.polygon);
                if is_empty_area(&overlap) {
                    continue;
                }
                was_distinct = false;
                distinct = distinct.difference(&other.polygon);
                if j > i {
                    shared.push(SharedPart {
                        area: overlap,
                        shared_by: vec![i, j],
                    });
                }
            }
            if !is_empty_area(&distinct) && distinct.intersects(&bounds) {
                if was_distinct {
                    info!("splitting {}", named.name);
                } else {
                    info!("splitting distinct part of {}", named.name);
                }
                result.extend(self.split_polygon(&distinct)?);
            }
        }

        // the list grows while it is processed
        let mut i = 0;
        while i < shared.len() {
            for j in 0..polygons.len() {
                if shared[i].shared_by.contains(&j) {
                    continue;
                }
                let overlap = shared[i].area.intersection(&polygons[j].polygon);
                if !is_empty_area(&overlap) {
                    shared[i].area = shared[i].area.difference(&overlap);
                    let last = shared[i].shared_by.last().copied().unwrap_or(0);
                    if j > last {
                        let mut shared_by = shared[i].shared_by.clone();
                        shared_by.push(j);
                        shared.push(SharedPart {
                            area: overlap,
                            shared_by,
                        });
                    }
                }
                if is_empty_area(&shared[i].area) {
                    break;
                }
            }
            let part = &shared[i];
            if !is_empty_area(&part.area) && part.area.intersects(&bounds) {
                let names: Vec<&str> = part.shared_by.iter().map(|&k| polygons[k].name.as_str()).collect();
                info!(
                    "splitting area shared by exactly {} polygons: {}",
                    part.shared_by.len(),
                    names.join(" and ")
                );
                let area = part.area.clone();
                result.extend(self.split_polygon(&area)?);
            }
            i += 1;
        }
        Ok(result)
    }

    /// Split into about `wanted` tiles by bisecting `max_nodes`
    pub fn split_into(&mut self, wanted: usize) -> Result<Vec<SplitArea>> {
        if wanted == 0 {
            return Err(Error::invalid_config("the wanted number of tiles must be positive"));
        }
        let saved = (self.max_nodes, self.stop_number, self.quiet);
        self.stop_number = wanted;
        let result = self.bisect_max_nodes(wanted);
        (self.max_nodes, self.stop_number, self.quiet) = saved;
        result
    }

    fn bisect_max_nodes(&mut self, wanted: usize) -> Result<Vec<SplitArea>> {
        let total = self.grid.total_count();
        let mut curr = ((total as f64 / (wanted as f64 * 0.95)) as u64).max(1);
        // (max_nodes, tiles) closest to the goal with too few and too many tiles
        let mut best_below: Option<(u64, usize)> = None;
        let mut best_above: Option<(u64, usize)> = None;
        self.quiet = true;
        loop {
            self.max_nodes = curr;
            info!(
                "Trying a max-nodes value of {} to split {} nodes into {} areas",
                curr, total, wanted
            );
            let (grid, solution) = self.split_solution()?;
            if solution.is_empty() || solution.size() == wanted {
                self.quiet = false;
                final_split_message(&solution);
                return self.get_areas(&grid, solution, None);
            }

            let size = solution.size();
            if size > wanted {
                if best_above.map_or(true, |(nodes, tiles)| tiles > size || (tiles == size && curr < nodes)) {
                    best_above = Some((curr, size));
                }
            } else if best_below.map_or(true, |(nodes, tiles)| tiles < size || (tiles == size && curr > nodes)) {
                best_below = Some((curr, size));
            }
            let next = match (best_below, best_above) {
                (Some((below, _)), Some((above, _))) => (below + above) / 2,
                _ => ((curr as f64 * size as f64 / wanted as f64).round() as u64).min(total.saturating_sub(1)),
            }
            .max(1);
            if next == curr {
                warn!("Cannot find a good split with exactly {} areas", wanted);
                self.quiet = false;
                final_split_message(&solution);
                return self.get_areas(&grid, solution, None);
            }
            curr = next;
        }
    }

    /// Turn the tiles of a solution into map areas with ids
    fn get_areas(
        &mut self,
        grid: &EnhancedDensityGrid,
        mut solution: Solution,
        polygon: Option<&MultiPolygon<f64>>,
    ) -> Result<Vec<SplitArea>> {
        if polygon.is_some() {
            log!(self.level(), "Trying to cut the areas so that they fit into the polygon ...");
        } else if self.config.trim_shape {
            solution.trim_outer_tiles(grid);
        }

        let mut fits = true;
        let mut result = Vec::with_capacity(solution.size());
        for tile in solution.tiles() {
            if tile.count() == 0 {
                continue;
            }
            tile.check(grid)?;
            let mut bounds = tile.real_bbox(grid);
            if let Some(polygon) = polygon {
                match clip_to_polygon(&bounds, polygon) {
                    Some(clipped) => bounds = clipped,
                    None => fits = false,
                }
            }
            let map_id = self.next_map_id;
            self.next_map_id += 1;
            let note = if tile.count() > self.max_nodes {
                " but is already at the minimum size so can't be split further"
            } else {
                ""
            };
            log!(
                self.level(),
                "Area {} covers {} and contains {} nodes ({} %){}",
                map_id,
                bounds,
                tile.count(),
                100 * tile.count() / self.max_nodes,
                note
            );
            result.push(SplitArea {
                map_id,
                bounds,
                count: tile.count(),
            });
        }
        if !fits {
            log!(self.level(), "One or more areas do not exactly fit into the bounding polygon");
        }
        Ok(result)
    }
}

fn final_split_message(solution: &Solution) {
    info!("Final solution: {}", solution);
    if solution.is_nice() {
        info!("This seems to be nice.");
    }
}

/// Grid bounds as a geometry, x = longitude
fn grid_rect(grid: &DensityGrid) -> Rect<f64> {
    map_area_rect(&grid.bounds())
}

fn map_area_rect(area: &MapArea) -> Rect<f64> {
    Rect::new(
        Coord {
            x: area.min_lon as f64,
            y: area.min_lat as f64,
        },
        Coord {
            x: area.max_lon as f64,
            y: area.max_lat as f64,
        },
    )
}

fn is_empty_area(area: &MultiPolygon<f64>) -> bool {
    area.unsigned_area() < EMPTY_AREA
}

/// The part of `area` inside `polygon` when that part is a rectangle
fn clip_to_polygon(area: &MapArea, polygon: &MultiPolygon<f64>) -> Option<MapArea> {
    let rect = map_area_rect(area).to_polygon();
    let cut = polygon.intersection(&MultiPolygon::new(vec![rect]));
    if cut.0.len() != 1 || !cut.0[0].interiors().is_empty() {
        return None;
    }
    let bbox = cut.bounding_rect()?;
    let size = cut.unsigned_area();
    let bbox_size = bbox.width() * bbox.height();
    if size < EMPTY_AREA || (bbox_size - size).abs() > 1e-6 * bbox_size.max(1.0) {
        return None;
    }
    Some(MapArea::new(
        bbox.min().y.round() as i32,
        bbox.min().x.round() as i32,
        bbox.max().y.round() as i32,
        bbox.max().x.round() as i32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn config(max_nodes: u64) -> SplitConfig {
        SplitConfig {
            max_nodes,
            solver_stack_mib: 16,
            fan_out_threads: 2,
            ..Default::default()
        }
    }

    fn uniform(width: i32, height: i32, value: u32) -> DensityGrid {
        DensityGrid::from_cells(
            MapArea::new(0, 0, height, width),
            0,
            vec![value; (width * height) as usize],
        )
        .unwrap()
    }

    fn assert_disjoint(areas: &[SplitArea]) {
        for (i, a) in areas.iter().enumerate() {
            for b in &areas[i + 1..] {
                let overlap = a.bounds.min_lat < b.bounds.max_lat
                    && b.bounds.min_lat < a.bounds.max_lat
                    && a.bounds.min_lon < b.bounds.max_lon
                    && b.bounds.min_lon < a.bounds.max_lon;
                assert!(!overlap, "{} overlaps {}", a.bounds, b.bounds);
            }
        }
    }

    #[test]
    fn test_split_uniform_grid() {
        let mut partitioner = Partitioner::new(uniform(4, 4, 1), config(4)).unwrap();
        let areas = partitioner.split().unwrap();
        assert_eq!(areas.len(), 4);
        assert!(areas.iter().all(|a| a.count == 4));
        let ids: Vec<u32> = areas.iter().map(|a| a.map_id).collect();
        assert_eq!(ids, vec![63_240_001, 63_240_002, 63_240_003, 63_240_004]);
        assert_disjoint(&areas);
    }

    #[test]
    fn test_retry_with_empty_parts() {
        let mut partitioner = Partitioner::new(uniform(2, 2, 1), config(4)).unwrap();
        assert!(partitioner.retry_with_empty_parts(1, true));
        assert!(!partitioner.retry_with_empty_parts(0, true));
        assert!(!partitioner.retry_with_empty_parts(2, false));
        partitioner.allow_empty = true;
        assert!(!partitioner.retry_with_empty_parts(1, true));
    }

    #[test]
    fn test_unsolvable_grid_fails() {
        // the middle cell is empty and too small to be a tile of its own
        let grid = DensityGrid::from_cells(MapArea::new(0, 0, 1, 3), 0, vec![4, 0, 4]).unwrap();
        let mut partitioner = Partitioner::new(grid, config(1)).unwrap();
        let err = partitioner.split().unwrap_err();
        assert!(matches!(err, Error::SplitFailed(_)), "got {err}");
        // no part without nodes was rejected, so there was no second pass
        assert!(!partitioner.allow_empty);
    }

    #[test]
    fn test_unsolvable_grid_with_target_count_gives_partial_result() {
        let grid = DensityGrid::from_cells(MapArea::new(0, 0, 1, 3), 0, vec![4, 0, 4]).unwrap();
        let mut partitioner = Partitioner::new(grid, config(1)).unwrap();
        partitioner.stop_number = 2;
        let (_, solution) = partitioner.split_solution().unwrap();
        assert!(solution.is_empty());
    }

    #[test]
    fn test_empty_grid_gives_no_areas() {
        let mut partitioner = Partitioner::new(uniform(5, 5, 0), config(4)).unwrap();
        assert!(partitioner.split().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config() {
        assert!(Partitioner::new(uniform(2, 2, 1), config(0)).is_err());
    }

    #[test]
    fn test_empty_bands_are_removed() {
        // two clusters separated by a wide empty band, cells of 2^16 map units
        let shift = 16;
        let cell = 1 << shift;
        let width = 200;
        let mut cells = vec![0u32; width * 4];
        for x in (0..5).chain(195..200) {
            for y in 0..4 {
                cells[x * 4 + y] = 10;
            }
        }
        let grid = DensityGrid::from_cells(MapArea::new(0, 0, 4 * cell, width as i32 * cell), shift, cells).unwrap();
        let partitioner = Partitioner::new(grid, config(1000)).unwrap();
        let enhanced = EnhancedDensityGrid::new(Arc::clone(&partitioner.grid), None);
        let clusters = partitioner
            .check_for_empty_clusters(&enhanced, 0, Tile::whole(&enhanced), Axis::Horizontal)
            .unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!((clusters[0].x, clusters[0].width), (0, 5));
        assert_eq!((clusters[1].x, clusters[1].width), (195, 5));
        assert!(clusters.iter().all(|t| t.count() == 200));
    }

    #[test]
    fn test_no_trim_covers_whole_grid() {
        let mut cells = vec![0u32; 36];
        for x in 2..4 {
            for y in 2..4 {
                cells[x * 6 + y] = 5;
            }
        }
        let grid = DensityGrid::from_cells(MapArea::new(0, 0, 6, 6), 0, cells).unwrap();
        let mut cfg = config(100);
        cfg.trim_shape = false;
        let mut partitioner = Partitioner::new(grid, cfg).unwrap();
        let areas = partitioner.split().unwrap();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].bounds, MapArea::new(0, 0, 6, 6));
        assert_eq!(areas[0].count, 20);
    }

    #[test]
    fn test_trim_shrinks_outer_tiles() {
        let mut cells = vec![0u32; 36];
        for x in 2..4 {
            for y in 2..4 {
                cells[x * 6 + y] = 5;
            }
        }
        let grid = DensityGrid::from_cells(MapArea::new(0, 0, 6, 6), 0, cells).unwrap();
        let mut partitioner = Partitioner::new(grid, config(100)).unwrap();
        let areas = partitioner.split().unwrap();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].bounds, MapArea::new(2, 2, 4, 4));
    }

    #[test]
    fn test_polygon_outside_grid() {
        let mut partitioner = Partitioner::new(uniform(4, 4, 1), config(4)).unwrap();
        let far: MultiPolygon<f64> = polygon![
            (x: 100.0, y: 100.0),
            (x: 110.0, y: 100.0),
            (x: 110.0, y: 110.0),
            (x: 100.0, y: 110.0),
        ]
        .into();
        assert!(partitioner.split_polygon(&far).unwrap().is_empty());
    }

    #[test]
    fn test_rectangular_polygon() {
        let mut partitioner = Partitioner::new(uniform(8, 8, 1), config(8)).unwrap();
        // left half of the grid
        let half: MultiPolygon<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 8.0),
            (x: 0.0, y: 8.0),
        ]
        .into();
        let areas = partitioner.split_polygon(&half).unwrap();
        assert_eq!(areas.iter().map(|a| a.count).sum::<u64>(), 32);
        assert!(areas.iter().all(|a| a.bounds.max_lon <= 4));
        assert_disjoint(&areas);
    }

    #[test]
    fn test_l_shaped_polygon() {
        let mut partitioner = Partitioner::new(uniform(8, 8, 1), config(16)).unwrap();
        let l_shape: MultiPolygon<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 8.0, y: 0.0),
            (x: 8.0, y: 4.0),
            (x: 4.0, y: 4.0),
            (x: 4.0, y: 8.0),
            (x: 0.0, y: 8.0),
        ]
        .into();
        let areas = partitioner.split_polygon(&l_shape).unwrap();
        assert_eq!(areas.iter().map(|a| a.count).sum::<u64>(), 48);
        assert!(areas.iter().all(|a| a.count <= 16));
        // nothing in the cut out upper right quarter
        assert!(areas
            .iter()
            .all(|a| !(a.bounds.min_lon >= 4 && a.bounds.min_lat >= 4)));
        assert_disjoint(&areas);
    }

    #[test]
    fn test_named_polygons_overlap() {
        let mut partitioner = Partitioner::new(uniform(8, 4, 1), config(8)).unwrap();
        let west: MultiPolygon<f64> = polygon![
            (x: 0.0, y: 0.0), (x: 5.0, y: 0.0), (x: 5.0, y: 4.0), (x: 0.0, y: 4.0),
        ]
        .into();
        let east: MultiPolygon<f64> = polygon![
            (x: 3.0, y: 0.0), (x: 8.0, y: 0.0), (x: 8.0, y: 4.0), (x: 3.0, y: 4.0),
        ]
        .into();
        let areas = partitioner
            .split_named(&[NamedPolygon::new("west", west), NamedPolygon::new("east", east)])
            .unwrap();
        // distinct west, distinct east, shared middle
        assert_eq!(areas.iter().map(|a| a.count).sum::<u64>(), 32);
        assert_disjoint(&areas);
    }

    #[test]
    fn test_split_into_target() {
        let mut partitioner = Partitioner::new(uniform(8, 8, 1), config(1000)).unwrap();
        let areas = partitioner.split_into(4).unwrap();
        assert_eq!(areas.len(), 4);
        assert_eq!(areas.iter().map(|a| a.count).sum::<u64>(), 64);
        assert_eq!(partitioner.max_nodes(), 1000);
        assert!(partitioner.split_into(0).is_err());
    }

    #[test]
    fn test_progress_callback() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut partitioner = Partitioner::new(uniform(4, 4, 1), config(4))
            .unwrap()
            .with_progress(move |done, total| {
                assert!(done <= total);
                seen.fetch_add(1, Ordering::Relaxed);
            });
        partitioner.split().unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_clip_to_polygon() {
        let poly: MultiPolygon<f64> = polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 5.0), (x: 0.0, y: 5.0),
        ]
        .into();
        let clipped = clip_to_polygon(&MapArea::new(0, 0, 8, 8), &poly).unwrap();
        assert_eq!(clipped, MapArea::new(0, 0, 5, 8));
        let triangle: MultiPolygon<f64> = polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 0.0, y: 10.0),
        ]
        .into();
        assert!(clip_to_polygon(&MapArea::new(0, 0, 8, 8), &triangle).is_none());
    }
}
