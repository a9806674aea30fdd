//! Integration tests for tile-splitter splits
//!
//! These tests drive the public library API on small hand made and seeded
//! random grids and check the properties every split must have.

use geo::{polygon, MultiPolygon};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tile_splitter::{
    DensityGrid, EnhancedDensityGrid, Error, MapArea, Partitioner, SplitArea, SplitConfig,
    SplitSearchState, Tile,
};
use std::sync::Arc;

fn config(max_nodes: u64) -> SplitConfig {
    SplitConfig {
        max_nodes,
        solver_stack_mib: 32,
        fan_out_threads: 2,
        ..Default::default()
    }
}

fn grid_from(width: i32, height: i32, cells: Vec<u32>) -> DensityGrid {
    DensityGrid::from_cells(MapArea::new(0, 0, height, width), 0, cells).unwrap()
}

/// Clustered random grid, column-major
fn random_grid(width: i32, height: i32, seed: u64) -> DensityGrid {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cells = vec![0u32; (width * height) as usize];
    for _ in 0..4 {
        let cx = rng.gen_range(0..width);
        let cy = rng.gen_range(0..height);
        for _ in 0..2_000 {
            let x = (cx + rng.gen_range(-6..=6)).clamp(0, width - 1);
            let y = (cy + rng.gen_range(-6..=6)).clamp(0, height - 1);
            cells[(x * height + y) as usize] += rng.gen_range(1..20);
        }
    }
    grid_from(width, height, cells)
}

fn overlaps(a: &MapArea, b: &MapArea) -> bool {
    a.min_lat < b.max_lat && b.min_lat < a.max_lat && a.min_lon < b.max_lon && b.min_lon < a.max_lon
}

fn assert_disjoint(areas: &[SplitArea]) {
    for (i, a) in areas.iter().enumerate() {
        for b in &areas[i + 1..] {
            assert!(!overlaps(&a.bounds, &b.bounds), "{} overlaps {}", a.bounds, b.bounds);
        }
    }
}

fn covered_area(areas: &[SplitArea]) -> i64 {
    areas.iter().map(|a| a.bounds.width() * a.bounds.height()).sum()
}

#[test]
fn test_uniform_grid_gives_four_quadrants() {
    let grid = grid_from(4, 4, vec![1; 16]);
    let mut partitioner = Partitioner::new(grid, config(4)).unwrap();
    let areas = partitioner.split().unwrap();
    assert_eq!(areas.len(), 4);
    for area in &areas {
        assert_eq!(area.count, 4);
        assert_eq!(area.bounds.width() * area.bounds.height(), 4);
    }
    assert_disjoint(&areas);
    assert_eq!(covered_area(&areas), 16);
}

#[test]
fn test_heavy_cell_is_the_only_violation() {
    let mut cells = vec![0u32; 16];
    cells[2 * 4 + 1] = 100;
    let mut partitioner = Partitioner::new(grid_from(4, 4, cells), config(10)).unwrap();
    let areas = partitioner.split().unwrap();
    assert_eq!(areas.len(), 1);
    assert_eq!(areas[0].count, 100);
    assert_eq!(areas[0].bounds, MapArea::new(1, 2, 2, 3));
}

#[test]
fn test_empty_grid_is_not_an_error() {
    let mut partitioner = Partitioner::new(grid_from(6, 3, vec![0; 18]), config(10)).unwrap();
    assert!(partitioner.split().unwrap().is_empty());
}

#[test]
fn test_polygon_outside_grid_gives_empty_result() {
    let mut partitioner = Partitioner::new(grid_from(4, 4, vec![1; 16]), config(4)).unwrap();
    let outside: MultiPolygon<f64> = polygon![
        (x: -50.0, y: -50.0),
        (x: -40.0, y: -50.0),
        (x: -40.0, y: -40.0),
    ]
    .into();
    assert!(partitioner.split_polygon(&outside).unwrap().is_empty());
}

#[test]
fn test_target_tile_count() {
    let grid = grid_from(6, 6, vec![10; 36]);
    let mut partitioner = Partitioner::new(grid, config(1_000_000)).unwrap();
    let areas = partitioner.split_into(9).unwrap();
    assert_eq!(areas.len(), 9);
    assert_eq!(areas.iter().map(|a| a.count).sum::<u64>(), 360);
    assert_disjoint(&areas);
}

#[test]
fn test_random_grids_keep_counts_and_bounds() {
    for seed in 0..3 {
        let grid = random_grid(48, 32, seed);
        let total = grid.total_count();
        let max_nodes = total / 12;
        let mut partitioner = Partitioner::new(grid, config(max_nodes)).unwrap();
        let areas = partitioner.split().unwrap();
        assert!(!areas.is_empty());
        assert_eq!(areas.iter().map(|a| a.count).sum::<u64>(), total);
        assert_disjoint(&areas);
        for area in &areas {
            let single_cell = area.bounds.width() == 1 && area.bounds.height() == 1;
            assert!(area.count <= max_nodes || single_cell, "{:?}", area);
        }
    }
}

/// About half of the cells empty, the others with 1 to 9 nodes
fn sparse_grid(width: i32, height: i32, seed: u64) -> DensityGrid {
    let mut rng = StdRng::seed_from_u64(seed);
    let cells = (0..width * height)
        .map(|_| if rng.gen_bool(0.5) { 0 } else { rng.gen_range(1..=9) })
        .collect();
    grid_from(width, height, cells)
}

#[test]
fn test_sparse_grids_never_lose_nodes() {
    for seed in [3, 11] {
        for max_nodes in [1, 2, 3, 5] {
            let grid = sparse_grid(16, 16, seed);
            let total = grid.total_count();
            let mut partitioner = Partitioner::new(grid, config(max_nodes)).unwrap();
            match partitioner.split() {
                Ok(areas) => {
                    let sum: u64 = areas.iter().map(|a| a.count).sum();
                    assert_eq!(sum, total, "seed {seed}, max_nodes {max_nodes}");
                    assert_disjoint(&areas);
                }
                Err(Error::SplitFailed(_)) => {}
                Err(e) => panic!("seed {seed}, max_nodes {max_nodes}: unexpected error {e}"),
            }
        }
    }
}

#[test]
fn test_untrimmed_split_covers_whole_grid() {
    let grid = random_grid(40, 24, 7);
    let total = grid.total_count();
    let mut cfg = config(total / 6);
    cfg.trim_shape = false;
    let mut partitioner = Partitioner::new(grid, cfg).unwrap();
    let areas = partitioner.split().unwrap();
    assert_eq!(areas.iter().map(|a| a.count).sum::<u64>(), total);
    assert_disjoint(&areas);
    assert_eq!(covered_area(&areas), 40 * 24);
}

#[test]
fn test_map_ids_are_sequential() {
    let mut cfg = config(4);
    cfg.first_map_id = 10;
    let mut partitioner = Partitioner::new(grid_from(4, 4, vec![1; 16]), cfg).unwrap();
    let ids: Vec<u32> = partitioner.split().unwrap().iter().map(|a| a.map_id).collect();
    assert_eq!(ids, vec![10, 11, 12, 13]);
}

#[test]
fn test_split_and_merge_round_trip() {
    let grid = random_grid(20, 12, 3);
    let enhanced = EnhancedDensityGrid::new(Arc::new(grid), None);
    let tile = Tile::whole(&enhanced);
    for pos in 1..tile.width {
        let mut state = SplitSearchState::new(&enhanced, &tile, None);
        let (left, right) = tile.split_horizontal(&enhanced, pos, &mut state).unwrap();
        let merged = left.merge(&right).unwrap();
        assert_eq!(merged, tile);
        assert_eq!(merged.count(), tile.count());
        assert!(merged.verify(&enhanced));
    }
    for pos in 1..tile.height {
        let mut state = SplitSearchState::new(&enhanced, &tile, None);
        let (lower, upper) = tile.split_vertical(&enhanced, pos, &mut state).unwrap();
        assert_eq!(upper.merge(&lower).unwrap(), tile);
        assert_eq!(lower.count() + upper.count(), tile.count());
    }
}

#[test]
fn test_trim_is_idempotent() {
    let mut cells = vec![0u32; 64];
    cells[2 * 8 + 3] = 4;
    cells[5 * 8 + 6] = 9;
    let enhanced = EnhancedDensityGrid::new(Arc::new(grid_from(8, 8, cells)), None);
    let tile = Tile::whole(&enhanced);
    let once = tile.trim(&enhanced);
    let twice = once.trim(&enhanced);
    assert_eq!(once, twice);
    assert_eq!((once.x, once.y, once.width, once.height), (2, 3, 4, 4));
    assert_eq!(once.count(), 13);
    assert!(once.width <= tile.width && once.height <= tile.height);
}

#[test]
fn test_nice_split_aspect_ratio() {
    let grid = grid_from(16, 16, vec![1; 256]);
    let mut partitioner = Partitioner::new(grid, config(64)).unwrap();
    let areas = partitioner.split().unwrap();
    assert_eq!(areas.len(), 4);
    for area in &areas {
        let ratio = area.bounds.width() as f64 / area.bounds.height() as f64;
        assert!((0.25..=4.0).contains(&ratio), "{}", area.bounds);
    }
}

#[test]
fn test_polygon_split_stays_inside() {
    let grid = grid_from(12, 12, vec![2; 144]);
    let mut partitioner = Partitioner::new(grid, config(40)).unwrap();
    let square: MultiPolygon<f64> = polygon![
        (x: 2.0, y: 2.0),
        (x: 10.0, y: 2.0),
        (x: 10.0, y: 10.0),
        (x: 2.0, y: 10.0),
    ]
    .into();
    let areas = partitioner.split_polygon(&square).unwrap();
    assert_eq!(areas.iter().map(|a| a.count).sum::<u64>(), 128);
    for area in &areas {
        assert!(MapArea::new(2, 2, 10, 10).contains(&area.bounds), "{}", area.bounds);
        assert!(area.count <= 40);
    }
    assert_disjoint(&areas);
}
