//! Tile solutions and their ordering

use std::cmp::Ordering;
use std::fmt;

use super::enhanced::EnhancedDensityGrid;
use super::tile::Tile;

/// Largest aspect ratio of a tile in a nice solution
pub const NICE_MAX_ASPECT_RATIO: f64 = 4.0;

/// An ordered list of tiles plus the quality metrics used to compare solutions
#[derive(Debug, Clone)]
pub struct Solution {
    tiles: Vec<Tile>,
    max_nodes: u64,
    /// Largest normalized aspect ratio, single cells are ignored
    worst_aspect_ratio: f64,
    worst_min_nodes: u64,
}

impl Solution {
    pub fn new(max_nodes: u64) -> Self {
        Self {
            tiles: Vec::new(),
            max_nodes,
            worst_aspect_ratio: 0.0,
            worst_min_nodes: u64::MAX,
        }
    }

    pub fn add(&mut self, tile: Tile, grid: &EnhancedDensityGrid) {
        if tile.width > 1 || tile.height > 1 {
            let ratio = tile.normalized_aspect_ratio(grid);
            self.worst_aspect_ratio = self.worst_aspect_ratio.max(ratio);
        }
        self.worst_min_nodes = self.worst_min_nodes.min(tile.count());
        self.tiles.push(tile);
    }

    pub fn merge(&mut self, other: Solution) {
        if other.tiles.is_empty() {
            return;
        }
        self.worst_aspect_ratio = self.worst_aspect_ratio.max(other.worst_aspect_ratio);
        self.worst_min_nodes = self.worst_min_nodes.min(other.worst_min_nodes);
        self.tiles.extend(other.tiles);
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn size(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Smallest tile count, `u64::MAX` for an empty solution
    pub fn worst_min_nodes(&self) -> u64 {
        self.worst_min_nodes
    }

    pub fn worst_aspect_ratio(&self) -> f64 {
        self.worst_aspect_ratio
    }

    pub fn total_count(&self) -> u64 {
        self.tiles.iter().map(|t| t.count()).sum()
    }

    /// Non-empty, every tile reasonably square and within `max_nodes`
    /// (single cells may exceed it, they can't be split)
    pub fn is_nice(&self) -> bool {
        if self.is_empty() || self.worst_aspect_ratio > NICE_MAX_ASPECT_RATIO {
            return false;
        }
        self.tiles
            .iter()
            .all(|t| t.count() <= self.max_nodes || (t.width == 1 && t.height == 1))
    }

    /// `Less` means `self` is better: non-empty before empty, fewer tiles,
    /// then the higher smallest tile count
    pub fn cmp_quality(&self, other: &Solution) -> Ordering {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        self.size()
            .cmp(&other.size())
            .then_with(|| other.worst_min_nodes.cmp(&self.worst_min_nodes))
    }

    pub fn is_smaller_or_better(&self, other: &Solution) -> bool {
        if self.is_empty() {
            return false;
        }
        if other.is_empty() || self.size() < other.size() {
            return true;
        }
        self.size() == other.size() && self.cmp_quality(other) == Ordering::Less
    }

    /// Ranking of finished race results: nice first, then fewer tiles, then
    /// the higher smallest tile count
    pub fn race_order(&self, other: &Solution) -> Ordering {
        other
            .is_nice()
            .cmp(&self.is_nice())
            .then_with(|| self.size().cmp(&other.size()))
            .then_with(|| other.worst_min_nodes.cmp(&self.worst_min_nodes))
    }

    /// Bounding cell rectangle `(min_x, min_y, max_x, max_y)` of all tiles, max exclusive
    fn extent(&self) -> Option<(i32, i32, i32, i32)> {
        let mut tiles = self.tiles.iter().filter(|t| t.area() > 0);
        let first = tiles.next()?;
        let init = (first.x, first.y, first.x + first.width, first.y + first.height);
        Some(tiles.fold(init, |(x0, y0, x1, y1), t| {
            (
                x0.min(t.x),
                y0.min(t.y),
                x1.max(t.x + t.width),
                y1.max(t.y + t.height),
            )
        }))
    }

    /// Remove empty border lines from the tiles on the outer edges of the
    /// solution, inner edges stay untouched
    pub fn trim_outer_tiles(&mut self, grid: &EnhancedDensityGrid) {
        let Some((min_x, min_y, max_x, max_y)) = self.extent() else {
            return;
        };
        for tile in self.tiles.iter_mut() {
            let left = tile.x == min_x;
            let bottom = tile.y == min_y;
            let right = tile.x + tile.width == max_x;
            let top = tile.y + tile.height == max_y;
            if !(left || right || bottom || top) || tile.count() == 0 {
                continue;
            }
            *tile = tile.trim_sides(grid, left, right, bottom, top);
        }
    }

    /// Grow the tiles on the outer edges so that the solution covers the
    /// cell rectangle `(x, y, width, height)`. The added cells must be empty.
    pub fn expand_to(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let Some((min_x, min_y, max_x, max_y)) = self.extent() else {
            return;
        };
        for tile in self.tiles.iter_mut() {
            let mut x0 = tile.x;
            let mut y0 = tile.y;
            let mut x1 = tile.x + tile.width;
            let mut y1 = tile.y + tile.height;
            if x0 == min_x {
                x0 = x;
            }
            if y0 == min_y {
                y0 = y;
            }
            if x1 == max_x {
                x1 = x + width;
            }
            if y1 == max_y {
                y1 = y + height;
            }
            *tile = Tile::with_count(x0, y0, x1 - x0, y1 - y0, tile.count());
        }
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "empty solution");
        }
        let percentage = 100 * self.worst_min_nodes / self.max_nodes.max(1);
        write!(
            f,
            "{} tile(s). The smallest node count is {} ({} %), the worst aspect ratio is near {:.1}",
            self.size(),
            self.worst_min_nodes,
            percentage,
            self.worst_aspect_ratio
        )
    }
}
