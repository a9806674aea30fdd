//! Rectangular views on a density grid
//!
//! A [`Tile`] is a plain value: a cell rectangle plus its cached node count.
//! Equality and hashing only look at the rectangle, so tiles produced by
//! different solvers are interchangeable as cache keys. Every operation takes
//! the [`EnhancedDensityGrid`] the tile belongs to by reference.

use splitter_common::{Error, MapArea, Result};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::enhanced::EnhancedDensityGrid;
use super::search_state::SplitSearchState;

/// Direction of a split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Cut at an x position, the parts lie side by side
    Horizontal,
    /// Cut at a y position, the parts lie on top of each other
    Vertical,
}

impl Axis {
    pub fn other(self) -> Self {
        match self {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    count: u64,
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
    }
}

impl Eq for Tile {}

impl Hash for Tile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.x, self.y, self.width, self.height).hash(state);
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{},{},{}) with {} nodes",
            self.x, self.y, self.width, self.height, self.count
        )
    }
}

impl Tile {
    /// Tile covering the whole grid
    pub fn whole(grid: &EnhancedDensityGrid) -> Self {
        Self::with_count(0, 0, grid.width(), grid.height(), grid.total_count())
    }

    /// Tile for a cell rectangle, the count is calculated
    pub fn from_rect(grid: &EnhancedDensityGrid, x: i32, y: i32, width: i32, height: i32) -> Result<Self> {
        if x < 0 || y < 0 || width < 0 || height < 0 || x + width > grid.width() || y + height > grid.height() {
            return Err(Error::invalid_tile(
                format!("({x},{y},{width},{height})"),
                format!("rectangle doesn't fit into {}x{} grid", grid.width(), grid.height()),
            ));
        }
        let mut tile = Self::with_count(x, y, width, height, 0);
        tile.count = tile.calc_count(grid);
        Ok(tile)
    }

    /// Caller must make sure the count is correct, see [`Tile::verify`]
    pub(crate) fn with_count(x: i32, y: i32, width: i32, height: i32, count: u64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            count,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// True when the cached count matches the grid
    pub fn verify(&self, grid: &EnhancedDensityGrid) -> bool {
        self.count == self.calc_count(grid)
    }

    /// Error out when the cached count is wrong
    pub fn check(&self, grid: &EnhancedDensityGrid) -> Result<()> {
        let real = self.calc_count(grid);
        if real != self.count {
            return Err(Error::invalid_tile(
                self,
                format!("cached count {} but grid holds {real}", self.count),
            ));
        }
        Ok(())
    }

    fn calc_count(&self, grid: &EnhancedDensityGrid) -> u64 {
        (0..self.height).map(|row| self.row_sum(grid, row)).sum()
    }

    /// Sum of one row, `row` is relative to the tile
    pub fn row_sum(&self, grid: &EnhancedDensityGrid, row: i32) -> u64 {
        debug_assert!(row >= 0 && row < self.height);
        match grid.row(row + self.y) {
            Some(values) => {
                if self.x == 0 && self.width == grid.width() {
                    return grid.row_total(row + self.y);
                }
                values[self.x as usize..(self.x + self.width) as usize]
                    .iter()
                    .map(|&v| v as u64)
                    .sum()
            }
            None => 0,
        }
    }

    /// Sum of one column, `col` is relative to the tile
    pub fn col_sum(&self, grid: &EnhancedDensityGrid, col: i32) -> u64 {
        debug_assert!(col >= 0 && col < self.width);
        match grid.column(col + self.x) {
            Some(values) => {
                if self.y == 0 && self.height == grid.height() {
                    return grid.col_total(col + self.x);
                }
                values[self.y as usize..(self.y + self.height) as usize]
                    .iter()
                    .map(|&v| v as u64)
                    .sum()
            }
            None => 0,
        }
    }

    /// Split at x position `split_x`. Sums whichever side needs fewer columns.
    /// Returns `None` when a part would get less than the state's `min_nodes`.
    pub fn split_horizontal(
        &self,
        grid: &EnhancedDensityGrid,
        split_x: i32,
        state: &mut SplitSearchState,
    ) -> Option<(Tile, Tile)> {
        if split_x <= 0 || split_x >= self.width {
            return None;
        }
        let sum = if split_x <= self.width / 2 {
            let start = state.first_non_zero_x.unwrap_or(0);
            (start..split_x).map(|pos| state.col_sum(grid, self, pos)).sum()
        } else {
            let end = state.last_non_zero_x.map_or(self.width, |last| last + 1);
            let tail: u64 = (split_x..end).map(|pos| state.col_sum(grid, self, pos)).sum();
            self.count - tail
        };
        let min_nodes = state.min_nodes();
        if sum < min_nodes || self.count - sum < min_nodes {
            return None;
        }
        Some((
            Tile::with_count(self.x, self.y, split_x, self.height, sum),
            Tile::with_count(self.x + split_x, self.y, self.width - split_x, self.height, self.count - sum),
        ))
    }

    /// Split at y position `split_y`, see [`Tile::split_horizontal`]
    pub fn split_vertical(
        &self,
        grid: &EnhancedDensityGrid,
        split_y: i32,
        state: &mut SplitSearchState,
    ) -> Option<(Tile, Tile)> {
        if split_y <= 0 || split_y >= self.height {
            return None;
        }
        let sum = if split_y <= self.height / 2 {
            let start = state.first_non_zero_y.unwrap_or(0);
            (start..split_y).map(|pos| state.row_sum(grid, self, pos)).sum()
        } else {
            let end = state.last_non_zero_y.map_or(self.height, |last| last + 1);
            let tail: u64 = (split_y..end).map(|pos| state.row_sum(grid, self, pos)).sum();
            self.count - tail
        };
        let min_nodes = state.min_nodes();
        if sum < min_nodes || self.count - sum < min_nodes {
            return None;
        }
        Some((
            Tile::with_count(self.x, self.y, self.width, split_y, sum),
            Tile::with_count(self.x, self.y + split_y, self.width, self.height - split_y, self.count - sum),
        ))
    }

    pub fn split(
        &self,
        grid: &EnhancedDensityGrid,
        axis: Axis,
        pos: i32,
        state: &mut SplitSearchState,
    ) -> Option<(Tile, Tile)> {
        match axis {
            Axis::Horizontal => self.split_horizontal(grid, pos, state),
            Axis::Vertical => self.split_vertical(grid, pos, state),
        }
    }

    /// Join two adjacent tiles that share a full edge
    pub fn merge(&self, other: &Tile) -> Option<Tile> {
        let (a, b) = if (self.x, self.y) <= (other.x, other.y) {
            (self, other)
        } else {
            (other, self)
        };
        if a.y == b.y && a.height == b.height && a.x + a.width == b.x {
            return Some(Tile::with_count(a.x, a.y, a.width + b.width, a.height, a.count + b.count));
        }
        if a.x == b.x && a.width == b.width && a.y + a.height == b.y {
            return Some(Tile::with_count(a.x, a.y, a.width, a.height + b.height, a.count + b.count));
        }
        None
    }

    /// Lowest x at which a split leaves at least `min_nodes` on the left,
    /// `width` when there is none
    pub fn find_valid_start_x(&self, grid: &EnhancedDensityGrid, state: &mut SplitSearchState) -> i32 {
        if let Some(pos) = state.valid_start_x {
            return pos;
        }
        let mut sum = 0;
        let start = state.first_non_zero_x.unwrap_or(0);
        for i in start..self.width {
            sum += state.col_sum(grid, self, i);
            if sum == 0 {
                continue;
            }
            if state.first_non_zero_x.is_none() {
                state.first_non_zero_x = Some(i);
            }
            if sum >= state.min_nodes() {
                state.valid_start_x = Some(i + 1);
                return i + 1;
            }
        }
        state.valid_start_x = Some(self.width);
        self.width
    }

    /// Highest x at which the columns from x to the right hold at least
    /// `min_nodes`, -1 when there is none
    pub fn find_valid_end_x(&self, grid: &EnhancedDensityGrid, state: &mut SplitSearchState) -> i32 {
        if let Some(pos) = state.valid_end_x {
            return pos;
        }
        let end = state.last_non_zero_x.unwrap_or(self.width - 1);
        let mut sum = 0;
        let mut found = -1;
        for i in (0..=end).rev() {
            sum += state.col_sum(grid, self, i);
            if sum > 0 && state.last_non_zero_x.is_none() {
                state.last_non_zero_x = Some(i);
            }
            if sum >= state.min_nodes() {
                found = i;
                break;
            }
        }
        state.valid_end_x = Some(found);
        found
    }

    /// Lowest y at which a split leaves at least `min_nodes` below,
    /// `height` when there is none
    pub fn find_valid_start_y(&self, grid: &EnhancedDensityGrid, state: &mut SplitSearchState) -> i32 {
        if let Some(pos) = state.valid_start_y {
            return pos;
        }
        let mut sum = 0;
        let start = state.first_non_zero_y.unwrap_or(0);
        for i in start..self.height {
            sum += state.row_sum(grid, self, i);
            if sum == 0 {
                continue;
            }
            if state.first_non_zero_y.is_none() {
                state.first_non_zero_y = Some(i);
            }
            if sum >= state.min_nodes() {
                state.valid_start_y = Some(i + 1);
                return i + 1;
            }
        }
        state.valid_start_y = Some(self.height);
        self.height
    }

    pub fn find_valid_end_y(&self, grid: &EnhancedDensityGrid, state: &mut SplitSearchState) -> i32 {
        if let Some(pos) = state.valid_end_y {
            return pos;
        }
        let end = state.last_non_zero_y.unwrap_or(self.height - 1);
        let mut sum = 0;
        let mut found = -1;
        for i in (0..=end).rev() {
            sum += state.row_sum(grid, self, i);
            if sum > 0 && state.last_non_zero_y.is_none() {
                state.last_non_zero_y = Some(i);
            }
            if sum >= state.min_nodes() {
                found = i;
                break;
            }
        }
        state.valid_end_y = Some(found);
        found
    }

    pub fn find_valid_start(&self, grid: &EnhancedDensityGrid, axis: Axis, state: &mut SplitSearchState) -> i32 {
        match axis {
            Axis::Horizontal => self.find_valid_start_x(grid, state),
            Axis::Vertical => self.find_valid_start_y(grid, state),
        }
    }

    pub fn find_valid_end(&self, grid: &EnhancedDensityGrid, axis: Axis, state: &mut SplitSearchState) -> i32 {
        match axis {
            Axis::Horizontal => self.find_valid_end_x(grid, state),
            Axis::Vertical => self.find_valid_end_y(grid, state),
        }
    }

    /// First position along `axis` where the running sum exceeds `limit`,
    /// the tile extent along that axis when it never does
    pub fn find_first_higher(
        &self,
        grid: &EnhancedDensityGrid,
        axis: Axis,
        state: &mut SplitSearchState,
        limit: u64,
    ) -> i32 {
        let mut sum = 0;
        match axis {
            Axis::Horizontal => {
                let start = state.first_non_zero_x.unwrap_or(0);
                for i in start..self.width {
                    sum += state.col_sum(grid, self, i);
                    if sum == 0 {
                        continue;
                    }
                    if state.first_non_zero_x.is_none() {
                        state.first_non_zero_x = Some(i);
                    }
                    if sum > limit {
                        return i;
                    }
                }
                self.width
            }
            Axis::Vertical => {
                let start = state.first_non_zero_y.unwrap_or(0);
                for i in start..self.height {
                    sum += state.row_sum(grid, self, i);
                    if sum == 0 {
                        continue;
                    }
                    if state.first_non_zero_y.is_none() {
                        state.first_non_zero_y = Some(i);
                    }
                    if sum > limit {
                        return i;
                    }
                }
                self.height
            }
        }
    }

    pub fn aspect_ratio(&self, grid: &EnhancedDensityGrid) -> f64 {
        grid.aspect_ratio(self.x, self.y, self.width, self.height)
    }

    /// Aspect ratio turned into a "distance from square", always >= 1
    pub fn normalized_aspect_ratio(&self, grid: &EnhancedDensityGrid) -> f64 {
        let ratio = self.aspect_ratio(grid);
        if ratio < 1.0 {
            1.0 / ratio
        } else {
            ratio
        }
    }

    /// Smallest sub-rectangle without empty border rows and columns. With a
    /// polygon, border lines are removed when they lie fully outside of it.
    /// Gives a zero sized tile when nothing is left.
    pub fn trim(&self, grid: &EnhancedDensityGrid) -> Tile {
        self.trim_sides(grid, true, true, true, true)
    }

    /// Like [`Tile::trim`] but only on the selected sides
    pub fn trim_sides(
        &self,
        grid: &EnhancedDensityGrid,
        left: bool,
        right: bool,
        bottom: bool,
        top: bool,
    ) -> Tile {
        let use_polygon = grid.has_polygon();
        let col_needed = |i: i32| {
            if use_polygon {
                !self.col_outside_polygon(grid, i)
            } else {
                self.col_sum(grid, i) > 0
            }
        };
        let row_needed = |i: i32| {
            if use_polygon {
                !self.row_outside_polygon(grid, i)
            } else {
                self.row_sum(grid, i) > 0
            }
        };

        let mut removed_cols = 0;
        let mut removed_rows = 0;
        let mut min_x = self.x;
        let mut max_x = self.x + self.width - 1;
        let mut min_y = self.y;
        let mut max_y = self.y + self.height - 1;

        if left {
            min_x = -1;
            for i in 0..self.width {
                if col_needed(i) {
                    min_x = self.x + i;
                    break;
                }
                removed_cols += self.col_sum(grid, i);
            }
        }
        if right {
            max_x = -1;
            for i in (0..self.width).rev() {
                if col_needed(i) {
                    max_x = self.x + i;
                    break;
                }
                removed_cols += self.col_sum(grid, i);
            }
        }
        if bottom {
            min_y = -1;
            for i in 0..self.height {
                if row_needed(i) {
                    min_y = self.y + i;
                    break;
                }
                removed_rows += self.row_sum(grid, i);
            }
        }
        if top {
            max_y = -1;
            for i in (0..self.height).rev() {
                if row_needed(i) {
                    max_y = self.y + i;
                    break;
                }
                removed_rows += self.row_sum(grid, i);
            }
        }
        if min_x < 0 || min_y < 0 || max_x < 0 || max_y < 0 || min_x > max_x || min_y > max_y {
            return Tile::with_count(self.x, self.y, 0, 0, 0);
        }
        let width = max_x - min_x + 1;
        let height = max_y - min_y + 1;
        let mut count = self.count;
        if use_polygon && (width != self.width || height != self.height) {
            // removed lines may hold nodes outside the polygon
            if width == self.width {
                count -= removed_rows;
            } else if height == self.height {
                count -= removed_cols;
            } else {
                let mut tile = Tile::with_count(min_x, min_y, width, height, 0);
                tile.count = tile.calc_count(grid);
                return tile;
            }
        }
        Tile::with_count(min_x, min_y, width, height, count)
    }

    fn row_outside_polygon(&self, grid: &EnhancedDensityGrid, row: i32) -> bool {
        let y = self.y + row;
        // corners first, they decide most cases
        if grid.is_in_polygon(self.x, y) || grid.is_in_polygon(self.x + self.width - 1, y) {
            return false;
        }
        !(1..self.width - 1).any(|i| grid.is_in_polygon(self.x + i, y))
    }

    fn col_outside_polygon(&self, grid: &EnhancedDensityGrid, col: i32) -> bool {
        let x = self.x + col;
        if grid.is_in_polygon(x, self.y) || grid.is_in_polygon(x, self.y + self.height - 1) {
            return false;
        }
        !(1..self.height - 1).any(|i| grid.is_in_polygon(x, self.y + i))
    }

    /// Split into parts holding less than `max_count` nodes each by cutting
    /// at the median position along the longer side
    pub fn divide(&self, grid: &EnhancedDensityGrid, max_count: u64) -> Vec<Tile> {
        let mut parts = Vec::new();
        let mut todo = vec![*self];
        while let Some(tile) = todo.pop() {
            if tile.count < max_count {
                parts.push(tile);
                continue;
            }
            let mut state = SplitSearchState::new(grid, &tile, None);
            state.set_min_nodes(1);
            let axis = if tile.width > tile.height {
                Axis::Horizontal
            } else {
                Axis::Vertical
            };
            let start = tile.find_valid_start(grid, axis, &mut state);
            let end = tile.find_valid_end(grid, axis, &mut state);
            match tile.split(grid, axis, (start + end) / 2, &mut state) {
                Some((a, b)) => {
                    todo.push(b);
                    todo.push(a);
                }
                None => parts.push(tile),
            }
        }
        parts
    }

    /// True when a polygon is active and doesn't touch this tile
    pub fn outside_polygon(&self, grid: &EnhancedDensityGrid) -> bool {
        grid.has_polygon() && !grid.polygon_intersects(self.x, self.y, self.width, self.height)
    }

    /// True when at most `max_ratio` of the cells lie outside the polygon
    pub fn outside_ratio_is_ok(&self, grid: &EnhancedDensityGrid, max_ratio: f64) -> bool {
        if grid.all_inside_polygon() {
            return true;
        }
        // the tile may contain the whole polygon
        if let Some((px, py, pw, ph)) = grid.polygon_cell_bounds() {
            if self.x <= px && self.y <= py && self.x + self.width >= px + pw && self.y + self.height >= py + ph {
                return true;
            }
        }
        let area = self.area();
        let max_outside = (max_ratio * area as f64) as i64;
        let needed_inside = area - max_outside;
        let mut inside = 0;
        let mut outside = 0;
        for i in self.x..self.x + self.width {
            for j in self.y..self.y + self.height {
                if grid.is_in_polygon(i, j) {
                    inside += 1;
                    if inside >= needed_inside {
                        return true;
                    }
                } else {
                    outside += 1;
                    if outside >= max_outside {
                        return false;
                    }
                }
            }
        }
        false
    }

    /// Nodes in the cells inside the polygon
    pub fn count_inside(&self, grid: &EnhancedDensityGrid) -> u64 {
        if grid.all_inside_polygon() {
            return self.count;
        }
        let mut sum = 0;
        for i in 0..self.width {
            if let Some(col) = grid.column(self.x + i) {
                for k in 0..self.height {
                    if grid.is_in_polygon(self.x + i, self.y + k) {
                        sum += col[(self.y + k) as usize] as u64;
                    }
                }
            }
        }
        sum
    }

    pub fn count_cells_outside(&self, grid: &EnhancedDensityGrid) -> u64 {
        if grid.all_inside_polygon() {
            return 0;
        }
        let mut num = 0;
        for i in 0..self.width {
            for k in 0..self.height {
                if !grid.is_in_polygon(self.x + i, self.y + k) {
                    num += 1;
                }
            }
        }
        num
    }

    /// Largest count of a single cell, may be outside the polygon
    pub fn largest_cell(&self, grid: &EnhancedDensityGrid) -> u64 {
        let mut largest = 0;
        for i in 0..self.width {
            if let Some(col) = grid.column(self.x + i) {
                let cells = &col[self.y as usize..(self.y + self.height) as usize];
                largest = largest.max(cells.iter().copied().max().unwrap_or(0));
            }
        }
        largest as u64
    }

    /// Minimum number of parts when no part may exceed `max_nodes`
    pub fn min_parts(&self, grid: &EnhancedDensityGrid, max_nodes: u64) -> usize {
        self.count_inside(grid).div_ceil(max_nodes.max(1)) as usize
    }

    /// Map area covered by the tile
    pub fn real_bbox(&self, grid: &EnhancedDensityGrid) -> MapArea {
        grid.grid().area_of(self.x, self.y, self.width, self.height)
    }

    /// Human readable form with the covered map area
    pub fn describe(&self, grid: &EnhancedDensityGrid) -> String {
        format!("{} with {} nodes", self.real_bbox(grid), self.count)
    }
}
