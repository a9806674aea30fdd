//! Rasterised polygon shapes
//!
//! A [`RasterShape`] is the set of grid cells covered by a bounding polygon,
//! stored as a bitmap over its cell bounding box. The polygon split works on
//! these shapes: it decomposes them into connected components and cuts
//! non-rectangular ones at their outline vertices.

use std::collections::VecDeque;

use super::enhanced::EnhancedDensityGrid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterShape {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    /// `true` for member cells, index `(cx - x) * height + (cy - y)`
    cells: Vec<bool>,
}

impl RasterShape {
    /// Member cells of the rectangle `(x, y, width, height)` selected by
    /// `inside`, shrunk to their bounding box. `None` when no cell is selected.
    pub fn from_fn(x: i32, y: i32, width: i32, height: i32, inside: impl Fn(i32, i32) -> bool) -> Option<Self> {
        let mut min = (i32::MAX, i32::MAX);
        let mut max = (i32::MIN, i32::MIN);
        for cx in x..x + width {
            for cy in y..y + height {
                if inside(cx, cy) {
                    min = (min.0.min(cx), min.1.min(cy));
                    max = (max.0.max(cx), max.1.max(cy));
                }
            }
        }
        if min.0 > max.0 {
            return None;
        }
        let (w, h) = (max.0 - min.0 + 1, max.1 - min.1 + 1);
        let mut cells = Vec::with_capacity(w as usize * h as usize);
        for cx in min.0..=max.0 {
            for cy in min.1..=max.1 {
                cells.push(inside(cx, cy));
            }
        }
        Some(Self {
            x: min.0,
            y: min.1,
            width: w,
            height: h,
            cells,
        })
    }

    /// Cells of the grid inside its polygon, the whole grid without one
    pub fn rasterize(grid: &EnhancedDensityGrid) -> Option<Self> {
        let (x, y, w, h) = if grid.has_polygon() {
            grid.polygon_cell_bounds()?
        } else {
            (0, 0, grid.width(), grid.height())
        };
        Self::from_fn(x, y, w, h, |cx, cy| grid.is_in_polygon(cx, cy))
    }

    pub fn contains(&self, cx: i32, cy: i32) -> bool {
        if cx < self.x || cy < self.y || cx >= self.x + self.width || cy >= self.y + self.height {
            return false;
        }
        self.cells[((cx - self.x) * self.height + (cy - self.y)) as usize]
    }

    /// Bounding cell rectangle `(x, y, width, height)`
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        (self.x, self.y, self.width, self.height)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// True when the shape fills its bounding box
    pub fn is_rectangular(&self) -> bool {
        self.cells.iter().all(|&c| c)
    }

    /// Member cells within a cell rectangle
    pub fn intersect_rect(&self, x: i32, y: i32, width: i32, height: i32) -> Option<Self> {
        let x0 = x.max(self.x);
        let y0 = y.max(self.y);
        let x1 = (x + width).min(self.x + self.width);
        let y1 = (y + height).min(self.y + self.height);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Self::from_fn(x0, y0, x1 - x0, y1 - y0, |cx, cy| self.contains(cx, cy))
    }

    /// Split into 4-connected components
    pub fn components(&self) -> Vec<Self> {
        let mut label = vec![usize::MAX; self.cells.len()];
        let index = |cx: i32, cy: i32| ((cx - self.x) * self.height + (cy - self.y)) as usize;
        let mut parts = Vec::new();
        for cx in self.x..self.x + self.width {
            for cy in self.y..self.y + self.height {
                if !self.contains(cx, cy) || label[index(cx, cy)] != usize::MAX {
                    continue;
                }
                let id = parts.len();
                let mut members = Vec::new();
                let mut queue = VecDeque::from([(cx, cy)]);
                label[index(cx, cy)] = id;
                while let Some((px, py)) = queue.pop_front() {
                    members.push((px, py));
                    for (nx, ny) in [(px - 1, py), (px + 1, py), (px, py - 1), (px, py + 1)] {
                        if self.contains(nx, ny) && label[index(nx, ny)] == usize::MAX {
                            label[index(nx, ny)] = id;
                            queue.push_back((nx, ny));
                        }
                    }
                }
                parts.push(members);
            }
        }
        if parts.len() == 1 {
            return vec![self.clone()];
        }
        parts
            .iter()
            .enumerate()
            .filter_map(|(id, members)| {
                let min_x = members.iter().map(|m| m.0).min()?;
                let max_x = members.iter().map(|m| m.0).max()?;
                let min_y = members.iter().map(|m| m.1).min()?;
                let max_y = members.iter().map(|m| m.1).max()?;
                Self::from_fn(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1, |cx, cy| {
                    self.contains(cx, cy) && label[index(cx, cy)] == id
                })
            })
            .collect()
    }

    /// Lattice points where the outline changes direction
    pub fn vertices(&self) -> Vec<(i32, i32)> {
        let mut points = Vec::new();
        for px in self.x..=self.x + self.width {
            for py in self.y..=self.y + self.height {
                let lower_left = self.contains(px - 1, py - 1);
                let lower_right = self.contains(px, py - 1);
                let upper_left = self.contains(px - 1, py);
                let upper_right = self.contains(px, py);
                let n = [lower_left, lower_right, upper_left, upper_right]
                    .iter()
                    .filter(|&&c| c)
                    .count();
                if n == 1 || n == 3 || (n == 2 && lower_left == upper_right) {
                    points.push((px, py));
                }
            }
        }
        points
    }
}
