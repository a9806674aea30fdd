//! Density grid with precomputed lookup tables
//!
//! Wraps a [`DensityGrid`] with dense row and column arrays, per-row latitude
//! correction factors for aspect ratios, and an optional bitmask of the cells
//! lying outside a bounding polygon. Built once per split and shared read-only
//! between all solvers.

use geo::{BoundingRect, Coord, Intersects, MultiPolygon, Rect};
use splitter_common::to_degrees;
use std::sync::Arc;

use super::grid::DensityGrid;

#[derive(Debug)]
pub struct EnhancedDensityGrid {
    grid: Arc<DensityGrid>,
    /// Non-empty rows, indexed by y, each of length `width`
    rows: Vec<Option<Box<[u32]>>>,
    col_totals: Vec<u64>,
    row_totals: Vec<u64>,
    /// cos(latitude) at every row boundary, `height + 1` entries
    aspect_factor: Vec<f64>,
    max_factor_pos: i32,
    polygon: Option<MultiPolygon<f64>>,
    /// One bit per cell (`x * height + y`), set when the cell is outside the polygon
    outside: Vec<u64>,
    any_outside: bool,
    /// Cell rectangle (x, y, width, height) enclosing all cells inside the polygon
    inside_bounds: Option<(i32, i32, i32, i32)>,
    max_cell_count: u32,
    polygon_max_cell_count: u32,
}

/// Map unit rectangle of a cell range, shrunk a little so that a polygon
/// touching it only along an edge does not intersect it
pub(crate) fn inset_rect(
    grid: &DensityGrid,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
) -> Rect<f64> {
    let bounds = grid.bounds();
    let cell = grid.cell_size() as f64;
    let inset = cell * 1e-3;
    let min_x = bounds.min_lon as f64 + x as f64 * cell;
    let min_y = bounds.min_lat as f64 + y as f64 * cell;
    Rect::new(
        Coord { x: min_x + inset, y: min_y + inset },
        Coord {
            x: min_x + width as f64 * cell - inset,
            y: min_y + height as f64 * cell - inset,
        },
    )
}

impl EnhancedDensityGrid {
    pub fn new(grid: Arc<DensityGrid>, polygon: Option<&MultiPolygon<f64>>) -> Self {
        let width = grid.width();
        let height = grid.height();
        let shift = grid.shift();
        let bounds = grid.bounds();

        let mut aspect_factor = Vec::with_capacity(height as usize + 1);
        let mut max_factor = f64::MIN;
        let mut max_factor_pos = i32::MAX;
        for i in 0..=height {
            let lat = bounds.min_lat as i64 + ((i as i64) << shift);
            let factor = to_degrees(lat as i32).to_radians().cos();
            if max_factor < factor {
                max_factor = factor;
                max_factor_pos = i;
            }
            aspect_factor.push(factor);
        }

        let cell_count = width as usize * height as usize;
        let mut outside = vec![0u64; cell_count.div_ceil(64)];
        let mut any_outside = false;
        let mut col_totals = vec![0u64; width as usize];
        let mut row_totals = vec![0u64; height as usize];
        let mut max_cell_count = 0;
        let mut polygon_max_cell_count = 0;
        let mut inside_min = (i32::MAX, i32::MAX);
        let mut inside_max = (i32::MIN, i32::MIN);
        let poly_bbox = polygon.and_then(|p| p.bounding_rect());

        for x in 0..width {
            let column = grid.column(x);
            for (y, &count) in column.iter().enumerate() {
                let y = y as i32;
                if let Some(poly) = polygon {
                    let cell_rect = inset_rect(&grid, x, y, 1, 1);
                    let inside = poly_bbox.is_some_and(|bb| bb.intersects(&cell_rect))
                        && poly.intersects(&cell_rect);
                    if inside {
                        polygon_max_cell_count = polygon_max_cell_count.max(count);
                        inside_min = (inside_min.0.min(x), inside_min.1.min(y));
                        inside_max = (inside_max.0.max(x), inside_max.1.max(y));
                    } else {
                        let bit = x as usize * height as usize + y as usize;
                        outside[bit / 64] |= 1 << (bit % 64);
                        any_outside = true;
                    }
                }
                if count > 0 {
                    max_cell_count = max_cell_count.max(count);
                    col_totals[x as usize] += count as u64;
                    row_totals[y as usize] += count as u64;
                }
            }
        }

        let mut rows: Vec<Option<Box<[u32]>>> = vec![None; height as usize];
        for (y, row) in rows.iter_mut().enumerate() {
            if row_totals[y] == 0 {
                continue;
            }
            let values: Vec<u32> = (0..width)
                .map(|x| grid.node_count(x, y as i32))
                .collect();
            *row = Some(values.into_boxed_slice());
        }

        let inside_bounds = if polygon.is_some() && inside_min.0 <= inside_max.0 {
            Some((
                inside_min.0,
                inside_min.1,
                inside_max.0 - inside_min.0 + 1,
                inside_max.1 - inside_min.1 + 1,
            ))
        } else {
            None
        };

        Self {
            grid,
            rows,
            col_totals,
            row_totals,
            aspect_factor,
            max_factor_pos,
            polygon: polygon.cloned(),
            outside,
            any_outside,
            inside_bounds,
            max_cell_count,
            polygon_max_cell_count,
        }
    }

    pub fn grid(&self) -> &DensityGrid {
        &self.grid
    }

    pub fn width(&self) -> i32 {
        self.grid.width()
    }

    pub fn height(&self) -> i32 {
        self.grid.height()
    }

    pub fn total_count(&self) -> u64 {
        self.grid.total_count()
    }

    /// Column `x`, `None` when it holds no nodes
    pub fn column(&self, x: i32) -> Option<&[u32]> {
        if self.col_totals[x as usize] == 0 {
            None
        } else {
            Some(self.grid.column(x))
        }
    }

    /// Row `y`, `None` when it holds no nodes
    pub fn row(&self, y: i32) -> Option<&[u32]> {
        self.rows[y as usize].as_deref()
    }

    pub fn col_total(&self, x: i32) -> u64 {
        self.col_totals[x as usize]
    }

    pub fn row_total(&self, y: i32) -> u64 {
        self.row_totals[y as usize]
    }

    /// Width to height ratio of a cell rectangle, corrected for latitude.
    ///
    /// The width is scaled with the larger cosine factor of the two edges. A
    /// rectangle that contains the row boundary with the largest factor keeps
    /// its raw width.
    pub fn aspect_ratio(&self, _x: i32, y: i32, width: i32, height: i32) -> f64 {
        let max_width = if y < self.max_factor_pos && y + height > self.max_factor_pos {
            width as f64
        } else {
            let w1 = width as f64 * self.aspect_factor[y as usize];
            let w2 = width as f64 * self.aspect_factor[(y + height) as usize];
            w1.max(w2)
        };
        max_width / height as f64
    }

    pub fn has_polygon(&self) -> bool {
        self.polygon.is_some()
    }

    pub fn polygon(&self) -> Option<&MultiPolygon<f64>> {
        self.polygon.as_ref()
    }

    /// True when the polygon overlaps the interior of the cell rectangle
    pub fn polygon_intersects(&self, x: i32, y: i32, width: i32, height: i32) -> bool {
        match &self.polygon {
            Some(poly) => {
                width > 0
                    && height > 0
                    && poly.intersects(&inset_rect(&self.grid, x, y, width, height))
            }
            None => true,
        }
    }

    pub fn all_inside_polygon(&self) -> bool {
        self.polygon.is_none() || !self.any_outside
    }

    pub fn is_in_polygon(&self, x: i32, y: i32) -> bool {
        if !self.any_outside {
            return true;
        }
        let bit = x as usize * self.grid.height() as usize + y as usize;
        self.outside[bit / 64] & (1 << (bit % 64)) == 0
    }

    /// Cell rectangle `(x, y, width, height)` enclosing every cell inside the polygon
    pub fn polygon_cell_bounds(&self) -> Option<(i32, i32, i32, i32)> {
        self.inside_bounds
    }

    /// Highest count of a single cell
    pub fn max_cell_count(&self) -> u32 {
        self.max_cell_count
    }

    /// Highest count of a single cell inside the polygon
    pub fn polygon_max_cell_count(&self) -> u32 {
        self.polygon_max_cell_count
    }
}
