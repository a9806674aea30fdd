//! Density grid
//!
//! A fixed raster of node counts over a bounding box. One cell covers
//! `1 << shift` map units in both directions. Cells are stored column-major
//! (`x * height + y`), x runs along the longitude and y along the latitude.

use splitter_common::{Error, MapArea, Result};

/// Immutable grid of node counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DensityGrid {
    bounds: MapArea,
    shift: u32,
    width: i32,
    height: i32,
    cells: Vec<u32>,
    total: u64,
}

fn check_shift(shift: u32) -> Result<()> {
    if shift > 24 {
        return Err(Error::invalid_grid(format!(
            "shift {shift} exceeds the map unit resolution"
        )));
    }
    Ok(())
}

/// Grid dimensions for aligned bounds
fn dimensions(bounds: &MapArea, shift: u32) -> Result<(i32, i32)> {
    check_shift(shift)?;
    let cell = 1i64 << shift;
    let aligned = [bounds.min_lat, bounds.min_lon, bounds.max_lat, bounds.max_lon]
        .iter()
        .all(|&v| (v as i64).rem_euclid(cell) == 0);
    if !aligned {
        return Err(Error::invalid_grid(format!(
            "bounds {bounds:?} are not aligned to cell size {cell}"
        )));
    }
    if bounds.width() < 0 || bounds.height() < 0 {
        return Err(Error::invalid_grid(format!("bounds {bounds:?} are inverted")));
    }
    let width = i32::try_from(bounds.width() >> shift)
        .map_err(|_| Error::invalid_grid("grid is too wide"))?;
    let height = i32::try_from(bounds.height() >> shift)
        .map_err(|_| Error::invalid_grid("grid is too high"))?;
    Ok((width, height))
}

fn align_down(value: i32, shift: u32) -> i32 {
    ((value as i64 >> shift) << shift) as i32
}

fn align_up(value: i32, shift: u32) -> i32 {
    let cell = 1i64 << shift;
    ((value as i64 + cell - 1) >> shift << shift) as i32
}

impl DensityGrid {
    /// Create a grid with all cells empty
    pub fn new(bounds: MapArea, shift: u32) -> Result<Self> {
        let (width, height) = dimensions(&bounds, shift)?;
        Ok(Self {
            bounds,
            shift,
            width,
            height,
            cells: vec![0; width as usize * height as usize],
            total: 0,
        })
    }

    /// Create a grid from column-major cell counts
    pub fn from_cells(bounds: MapArea, shift: u32, cells: Vec<u32>) -> Result<Self> {
        let (width, height) = dimensions(&bounds, shift)?;
        let expected = width as usize * height as usize;
        if cells.len() != expected {
            return Err(Error::invalid_grid(format!(
                "expected {expected} cells for a {width}x{height} grid, got {}",
                cells.len()
            )));
        }
        let total = cells.iter().map(|&c| c as u64).sum();
        Ok(Self {
            bounds,
            shift,
            width,
            height,
            cells,
            total,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    pub fn bounds(&self) -> MapArea {
        self.bounds
    }

    /// Size of one cell in map units
    pub fn cell_size(&self) -> i32 {
        1 << self.shift
    }

    pub fn total_count(&self) -> u64 {
        self.total
    }

    pub fn node_count(&self, x: i32, y: i32) -> u32 {
        debug_assert!(x >= 0 && x < self.width && y >= 0 && y < self.height);
        self.cells[x as usize * self.height as usize + y as usize]
    }

    /// All cells of one column, bottom to top
    pub fn column(&self, x: i32) -> &[u32] {
        let h = self.height as usize;
        let start = x as usize * h;
        &self.cells[start..start + h]
    }

    /// Map area covered by a cell rectangle
    pub fn area_of(&self, x: i32, y: i32, width: i32, height: i32) -> MapArea {
        let s = self.shift;
        MapArea::new(
            self.bounds.min_lat + (y << s),
            self.bounds.min_lon + (x << s),
            self.bounds.min_lat + ((y + height) << s),
            self.bounds.min_lon + ((x + width) << s),
        )
    }

    /// The cells overlapping `area`, aligned outward to whole cells and clipped
    /// to this grid. Disjoint areas give an empty grid.
    pub fn subset(&self, area: &MapArea) -> DensityGrid {
        let s = self.shift;
        let b = self.bounds;
        let x0 = ((area.min_lon as i64 - b.min_lon as i64) >> s).clamp(0, self.width as i64);
        let y0 = ((area.min_lat as i64 - b.min_lat as i64) >> s).clamp(0, self.height as i64);
        let cell = 1i64 << s;
        let x1 = ((area.max_lon as i64 - b.min_lon as i64 + cell - 1) >> s).clamp(0, self.width as i64);
        let y1 = ((area.max_lat as i64 - b.min_lat as i64 + cell - 1) >> s).clamp(0, self.height as i64);
        if x0 >= x1 || y0 >= y1 {
            let corner = MapArea::new(b.min_lat, b.min_lon, b.min_lat, b.min_lon);
            return DensityGrid {
                bounds: corner,
                shift: s,
                width: 0,
                height: 0,
                cells: Vec::new(),
                total: 0,
            };
        }
        let (x0, y0, x1, y1) = (x0 as i32, y0 as i32, x1 as i32, y1 as i32);
        let width = x1 - x0;
        let height = y1 - y0;
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for x in x0..x1 {
            cells.extend_from_slice(&self.column(x)[y0 as usize..y1 as usize]);
        }
        let total = cells.iter().map(|&c| c as u64).sum();
        DensityGrid {
            bounds: self.area_of(x0, y0, width, height),
            shift: s,
            width,
            height,
            cells,
            total,
        }
    }
}

/// Collects node positions into a [`DensityGrid`]
#[derive(Debug)]
pub struct DensityGridBuilder {
    bounds: MapArea,
    shift: u32,
    width: i32,
    height: i32,
    cells: Vec<u32>,
}

impl DensityGridBuilder {
    /// Bounds are aligned outward to whole cells
    pub fn new(bounds: MapArea, shift: u32) -> Result<Self> {
        check_shift(shift)?;
        let aligned = MapArea::new(
            align_down(bounds.min_lat, shift),
            align_down(bounds.min_lon, shift),
            align_up(bounds.max_lat, shift),
            align_up(bounds.max_lon, shift),
        );
        let (width, height) = dimensions(&aligned, shift)?;
        Ok(Self {
            bounds: aligned,
            shift,
            width,
            height,
            cells: vec![0; width as usize * height as usize],
        })
    }

    pub fn bounds(&self) -> MapArea {
        self.bounds
    }

    /// Count a node at the given map unit position. Positions outside the
    /// bounds are ignored, positions on the upper edges go to the last cell.
    pub fn add_node(&mut self, lat: i32, lon: i32) {
        let b = self.bounds;
        if lat < b.min_lat || lat > b.max_lat || lon < b.min_lon || lon > b.max_lon {
            return;
        }
        if self.width == 0 || self.height == 0 {
            return;
        }
        let x = (((lon as i64 - b.min_lon as i64) >> self.shift) as i32).min(self.width - 1);
        let y = (((lat as i64 - b.min_lat as i64) >> self.shift) as i32).min(self.height - 1);
        self.add(x, y, 1);
    }

    pub fn add(&mut self, x: i32, y: i32, n: u32) {
        if let Some(cell) = self.cell_mut(x, y) {
            *cell = cell.saturating_add(n);
        }
    }

    pub fn set(&mut self, x: i32, y: i32, n: u32) {
        if let Some(cell) = self.cell_mut(x, y) {
            *cell = n;
        }
    }

    fn cell_mut(&mut self, x: i32, y: i32) -> Option<&mut u32> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get_mut(x as usize * self.height as usize + y as usize)
    }

    pub fn build(self) -> Result<DensityGrid> {
        DensityGrid::from_cells(self.bounds, self.shift, self.cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_4x3() -> DensityGrid {
        // column-major: x=0 -> [1,2,3], x=1 -> [0,0,0], ...
        let cells = vec![1, 2, 3, 0, 0, 0, 4, 0, 0, 0, 0, 5];
        DensityGrid::from_cells(MapArea::new(0, 0, 3, 4), 0, cells).unwrap()
    }

    #[test]
    fn test_from_cells() {
        let grid = grid_4x3();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.total_count(), 15);
        assert_eq!(grid.node_count(0, 2), 3);
        assert_eq!(grid.node_count(3, 2), 5);
        assert_eq!(grid.column(2), &[4, 0, 0]);
    }

    #[test]
    fn test_invalid_grids() {
        let cells = vec![0; 3];
        assert!(matches!(
            DensityGrid::from_cells(MapArea::new(0, 0, 2, 2), 0, cells),
            Err(Error::InvalidGrid(_))
        ));
        // not aligned to 4 unit cells
        assert!(DensityGrid::new(MapArea::new(0, 0, 6, 8), 2).is_err());
        assert!(DensityGrid::new(MapArea::new(0, 0, 8, 8), 25).is_err());
        assert!(DensityGrid::new(MapArea::new(8, 0, 0, 8), 2).is_err());
    }

    #[test]
    fn test_area_of() {
        let grid = DensityGrid::new(MapArea::new(-64, 128, 64, 256), 4).unwrap();
        assert_eq!(grid.width(), 8);
        assert_eq!(grid.height(), 8);
        assert_eq!(grid.area_of(1, 2, 3, 4), MapArea::new(-32, 144, 32, 192));
    }

    #[test]
    fn test_builder_alignment_and_edges() {
        let mut builder = DensityGridBuilder::new(MapArea::new(3, 5, 30, 60), 4).unwrap();
        assert_eq!(builder.bounds(), MapArea::new(0, 0, 32, 64));
        builder.add_node(0, 0);
        builder.add_node(32, 64); // upper corner goes to the last cell
        builder.add_node(100, 0); // ignored
        builder.add(1, 1, 7);
        builder.set(2, 0, 9);
        builder.add(99, 0, 1); // ignored
        let grid = builder.build().unwrap();
        assert_eq!(grid.node_count(0, 0), 1);
        assert_eq!(grid.node_count(3, 1), 1);
        assert_eq!(grid.node_count(1, 1), 7);
        assert_eq!(grid.node_count(2, 0), 9);
        assert_eq!(grid.total_count(), 18);
    }

    #[test]
    fn test_subset() {
        let grid = grid_4x3();
        let sub = grid.subset(&MapArea::new(0, 2, 3, 4));
        assert_eq!(sub.width(), 2);
        assert_eq!(sub.height(), 3);
        assert_eq!(sub.bounds(), MapArea::new(0, 2, 3, 4));
        assert_eq!(sub.total_count(), 9);
        assert_eq!(sub.node_count(0, 0), 4);

        let disjoint = grid.subset(&MapArea::new(10, 10, 20, 20));
        assert_eq!(disjoint.width(), 0);
        assert_eq!(disjoint.total_count(), 0);
    }
}
