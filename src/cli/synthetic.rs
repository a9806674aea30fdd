//! Synthetic density grids
//!
//! Places clustered random nodes on a grid so that the splitter can be tried
//! without an OSM extract. The same seed always gives the same grid.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tile_splitter::{to_map_unit, DensityGrid, DensityGridBuilder, MapArea, Result};

#[derive(Debug, Clone)]
pub struct SyntheticGrid {
    /// Grid size in cells
    pub width: i32,
    pub height: i32,
    pub shift: u32,
    pub clusters: usize,
    pub points: u64,
    pub seed: u64,
    /// South west corner in degrees
    pub origin_lat: f64,
    pub origin_lon: f64,
}

impl SyntheticGrid {
    pub fn bounds(&self) -> MapArea {
        let cell = 1i32 << self.shift;
        // snap the corner to the cell raster
        let min_lat = (to_map_unit(self.origin_lat) >> self.shift) << self.shift;
        let min_lon = (to_map_unit(self.origin_lon) >> self.shift) << self.shift;
        MapArea::new(
            min_lat,
            min_lon,
            min_lat.saturating_add(self.height.saturating_mul(cell)),
            min_lon.saturating_add(self.width.saturating_mul(cell)),
        )
    }

    /// Nodes are spread around random cluster centres, a tenth of them
    /// uniformly over the whole grid
    pub fn generate(&self) -> Result<DensityGrid> {
        let mut builder = DensityGridBuilder::new(self.bounds(), self.shift)?;
        let bounds = builder.bounds();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let lat_span = (bounds.height() as f64).max(1.0);
        let lon_span = (bounds.width() as f64).max(1.0);

        let centres: Vec<(f64, f64, f64)> = (0..self.clusters.max(1))
            .map(|_| {
                let lat = rng.gen_range(0.0..lat_span);
                let lon = rng.gen_range(0.0..lon_span);
                let radius = rng.gen_range(0.02..0.2) * lat_span.min(lon_span);
                (lat, lon, radius)
            })
            .collect();

        for _ in 0..self.points {
            let (lat, lon) = if rng.gen_bool(0.1) {
                (rng.gen_range(0.0..lat_span), rng.gen_range(0.0..lon_span))
            } else {
                let (c_lat, c_lon, radius) = centres[rng.gen_range(0..centres.len())];
                // triangular distribution around the centre
                let d_lat = (rng.gen::<f64>() - rng.gen::<f64>()) * radius;
                let d_lon = (rng.gen::<f64>() - rng.gen::<f64>()) * radius;
                (c_lat + d_lat, c_lon + d_lon)
            };
            builder.add_node(
                bounds.min_lat + lat.clamp(0.0, lat_span - 1.0) as i32,
                bounds.min_lon + lon.clamp(0.0, lon_span - 1.0) as i32,
            );
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(seed: u64) -> SyntheticGrid {
        SyntheticGrid {
            width: 32,
            height: 16,
            shift: 12,
            clusters: 3,
            points: 10_000,
            seed,
            origin_lat: 50.0,
            origin_lon: 4.0,
        }
    }

    #[test]
    fn test_generate_keeps_every_point() {
        let grid = params(7).generate().unwrap();
        assert_eq!(grid.width(), 32);
        assert_eq!(grid.height(), 16);
        assert_eq!(grid.total_count(), 10_000);
    }

    #[test]
    fn test_same_seed_same_grid() {
        let a = params(1).generate().unwrap();
        let b = params(1).generate().unwrap();
        let c = params(2).generate().unwrap();
        let cells = |g: &DensityGrid| (0..g.width()).flat_map(|x| g.column(x).to_vec()).collect::<Vec<_>>();
        assert_eq!(cells(&a), cells(&b));
        assert_ne!(cells(&a), cells(&c));
    }
}
