//! Bounding polygon arguments
//!
//! A polygon is written as `lat,lon;lat,lon;...` in degrees. Several outer
//! rings of one polygon are separated by `|`.

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use tile_splitter::to_map_unit;

/// Parse one polygon argument into map units, x = longitude
pub fn parse_polygon(text: &str) -> Result<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    for ring in text.split('|').filter(|r| !r.trim().is_empty()) {
        let mut coords = Vec::new();
        for point in ring.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (lat, lon) = point
                .split_once(',')
                .with_context(|| format!("Expected 'lat,lon' but got '{point}'"))?;
            let lat: f64 = lat
                .trim()
                .parse()
                .with_context(|| format!("Invalid latitude in '{point}'"))?;
            let lon: f64 = lon
                .trim()
                .parse()
                .with_context(|| format!("Invalid longitude in '{point}'"))?;
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                bail!("Point '{point}' is out of range");
            }
            coords.push(Coord {
                x: to_map_unit(lon) as f64,
                y: to_map_unit(lat) as f64,
            });
        }
        if coords.len() < 3 {
            bail!("A polygon needs at least 3 points, got {} in '{ring}'", coords.len());
        }
        polygons.push(Polygon::new(LineString::new(coords), Vec::new()));
    }
    if polygons.is_empty() {
        bail!("Empty polygon");
    }
    Ok(MultiPolygon::new(polygons))
}
