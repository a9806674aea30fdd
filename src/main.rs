//! # Tile-splitter CLI
//!
//! Command-line interface for the tile-splitter library.
//! Builds a density grid and prints the tiles of the split as JSON.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use tile_splitter::{NamedPolygon, Partitioner, SplitArea, SplitConfig};

mod cli;

/// Command-line interface for tile-splitter
#[derive(Parser, Debug)]
#[command(name = "tile-splitter")]
#[command(about = "Splits a node density grid into balanced rectangular tiles")]
#[command(long_about = "Splits a node density grid into rectangular tiles holding at most max-nodes nodes:
  tile-splitter                                  # Split a synthetic grid, JSON to stdout
  tile-splitter --max-nodes 200000 -o tiles.json # Smaller tiles, written to a file
  tile-splitter --num-tiles 12                   # Aim for exactly 12 tiles
  tile-splitter --polygon \"50,4;51,4;51,5\"       # Only the part inside a polygon (lat,lon in degrees)

Settings can also be read from a TOML file with --config, command-line
values take precedence.")]
#[command(version = env!("SPLITTER_VERSION"))]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of nodes in one tile
    #[arg(short = 'm', long)]
    max_nodes: Option<u64>,

    /// Bad split candidates a solver may test before giving up on a tile
    #[arg(long)]
    search_limit: Option<u32>,

    /// Wanted number of tiles
    #[arg(short = 'n', long)]
    num_tiles: Option<usize>,

    /// Keep empty borders so that the tiles cover the whole grid
    #[arg(long)]
    no_trim: bool,

    /// Accept tiles without nodes
    #[arg(long)]
    allow_empty: bool,

    /// Synthetic grid width in cells
    #[arg(long, default_value_t = 64)]
    width: i32,

    /// Synthetic grid height in cells
    #[arg(long, default_value_t = 64)]
    height: i32,

    /// Cell size as a power of two in map units
    #[arg(long, default_value_t = 11, value_parser = clap::value_parser!(u32).range(0..=24))]
    shift: u32,

    /// Number of node clusters
    #[arg(long, default_value_t = 5)]
    clusters: usize,

    /// Number of nodes
    #[arg(long, default_value_t = 5_000_000)]
    points: u64,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Latitude of the south west corner in degrees
    #[arg(long, default_value_t = 50.0, allow_hyphen_values = true)]
    origin_lat: f64,

    /// Longitude of the south west corner in degrees
    #[arg(long, default_value_t = 4.0, allow_hyphen_values = true)]
    origin_lon: f64,

    /// Bounding polygon "lat,lon;lat,lon;...", repeat for several named polygons
    #[arg(short, long, allow_hyphen_values = true)]
    polygon: Vec<String>,

    /// Output file path, or "-" for stdout
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Show the settings and the grid without splitting
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr
    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(cli) {
        error!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.verbose {
        eprintln!("Tile-splitter v{} starting...", env!("SPLITTER_VERSION"));
    }

    let config = build_config(&cli)?;
    if cli.num_tiles.is_some() && !cli.polygon.is_empty() {
        bail!("--num-tiles cannot be combined with --polygon");
    }
    let polygons = cli
        .polygon
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let polygon = cli::parse_polygon(text).with_context(|| format!("Invalid polygon '{text}'"))?;
            Ok(NamedPolygon::new(format!("polygon-{}", i + 1), polygon))
        })
        .collect::<Result<Vec<_>>>()?;

    let synthetic = cli::SyntheticGrid {
        width: cli.width,
        height: cli.height,
        shift: cli.shift,
        clusters: cli.clusters,
        points: cli.points,
        seed: cli.seed,
        origin_lat: cli.origin_lat,
        origin_lon: cli.origin_lon,
    };

    if cli.dry_run {
        eprintln!(
            "[DRY RUN] Would split a {}x{} grid covering {} with {} nodes in {} clusters",
            cli.width,
            cli.height,
            synthetic.bounds(),
            cli.points,
            cli.clusters
        );
        eprintln!("[DRY RUN] Settings:\n{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let grid = synthetic.generate().context("Failed to build the density grid")?;
    info!(
        "Grid of {}x{} cells covers {} and holds {} nodes",
        grid.width(),
        grid.height(),
        grid.bounds(),
        grid.total_count()
    );

    let progress = cli::ProgressManager::new("Splitting density grid");
    let mut partitioner = Partitioner::new(grid, config)
        .context("Invalid configuration")?
        .with_progress(progress.callback());
    let areas = match (cli.num_tiles, polygons.len()) {
        (Some(n), _) => partitioner.split_into(n)?,
        (None, 0) => partitioner.split()?,
        (None, 1) => partitioner.split_polygon(&polygons[0].polygon)?,
        (None, _) => partitioner.split_named(&polygons)?,
    };
    progress.finish();

    write_areas(&areas, &cli.output)?;
    info!("Wrote {} areas", areas.len());
    Ok(())
}

/// Configuration file values overridden by command-line options
fn build_config(cli: &Cli) -> Result<SplitConfig> {
    let mut config = match &cli.config {
        Some(path) => SplitConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => SplitConfig::default(),
    };
    if let Some(max_nodes) = cli.max_nodes {
        config.max_nodes = max_nodes;
    }
    if let Some(search_limit) = cli.search_limit {
        config.search_limit = search_limit;
    }
    if cli.no_trim {
        config.trim_shape = false;
    }
    if cli.allow_empty {
        config.allow_empty = true;
    }
    config.validate()?;
    Ok(config)
}

fn write_areas(areas: &[SplitArea], output: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(areas)?;
    if output == "-" {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{json}").context("Failed to write to stdout")?;
    } else {
        fs::write(output, format!("{json}\n")).with_context(|| format!("Failed to write {output}"))?;
        eprintln!("Saved to: {output}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_defaults() {
        let cli = Cli::parse_from(["tile-splitter", "--max-nodes", "1000", "--no-trim", "--allow-empty"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.max_nodes, 1000);
        assert!(!config.trim_shape);
        assert!(config.allow_empty);
        assert_eq!(config.search_limit, SplitConfig::default().search_limit);
    }

    #[test]
    fn test_cli_rejects_zero_max_nodes() {
        let cli = Cli::parse_from(["tile-splitter", "--max-nodes", "0"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_negative_origin() {
        let cli = Cli::parse_from(["tile-splitter", "--origin-lat", "-33.5", "--origin-lon", "-70"]);
        assert_eq!(cli.origin_lat, -33.5);
        assert_eq!(cli.origin_lon, -70.0);
    }

    #[test]
    fn test_shift_range() {
        assert!(Cli::try_parse_from(["tile-splitter", "--shift", "25"]).is_err());
    }
}
