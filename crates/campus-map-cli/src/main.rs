// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use anyhow::{bail, Context, Result};
use campus_map_core::config::MapConfig;
use campus_map_core::surface::HeadlessSurface;
use campus_map_core::viewport::ViewportState;
use campus_map_core::{
    BoundingBox, FetchPipeline, LngLat, MapEvent, MapSession, RenderLayers, ViewportController,
};
use clap::{ArgAction, Parser, Subcommand};
use log::{info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config.json (defaults to the platform config directory)
    #[arg(long, env = "CAMPUS_MAP_CONFIG")]
    config: Option<PathBuf>,

    /// Overpass interpreter endpoint
    #[arg(long, env = "CAMPUS_MAP_OVERPASS_URL")]
    overpass_url: Option<String>,

    /// Directory for cached regions
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List destination buildings and height overrides
    Targets,
    /// Fetch and classify a region, from cache when fresh
    Fetch {
        /// Region as west,south,east,north (defaults to the campus bounds)
        #[arg(long, allow_hyphen_values = true)]
        bbox: Option<BoundingBox>,
        /// Write the buildings and roads layers as GeoJSON
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show where a search for a destination flies the camera
    FlyTo { name: String },
    /// Show how a camera resting at LON LAT is pulled back into bounds
    Bounds {
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
    },
    /// Inspect or empty the region cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Run a headless map session through the initial load
    Preview {
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 800)]
        height: u32,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached region keys with their age
    List,
    /// Delete every cached region
    Clear,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str("campus_map")
        .build();
    // Fails only if a logger is already installed.
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

fn load_config(cli: &Cli) -> Result<MapConfig> {
    let mut config = match &cli.config {
        Some(path) => MapConfig::load(path)?,
        None => MapConfig::load_default()?,
    };
    if let Some(url) = &cli.overpass_url {
        config.overpass_url = url.clone();
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    Ok(config)
}

fn print_camera(camera: &ViewportState) {
    println!(
        "center {:.5}, {:.5}  zoom {}  pitch {}  bearing {}",
        camera.center.lon, camera.center.lat, camera.zoom, camera.pitch, camera.bearing
    );
}

fn print_summary(layers: &RenderLayers) {
    println!(
        "{} buildings, {} destinations, {} labelled roads",
        layers.buildings.len(),
        layers.targets().count(),
        layers.roads.len()
    );
    for b in layers.targets() {
        println!(
            "  [*] {} ({}m)",
            b.name.as_deref().unwrap_or("Building"),
            b.render_height
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(&cli)?;
    let catalog = config.catalog()?;

    match &cli.command {
        Commands::Targets => {
            println!("{} ({} destinations)", catalog.name, catalog.targets.len());
            for target in &catalog.targets {
                println!(
                    "  {:<28} {:.5}, {:.5}",
                    target.name, target.coordinates.lon, target.coordinates.lat
                );
            }
            println!("Height overrides:");
            for entry in &catalog.height_overrides {
                println!("  {:<28} {}m", entry.key, entry.meters);
            }
        }
        Commands::Fetch { bbox, out } => {
            let bbox = bbox.unwrap_or(catalog.bounds);
            let pipeline = FetchPipeline::new(config.file_cache(), config.overpass()?, catalog)
                .with_ttl(config.ttl());

            info!("Fetching region — bbox={}", bbox.cache_key());
            let layers = pipeline
                .fetch_region(&bbox)
                .await
                .context("Could not load buildings")?;
            print_summary(&layers);

            if let Some(path) = out {
                let document = serde_json::json!({
                    "buildings": layers.buildings_geojson(),
                    "roads": layers.roads_geojson(),
                });
                let content = serde_json::to_string_pretty(&document)?;
                std::fs::write(path, content)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote {}", path.display());
            }
        }
        Commands::FlyTo { name } => {
            let surface = HeadlessSurface::new(catalog.initial_view);
            let mut controller = ViewportController::new(surface, catalog, config.settings());
            if !controller.fly_to_destination(name) {
                bail!("No destination named '{}'. Run `campus-map targets` for the list.", name);
            }
            print_camera(&controller.viewport());
        }
        Commands::Bounds { lon, lat } => {
            let camera = ViewportState {
                center: LngLat::new(*lon, *lat),
                ..catalog.initial_view
            };
            let settings = config.settings();
            let debounce = settings.settle_debounce;
            let surface = HeadlessSurface::new(camera);
            let mut controller = ViewportController::new(surface, catalog, settings);

            let now = Instant::now();
            controller.on_settle(camera, now);
            if controller.poll_settle(now + debounce) {
                let ease = controller
                    .surface()
                    .and_then(|s| s.eases.last())
                    .context("Correction was not recorded")?;
                println!(
                    "Outside campus: easing to {:.5}, {:.5} over {}ms",
                    ease.center.lon,
                    ease.center.lat,
                    ease.duration.as_millis()
                );
            } else {
                println!("Inside campus bounds, camera stays put");
            }
        }
        Commands::Cache { action } => {
            let cache = config.file_cache();
            match action {
                CacheAction::List => {
                    use campus_map_core::cache::RegionCache;

                    let keys = cache.keys()?;
                    println!("{} cached regions in {}", keys.len(), cache.dir().display());
                    let now = chrono::Utc::now();
                    for key in keys {
                        match cache.get(&key) {
                            Ok(Some(entry)) => {
                                let state = if entry.is_fresh(now, config.ttl()) {
                                    "fresh"
                                } else {
                                    "stale"
                                };
                                let age = match entry.age(now) {
                                    Some(age) => {
                                        format!("{}h{:02}m", age.num_hours(), age.num_minutes() % 60)
                                    }
                                    None => "unknown age".to_string(),
                                };
                                println!("  {}  {}  {}", key, age, state);
                            }
                            Ok(None) => {}
                            Err(e) => println!("  {}  unreadable ({})", key, e),
                        }
                    }
                }
                CacheAction::Clear => {
                    let removed = cache.clear()?;
                    println!("Removed {} cached regions", removed);
                }
            }
        }
        Commands::Preview { width, height } => {
            let view = catalog.initial_view;
            let visible = BoundingBox::visible_from(view.center, view.zoom, *width, *height)?;
            let pipeline = FetchPipeline::new(config.file_cache(), config.overpass()?, catalog.clone())
                .with_ttl(config.ttl());
            let controller =
                ViewportController::new(HeadlessSurface::new(view), catalog, config.settings());

            let (tx, rx) = mpsc::unbounded_channel();
            tx.send(MapEvent::Loaded { visible })?;
            drop(tx);

            println!("Loading {} then the campus bounds", visible.cache_key());
            let surface = MapSession::new(pipeline, controller)
                .run(rx)
                .await
                .context("Map surface was not released")?;

            for (source, (layer, data)) in &surface.layers {
                println!("  {:<18} {:<14} {} features", source, layer.layer_id, data.features.len());
            }
            if surface.layers.is_empty() {
                println!("No layers were loaded");
            }
            print_camera(&surface.camera);
        }
    }

    Ok(())
}
