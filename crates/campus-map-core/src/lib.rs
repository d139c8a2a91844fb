// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

pub mod cache;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod convert;
pub mod geo;
pub mod overpass;
pub mod pipeline;
pub mod session;
pub mod style;
pub mod surface;
pub mod timer;
pub mod viewport;

use std::path::PathBuf;
use thiserror::Error;

pub use catalog::Catalog;
pub use classify::{classify, RenderLayers, RenderableBuilding, RenderableRoad};
pub use geo::{BoundingBox, LngLat};
pub use pipeline::FetchPipeline;
pub use session::{MapEvent, MapSession};
pub use viewport::{ViewportController, ViewportState};

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Invalid bounding box: west={west} south={south} east={east} north={north}")]
    InvalidBounds {
        west: f64,
        south: f64,
        east: f64,
        north: f64,
    },
    #[error("Expected bounding box as west,south,east,north, got '{0}'")]
    BoundsSyntax(String),
    #[error("Invalid catalog: {0}")]
    Catalog(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory holding `config.json`.
pub fn get_config_root() -> PathBuf {
    directories::ProjectDirs::from("org", "campus-map", "CampusMap")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default directory for the persistent region cache.
pub fn get_cache_root() -> PathBuf {
    directories::ProjectDirs::from("org", "campus-map", "CampusMap")
        .map(|dirs| dirs.cache_dir().join("regions"))
        .unwrap_or_else(|| PathBuf::from("region_cache"))
}
