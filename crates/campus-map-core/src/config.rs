// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{FileCache, DEFAULT_TTL_HOURS};
use crate::catalog::Catalog;
use crate::overpass::{HttpOverpass, DEFAULT_OVERPASS_URL};
use crate::viewport::ControllerSettings;

pub const CONFIG_FILE: &str = "config.json";

/// User settings, read from `config.json`. Every field is optional in the
/// file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub overpass_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub cache_ttl_hours: i64,
    /// Region cache directory. Defaults to the platform cache dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Replacement for the built-in West Campus catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
    pub settle_debounce_ms: u64,
    pub correction_duration_ms: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            request_timeout_secs: 30,
            user_agent: format!("campus-map/{}", env!("CARGO_PKG_VERSION")),
            cache_ttl_hours: DEFAULT_TTL_HOURS,
            cache_dir: None,
            catalog_path: None,
            settle_debounce_ms: 150,
            correction_duration_ms: 500,
        }
    }
}

impl MapConfig {
    pub fn default_path() -> PathBuf {
        crate::get_config_root().join(CONFIG_FILE)
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_ttl_hours)
    }

    pub fn settings(&self) -> ControllerSettings {
        ControllerSettings {
            settle_debounce: Duration::from_millis(self.settle_debounce_ms),
            correction_duration: Duration::from_millis(self.correction_duration_ms),
        }
    }

    pub fn catalog(&self) -> Result<Arc<Catalog>> {
        match &self.catalog_path {
            Some(path) => Catalog::load(path)
                .map(Arc::new)
                .with_context(|| format!("Failed to load catalog {}", path.display())),
            None => Ok(Arc::new(Catalog::builtin().clone())),
        }
    }

    pub fn file_cache(&self) -> FileCache {
        match &self.cache_dir {
            Some(dir) => FileCache::new(dir),
            None => FileCache::default_location(),
        }
    }

    pub fn overpass(&self) -> Result<HttpOverpass> {
        HttpOverpass::new(
            &self.overpass_url,
            Duration::from_secs(self.request_timeout_secs),
            &self.user_agent,
        )
        .context("Failed to build HTTP client")
    }
}
