// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::geo::{BoundingBox, LngLat};
use crate::viewport::ViewportState;
use crate::MapError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetBuilding {
    pub name: String,
    pub coordinates: LngLat,
}

/// Height in meters for any building whose lowercased name contains `key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightOverride {
    pub key: String,
    pub meters: f64,
}

/// Fixed reference data for one campus area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub name: String,
    pub bounds: BoundingBox,
    pub initial_view: ViewportState,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub targets: Vec<TargetBuilding>,
    #[serde(default)]
    pub height_overrides: Vec<HeightOverride>,
}

static BUILTIN: OnceLock<Catalog> = OnceLock::new();

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> &'static Catalog {
        BUILTIN.get_or_init(|| {
            Self::from_json_str(include_str!("catalog.json"))
                .expect("Failed to parse catalog.json")
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self, MapError> {
        let mut catalog: Catalog = serde_json::from_str(content)?;
        for entry in &mut catalog.height_overrides {
            entry.key = entry.key.to_lowercase();
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, MapError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Exact, case-sensitive lookup used by destination search.
    pub fn find_target(&self, name: &str) -> Option<&TargetBuilding> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// First target whose lowercased name occurs inside `lower_name`.
    ///
    /// Substring matching means a short target name can match unrelated
    /// buildings that happen to contain it.
    pub fn matching_target(&self, lower_name: &str) -> Option<&TargetBuilding> {
        if lower_name.is_empty() {
            return None;
        }
        self.targets
            .iter()
            .find(|t| lower_name.contains(&t.name.to_lowercase()))
    }

    /// Height of the first override key contained in `lower_name`.
    pub fn height_override(&self, lower_name: &str) -> Option<f64> {
        if lower_name.is_empty() {
            return None;
        }
        self.height_overrides
            .iter()
            .find(|o| lower_name.contains(o.key.as_str()))
            .map(|o| o.meters)
    }
}
