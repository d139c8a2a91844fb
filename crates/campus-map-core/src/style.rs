// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use serde_json::json;

pub const BUILDINGS_SOURCE: &str = "buildings-source";
pub const BUILDINGS_LAYER: &str = "3d-buildings";
pub const ROADS_SOURCE: &str = "roads-source";
pub const ROAD_LABELS_LAYER: &str = "road-labels";

pub const TARGET_COLOR: &str = "#F2C94C";
pub const BUILDING_COLOR: &str = "#d9d9d9";
pub const ROAD_LABEL_COLOR: &str = "#555";
pub const ROAD_LABEL_HALO: &str = "#fff";

/// A GeoJSON source plus the style layer drawn from it.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub source_id: &'static str,
    pub layer_id: &'static str,
    pub style: serde_json::Value,
}

/// Extruded buildings: height from `renderHeight`, targets highlighted.
pub fn buildings_layer() -> LayerSpec {
    LayerSpec {
        source_id: BUILDINGS_SOURCE,
        layer_id: BUILDINGS_LAYER,
        style: json!({
            "id": BUILDINGS_LAYER,
            "type": "fill-extrusion",
            "source": BUILDINGS_SOURCE,
            "paint": {
                "fill-extrusion-color": [
                    "case",
                    ["boolean", ["get", "isTarget"], false],
                    TARGET_COLOR,
                    BUILDING_COLOR
                ],
                "fill-extrusion-height": ["get", "renderHeight"],
                "fill-extrusion-base": 0,
                "fill-extrusion-opacity": 1,
                "fill-extrusion-vertical-gradient": true
            }
        }),
    }
}

/// Road names drawn along their lines.
pub fn road_labels_layer() -> LayerSpec {
    LayerSpec {
        source_id: ROADS_SOURCE,
        layer_id: ROAD_LABELS_LAYER,
        style: json!({
            "id": ROAD_LABELS_LAYER,
            "type": "symbol",
            "source": ROADS_SOURCE,
            "layout": {
                "text-field": ["get", "name"],
                "text-font": ["Open Sans Semibold"],
                "text-size": 12,
                "symbol-placement": "line",
                "text-offset": [0, 0.5]
            },
            "paint": {
                "text-color": ROAD_LABEL_COLOR,
                "text-halo-color": ROAD_LABEL_HALO,
                "text-halo-width": 2
            }
        }),
    }
}
