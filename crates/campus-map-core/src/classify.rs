// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use geojson::{Feature, FeatureCollection, JsonObject, JsonValue, Value};
use log::debug;

use crate::catalog::Catalog;

/// Lowest extrusion height, in meters, that still reads as a building.
pub const MIN_RENDER_HEIGHT: f64 = 6.0;
pub const METERS_PER_LEVEL: f64 = 3.5;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderableBuilding {
    pub feature: Feature,
    pub name: Option<String>,
    pub is_target: bool,
    pub render_height: f64,
}

impl RenderableBuilding {
    /// The source feature with `isTarget` and `renderHeight` added.
    pub fn to_feature(&self) -> Feature {
        let mut feature = self.feature.clone();
        let props = feature.properties.get_or_insert_with(JsonObject::new);
        props.insert("isTarget".to_string(), JsonValue::Bool(self.is_target));
        props.insert("renderHeight".to_string(), JsonValue::from(self.render_height));
        feature
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderableRoad {
    pub feature: Feature,
    pub name: String,
    pub highway: String,
}

/// Both layers derived from one fetched region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderLayers {
    pub buildings: Vec<RenderableBuilding>,
    pub roads: Vec<RenderableRoad>,
}

impl RenderLayers {
    pub fn buildings_geojson(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.buildings.iter().map(|b| b.to_feature()).collect(),
            foreign_members: None,
        }
    }

    pub fn roads_geojson(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.roads.iter().map(|r| r.feature.clone()).collect(),
            foreign_members: None,
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = &RenderableBuilding> {
        self.buildings.iter().filter(|b| b.is_target)
    }
}

/// JavaScript-style truthiness of a property value.
fn is_truthy(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::String(s)) => !s.is_empty(),
        Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(_) => true,
    }
}

fn text(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses the leading decimal number of `s`, ignoring leading whitespace and
/// any trailing unit such as `"12 m"`.
fn parse_leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return None;
    }
    // Exponent only counts when at least one digit follows it.
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }
        let digits = bytes[exp.min(bytes.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits > 0 {
            end = exp + digits;
        }
    }
    s[..end].parse().ok()
}

fn numeric(value: Option<&JsonValue>) -> Option<f64> {
    match value? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => parse_leading_float(s),
        _ => None,
    }
}

fn positive(h: Option<f64>) -> Option<f64> {
    h.filter(|h| h.is_finite() && *h > 0.0)
}

/// Resolves the extrusion height of a building in meters.
///
/// Priority: catalog override by name, explicit `height`, then
/// `building:levels` times 3.5. Anything missing, unparsable or below the
/// floor renders at [`MIN_RENDER_HEIGHT`].
pub fn resolve_height(lower_name: &str, props: &JsonObject, catalog: &Catalog) -> f64 {
    let h = positive(catalog.height_override(lower_name))
        .or_else(|| positive(numeric(props.get("height"))))
        .or_else(|| positive(numeric(props.get("building:levels")).map(|l| l * METERS_PER_LEVEL)));

    match h {
        Some(h) if h >= MIN_RENDER_HEIGHT => h,
        _ => MIN_RENDER_HEIGHT,
    }
}

fn is_building_geometry(feature: &Feature) -> bool {
    matches!(
        feature.geometry.as_ref().map(|g| &g.value),
        Some(Value::Polygon(_)) | Some(Value::MultiPolygon(_))
    )
}

fn is_line_geometry(feature: &Feature) -> bool {
    matches!(
        feature.geometry.as_ref().map(|g| &g.value),
        Some(Value::LineString(_))
    )
}

fn classify_building(feature: &Feature, catalog: &Catalog) -> Option<RenderableBuilding> {
    let props = feature.properties.as_ref()?;
    let tagged = is_truthy(props.get("building")) || is_truthy(props.get("building:part"));
    if !tagged || !is_building_geometry(feature) {
        return None;
    }

    let name = text(props.get("name"));
    let lower_name = name.as_deref().unwrap_or_default().to_lowercase();

    Some(RenderableBuilding {
        feature: feature.clone(),
        is_target: catalog.matching_target(&lower_name).is_some(),
        render_height: resolve_height(&lower_name, props, catalog),
        name,
    })
}

fn classify_road(feature: &Feature) -> Option<RenderableRoad> {
    let props = feature.properties.as_ref()?;
    if !is_truthy(props.get("highway")) || !is_line_geometry(feature) {
        return None;
    }
    let name = text(props.get("name"))?;
    let highway = text(props.get("highway")).unwrap_or_default();

    Some(RenderableRoad {
        feature: feature.clone(),
        name,
        highway,
    })
}

/// Splits raw features into the buildings and road-label layers.
pub fn classify(raw: &FeatureCollection, catalog: &Catalog) -> RenderLayers {
    let buildings: Vec<_> = raw
        .features
        .iter()
        .filter_map(|f| classify_building(f, catalog))
        .collect();
    let roads: Vec<_> = raw.features.iter().filter_map(classify_road).collect();

    debug!(
        "Classified features — raw={} buildings={} targets={} roads={}",
        raw.features.len(),
        buildings.len(),
        buildings.iter().filter(|b| b.is_target).count(),
        roads.len()
    );

    RenderLayers { buildings, roads }
}
