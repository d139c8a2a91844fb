// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use geojson::{FeatureCollection, JsonObject, JsonValue};
use log::debug;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::geo::LngLat;
use crate::style::LayerSpec;
use crate::viewport::ViewportState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    /// `t * (2 - t)`
    EaseOutQuad,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseOutQuad => t * (2.0 - t),
        }
    }
}

/// A short camera animation towards a new center at a fixed zoom.
#[derive(Debug, Clone, PartialEq)]
pub struct EaseTo {
    pub center: LngLat,
    pub zoom: f64,
    pub duration: Duration,
    pub easing: Easing,
}

/// A zoom-out/zoom-in flight. `None` keeps the current pitch or bearing.
#[derive(Debug, Clone, PartialEq)]
pub struct FlyTo {
    pub center: LngLat,
    pub zoom: f64,
    pub pitch: Option<f64>,
    pub bearing: Option<f64>,
    pub speed: f64,
    pub curve: f64,
    /// Animate even when the user prefers reduced motion.
    pub essential: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupContent {
    pub title: String,
    pub address: Option<String>,
    pub height: Option<String>,
}

fn prop_text(props: &JsonObject, key: &str) -> Option<String> {
    match props.get(key)? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl PopupContent {
    pub fn from_properties(props: &JsonObject) -> Self {
        let title = prop_text(props, "name").unwrap_or_else(|| "Building".to_string());
        let address = prop_text(props, "addr:street").map(|street| {
            let number = prop_text(props, "addr:housenumber").unwrap_or_default();
            format!("{} {}", number, street).trim().to_string()
        });
        let height = prop_text(props, "height");

        Self {
            title,
            address,
            height,
        }
    }

    pub fn to_html(&self) -> String {
        use html_escape::encode_text;

        let mut html =
            String::from(r#"<div style="padding: 5px; color: #333; font-family: sans-serif;">"#);
        html.push_str(&format!(
            r#"<h3 style="margin: 0 0 5px;">{}</h3>"#,
            encode_text(&self.title)
        ));
        if let Some(address) = &self.address {
            html.push_str(&format!(
                r#"<p style="margin: 0;">{}</p>"#,
                encode_text(address)
            ));
        }
        if let Some(height) = &self.height {
            html.push_str(&format!(
                r#"<p style="margin: 5px 0 0; font-size: 0.9em; color: #666;">Height: {}m</p>"#,
                encode_text(height)
            ));
        }
        html.push_str("</div>");
        html
    }
}

/// The rendering sink the viewport controller drives.
pub trait MapSurface {
    /// Replaces the data of `layer.source_id`, creating the source and its
    /// style layer on first use.
    fn set_layer(&mut self, layer: &LayerSpec, data: FeatureCollection);
    fn set_loading(&mut self, loading: bool);
    fn ease_to(&mut self, ease: &EaseTo);
    fn fly_to(&mut self, flight: &FlyTo);
    fn show_popup(&mut self, at: LngLat, content: &PopupContent);
    /// Releases everything the surface holds. Called exactly once.
    fn remove(&mut self);
}

/// A surface with no renderer that records what it was asked to show.
/// Camera motions complete instantly. The recorded layers stay readable
/// after removal.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    pub camera: ViewportState,
    pub layers: BTreeMap<&'static str, (LayerSpec, FeatureCollection)>,
    pub layer_updates: usize,
    pub loading: bool,
    pub eases: Vec<EaseTo>,
    pub flights: Vec<FlyTo>,
    pub popups: Vec<(LngLat, PopupContent)>,
    pub removed: bool,
}

impl HeadlessSurface {
    pub fn new(camera: ViewportState) -> Self {
        Self {
            camera,
            layers: BTreeMap::new(),
            layer_updates: 0,
            loading: false,
            eases: Vec::new(),
            flights: Vec::new(),
            popups: Vec::new(),
            removed: false,
        }
    }

    pub fn layer(&self, source_id: &str) -> Option<&FeatureCollection> {
        self.layers.get(source_id).map(|(_, data)| data)
    }
}

impl MapSurface for HeadlessSurface {
    fn set_layer(&mut self, layer: &LayerSpec, data: FeatureCollection) {
        debug!(
            "Headless layer update — source={} features={}",
            layer.source_id,
            data.features.len()
        );
        self.layers.insert(layer.source_id, (layer.clone(), data));
        self.layer_updates += 1;
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    fn ease_to(&mut self, ease: &EaseTo) {
        self.camera.center = ease.center;
        self.camera.zoom = ease.zoom;
        self.eases.push(ease.clone());
    }

    fn fly_to(&mut self, flight: &FlyTo) {
        self.camera.center = flight.center;
        self.camera.zoom = flight.zoom;
        if let Some(pitch) = flight.pitch {
            self.camera.pitch = pitch;
        }
        if let Some(bearing) = flight.bearing {
            self.camera.bearing = bearing;
        }
        self.flights.push(flight.clone());
    }

    fn show_popup(&mut self, at: LngLat, content: &PopupContent) {
        self.popups.push((at, content.clone()));
    }

    fn remove(&mut self) {
        self.loading = false;
        self.removed = true;
    }
}
