// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use geojson::Feature;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::catalog::Catalog;
use crate::classify::RenderLayers;
use crate::geo::{centroid, LngLat};
use crate::style;
use crate::surface::{EaseTo, Easing, FlyTo, MapSurface, PopupContent};
use crate::timer::Debouncer;

pub const DEFAULT_SETTLE_DEBOUNCE: Duration = Duration::from_millis(150);
pub const DEFAULT_CORRECTION_DURATION: Duration = Duration::from_millis(500);

/// Camera position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub center: LngLat,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElasticState {
    /// Camera is left alone.
    Free,
    /// An automatic ease back into bounds is in flight.
    Correcting,
}

/// Flight used when a building is clicked.
const INSPECT_FLIGHT: FlightPreset = FlightPreset {
    zoom: 17.0,
    pitch: Some(45.0),
    bearing: None,
};

/// Flight used when a destination is picked from the catalog.
const DESTINATION_FLIGHT: FlightPreset = FlightPreset {
    zoom: 18.0,
    pitch: Some(60.0),
    bearing: Some(-17.0),
};

struct FlightPreset {
    zoom: f64,
    pitch: Option<f64>,
    bearing: Option<f64>,
}

impl FlightPreset {
    fn towards(&self, center: LngLat) -> FlyTo {
        FlyTo {
            center,
            zoom: self.zoom,
            pitch: self.pitch,
            bearing: self.bearing,
            speed: 0.5,
            curve: 1.0,
            essential: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub settle_debounce: Duration,
    pub correction_duration: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            settle_debounce: DEFAULT_SETTLE_DEBOUNCE,
            correction_duration: DEFAULT_CORRECTION_DURATION,
        }
    }
}

/// Owns the map surface and the camera, and keeps the camera loosely inside
/// the catalog bounds.
///
/// The camera may leave the bounds while the user drags. Once moves settle
/// and the debounce elapses, an out-of-bounds center is eased back to the
/// nearest point inside, keeping the zoom.
pub struct ViewportController<M: MapSurface> {
    surface: Option<M>,
    catalog: Arc<Catalog>,
    viewport: ViewportState,
    state: ElasticState,
    settle: Debouncer,
    correction_duration: Duration,
}

impl<M: MapSurface> ViewportController<M> {
    /// Mounts `surface` with the catalog's initial view.
    pub fn new(surface: M, catalog: Arc<Catalog>, settings: ControllerSettings) -> Self {
        let viewport = catalog.initial_view;
        Self {
            surface: Some(surface),
            catalog,
            viewport,
            state: ElasticState::Free,
            settle: Debouncer::new(settings.settle_debounce),
            correction_duration: settings.correction_duration,
        }
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    pub fn state(&self) -> ElasticState {
        self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn surface(&self) -> Option<&M> {
        self.surface.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.surface.is_some()
    }

    /// When the pending boundary check is due, if any.
    pub fn settle_deadline(&self) -> Option<Instant> {
        self.settle.deadline()
    }

    /// A camera move finished. Restarts the boundary-check debounce.
    pub fn on_settle(&mut self, camera: ViewportState, now: Instant) {
        if self.surface.is_none() {
            return;
        }
        self.viewport = camera;
        if self.state == ElasticState::Correcting {
            // The settle that ends our own ease.
            self.state = ElasticState::Free;
        }
        self.settle.arm(now);
    }

    /// Runs the boundary check if the debounce has elapsed. Returns `true`
    /// when a correction was started.
    pub fn poll_settle(&mut self, now: Instant) -> bool {
        if !self.settle.fire_if_due(now) {
            return false;
        }
        self.check_bounds()
    }

    fn check_bounds(&mut self) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };

        let (center, corrected) = self.catalog.bounds.clamp(self.viewport.center);
        if !corrected {
            return false;
        }

        debug!(
            "Camera outside campus bounds, easing back — from=({}, {}) to=({}, {})",
            self.viewport.center.lon, self.viewport.center.lat, center.lon, center.lat
        );
        let ease = EaseTo {
            center,
            zoom: self.viewport.zoom,
            duration: self.correction_duration,
            easing: Easing::EaseOutQuad,
        };
        surface.ease_to(&ease);
        self.viewport.center = center;
        self.state = ElasticState::Correcting;
        true
    }

    /// Flies to the clicked building and shows its details.
    pub fn on_building_clicked(&mut self, feature: &Feature, at: LngLat) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        let target = feature
            .geometry
            .as_ref()
            .and_then(|g| centroid(&g.value))
            .unwrap_or(at);
        let flight = INSPECT_FLIGHT.towards(target);
        surface.fly_to(&flight);
        self.apply_flight(&flight);

        let popup = feature
            .properties
            .as_ref()
            .map(PopupContent::from_properties)
            .unwrap_or_else(|| PopupContent::from_properties(&Default::default()));
        if let Some(surface) = self.surface.as_mut() {
            surface.show_popup(at, &popup);
        }
    }

    /// Flies to the catalog building called exactly `name`. Unknown or empty
    /// names leave the camera where it is. Returns whether a flight started.
    pub fn fly_to_destination(&mut self, name: &str) -> bool {
        if name.is_empty() || self.surface.is_none() {
            return false;
        }
        let Some(target) = self.catalog.find_target(name) else {
            debug!("Ignoring unknown destination — name={}", name);
            return false;
        };

        info!("Flying to destination — name={}", target.name);
        let flight = DESTINATION_FLIGHT.towards(target.coordinates);
        if let Some(surface) = self.surface.as_mut() {
            surface.fly_to(&flight);
        }
        self.apply_flight(&flight);
        true
    }

    fn apply_flight(&mut self, flight: &FlyTo) {
        self.viewport.center = flight.center;
        self.viewport.zoom = flight.zoom;
        if let Some(pitch) = flight.pitch {
            self.viewport.pitch = pitch;
        }
        if let Some(bearing) = flight.bearing {
            self.viewport.bearing = bearing;
        }
    }

    /// Replaces both map layers with `layers`.
    pub fn apply_layers(&mut self, layers: &RenderLayers) {
        let Some(surface) = self.surface.as_mut() else {
            debug!("Dropping layers for a torn-down surface");
            return;
        };
        surface.set_layer(&style::buildings_layer(), layers.buildings_geojson());
        surface.set_layer(&style::road_labels_layer(), layers.roads_geojson());
    }

    pub fn set_loading(&mut self, loading: bool) {
        if let Some(surface) = self.surface.as_mut() {
            surface.set_loading(loading);
        }
    }

    /// Cancels the pending boundary check and releases the surface.
    /// Returns the released surface; later calls return `None`.
    pub fn teardown(&mut self) -> Option<M> {
        self.settle.cancel();
        let mut surface = self.surface.take()?;
        surface.remove();
        Some(surface)
    }
}

impl<M: MapSurface> Drop for ViewportController<M> {
    fn drop(&mut self) {
        self.teardown();
    }
}
