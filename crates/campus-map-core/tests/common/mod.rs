// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

#![allow(dead_code)]

use campus_map_core::overpass::{FetchError, OverpassResponse, OverpassSource};
use campus_map_core::{BoundingBox, Catalog};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Canned Overpass backend that counts the queries it answers.
pub struct CountingOverpass {
    calls: AtomicUsize,
    latency: Duration,
    fail: bool,
}

impl CountingOverpass {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OverpassSource for CountingOverpass {
    async fn query(&self, ql: &str) -> Result<OverpassResponse, FetchError> {
        assert!(ql.starts_with("[out:json][timeout:25];"));
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail {
            return Err(FetchError::Status { status: 429 });
        }
        Ok(sample_response())
    }
}

/// Moontower, an unnamed garage, a five-storey hall and two streets.
pub fn sample_response() -> OverpassResponse {
    serde_json::from_value(json!({
        "version": 0.6,
        "generator": "Overpass API",
        "elements": [
            {"type": "node", "id": 1, "lat": 30.2838, "lon": -97.7422},
            {"type": "node", "id": 2, "lat": 30.2838, "lon": -97.7420},
            {"type": "node", "id": 3, "lat": 30.2840, "lon": -97.7420},
            {"type": "node", "id": 4, "lat": 30.2840, "lon": -97.7422},
            {"type": "node", "id": 5, "lat": 30.2850, "lon": -97.7430},
            {"type": "node", "id": 6, "lat": 30.2850, "lon": -97.7425},
            {"type": "node", "id": 7, "lat": 30.2853, "lon": -97.7425},
            {"type": "way", "id": 100, "nodes": [1, 2, 3, 4, 1],
             "tags": {"building": "apartments", "name": "Moontower", "height": "50"}},
            {"type": "way", "id": 101, "nodes": [5, 6, 7, 5],
             "tags": {"building": "parking"}},
            {"type": "way", "id": 102, "nodes": [1, 3, 4, 1],
             "tags": {"building": "yes", "building:levels": "5", "name": "Graduate Hall"}},
            {"type": "way", "id": 200, "nodes": [1, 5],
             "tags": {"highway": "residential", "name": "Nueces Street"}},
            {"type": "way", "id": 201, "nodes": [2, 6],
             "tags": {"highway": "tertiary"}}
        ]
    }))
    .unwrap()
}

pub fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::builtin().clone())
}

pub fn viewport_bbox() -> BoundingBox {
    BoundingBox::new(-97.745, 30.283, -97.739, 30.293).unwrap()
}
