// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use geojson::Feature;
use log::{debug, info};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::cache::RegionCache;
use crate::classify::RenderLayers;
use crate::geo::{BoundingBox, LngLat};
use crate::overpass::{FetchError, OverpassSource};
use crate::pipeline::FetchPipeline;
use crate::surface::MapSurface;
use crate::viewport::{ViewportController, ViewportState};

/// Everything the map surface and its page can tell the session.
#[derive(Debug, Clone)]
pub enum MapEvent {
    /// The surface finished loading and shows `visible`.
    Loaded { visible: BoundingBox },
    /// A camera move ended.
    MoveSettled { camera: ViewportState },
    BuildingClicked { feature: Feature, at: LngLat },
    DestinationSelected { name: String },
    /// Tear down now, abandoning in-flight fetches.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPurpose {
    /// What the camera shows on load.
    Viewport,
    /// The whole campus, fetched after the viewport.
    Campus,
}

type FetchOutcome = (FetchPurpose, Result<RenderLayers, FetchError>);

fn start_fetch<'a, C: RegionCache + 'a, S: OverpassSource + 'a>(
    pipeline: &'a FetchPipeline<C, S>,
    purpose: FetchPurpose,
    bbox: BoundingBox,
) -> LocalBoxFuture<'a, FetchOutcome> {
    async move { (purpose, pipeline.fetch_region(&bbox).await) }.boxed_local()
}

/// One mounted map: the fetch pipeline plus the controller that owns the
/// surface, driven by [`MapEvent`]s on a single task.
pub struct MapSession<C, S, M: MapSurface> {
    pipeline: FetchPipeline<C, S>,
    controller: ViewportController<M>,
}

impl<C: RegionCache, S: OverpassSource, M: MapSurface> MapSession<C, S, M> {
    pub fn new(pipeline: FetchPipeline<C, S>, controller: ViewportController<M>) -> Self {
        Self {
            pipeline,
            controller,
        }
    }

    pub fn pipeline(&self) -> &FetchPipeline<C, S> {
        &self.pipeline
    }

    pub fn controller(&self) -> &ViewportController<M> {
        &self.controller
    }

    /// Processes events until `Shutdown`, or until the sender is dropped and
    /// every started fetch has finished. Returns the released surface.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<MapEvent>) -> Option<M> {
        let MapSession {
            pipeline,
            mut controller,
        } = self;
        let pipeline = &pipeline;
        let campus = controller.catalog().bounds;

        let mut fetches = FuturesUnordered::new();
        let mut accepting = true;

        loop {
            if !accepting && fetches.is_empty() {
                break;
            }

            let deadline = controller.settle_deadline();
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                event = events.recv(), if accepting => {
                    let Some(event) = event else {
                        debug!("Event channel closed, draining fetches — pending={}", fetches.len());
                        accepting = false;
                        continue;
                    };
                    match event {
                        MapEvent::Loaded { visible } => {
                            fetches.push(start_fetch(pipeline, FetchPurpose::Viewport, visible));
                            controller.set_loading(true);
                        }
                        MapEvent::MoveSettled { camera } => controller.on_settle(camera, Instant::now()),
                        MapEvent::BuildingClicked { feature, at } => {
                            controller.on_building_clicked(&feature, at)
                        }
                        MapEvent::DestinationSelected { name } => {
                            controller.fly_to_destination(&name);
                        }
                        MapEvent::Shutdown => {
                            info!("Map session shutting down — abandoned_fetches={}", fetches.len());
                            break;
                        }
                    }
                }
                Some((purpose, result)) = fetches.next(), if !fetches.is_empty() => {
                    if let Ok(layers) = &result {
                        debug!(
                            "Applying layers — purpose={:?} buildings={} roads={}",
                            purpose,
                            layers.buildings.len(),
                            layers.roads.len()
                        );
                        controller.apply_layers(layers);
                    }
                    // Failures were logged by the pipeline; the last layers stay.
                    if purpose == FetchPurpose::Viewport {
                        fetches.push(start_fetch(pipeline, FetchPurpose::Campus, campus));
                    }
                    controller.set_loading(pipeline.is_loading() || !fetches.is_empty());
                }
                _ = sleep_until(wake_at), if deadline.is_some() => {
                    controller.poll_settle(Instant::now());
                }
            }
        }

        drop(fetches);
        controller.teardown()
    }
}
