// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::{CacheEntry, RegionCache, DEFAULT_TTL_HOURS};
use crate::catalog::Catalog;
use crate::classify::{classify, RenderLayers};
use crate::convert::to_feature_collection;
use crate::geo::BoundingBox;
use crate::overpass::{build_query, FetchError, OverpassResponse, OverpassSource};

/// Turns a bounding box into render layers, going to the network only when
/// the cache has nothing fresh for that exact box.
pub struct FetchPipeline<C, S> {
    cache: C,
    source: S,
    catalog: Arc<Catalog>,
    ttl: chrono::Duration,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight count when a fetch ends, however it ends.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<C: RegionCache, S: OverpassSource> FetchPipeline<C, S> {
    pub fn new(cache: C, source: S, catalog: Arc<Catalog>) -> Self {
        Self {
            cache,
            source,
            catalog,
            ttl: chrono::Duration::hours(DEFAULT_TTL_HOURS),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Region fetches currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight() > 0
    }

    /// Returns the raw Overpass document for `bbox`, from cache when fresh.
    pub async fn fetch_raw(&self, bbox: &BoundingBox) -> Result<OverpassResponse, FetchError> {
        let key = bbox.cache_key();
        let now = chrono::Utc::now();

        match self.cache.get(&key) {
            Ok(Some(entry)) if entry.is_fresh(now, self.ttl) => {
                debug!(
                    "Region cache hit — key={} age_secs={}",
                    key,
                    entry.age(now).map_or(0, |age| age.num_seconds())
                );
                return Ok(entry.data);
            }
            Ok(Some(entry)) => match entry.age(now) {
                Some(age) => debug!(
                    "Region cache stale — key={} age_secs={}",
                    key,
                    age.num_seconds()
                ),
                None => warn!(
                    "Region cache entry has an unusable timestamp — key={} timestamp={}",
                    key, entry.timestamp
                ),
            },
            Ok(None) => debug!("Region cache miss — key={}", key),
            Err(e) => {
                warn!("Discarding unreadable cache entry — key={} error={}", key, e);
                if let Err(e) = self.cache.remove(&key) {
                    warn!("Failed to remove cache entry — key={} error={}", key, e);
                }
            }
        }

        let data = self.source.query(&build_query(bbox)).await?;
        info!(
            "Fetched region — key={} elements={}",
            key,
            data.elements.len()
        );

        let entry = CacheEntry::new(chrono::Utc::now(), data);
        if let Err(e) = self.cache.set(&key, &entry) {
            warn!("Could not cache region, continuing — key={} error={}", key, e);
        }
        Ok(entry.data)
    }

    /// Fetches `bbox` and derives its building and road layers.
    pub async fn fetch_region(&self, bbox: &BoundingBox) -> Result<RenderLayers, FetchError> {
        let _guard = InFlight::enter(&self.in_flight);

        let data = self.fetch_raw(bbox).await.inspect_err(|e| {
            error!(
                "Error fetching buildings — bbox={} error={}",
                bbox.cache_key(),
                e
            )
        })?;

        let raw = to_feature_collection(&data);
        Ok(classify(&raw, &self.catalog))
    }
}
