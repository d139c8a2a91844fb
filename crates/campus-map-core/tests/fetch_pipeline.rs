// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

mod common;

use campus_map_core::cache::{CacheEntry, FileCache, MemoryCache, RegionCache};
use campus_map_core::FetchPipeline;
use chrono::{Duration, Utc};
use common::{catalog, sample_response, viewport_bbox, CountingOverpass};

#[tokio::test]
async fn test_repeat_fetch_is_served_from_cache() -> anyhow::Result<()> {
    let pipeline = FetchPipeline::new(MemoryCache::new(), CountingOverpass::new(), catalog());
    let bbox = viewport_bbox();

    let first = pipeline.fetch_region(&bbox).await?;
    let second = pipeline.fetch_region(&bbox).await?;

    assert_eq!(pipeline.source().calls(), 1, "second fetch must not hit the network");
    assert_eq!(first, second);
    assert!(pipeline.cache().contains(&bbox.cache_key()));
    Ok(())
}

#[tokio::test]
async fn test_region_layers_are_classified() -> anyhow::Result<()> {
    let pipeline = FetchPipeline::new(MemoryCache::new(), CountingOverpass::new(), catalog());
    let layers = pipeline.fetch_region(&viewport_bbox()).await?;

    let height_of = |name: Option<&str>| {
        layers
            .buildings
            .iter()
            .find(|b| b.name.as_deref() == name)
            .map(|b| b.render_height)
    };
    assert_eq!(layers.buildings.len(), 3);
    assert_eq!(height_of(Some("Moontower")), Some(70.0));
    assert_eq!(height_of(Some("Graduate Hall")), Some(17.5));
    assert_eq!(height_of(None), Some(6.0));

    let targets: Vec<_> = layers.targets().filter_map(|b| b.name.as_deref()).collect();
    assert_eq!(targets, vec!["Moontower"]);

    // The unnamed tertiary road gets no label.
    assert_eq!(layers.roads.len(), 1);
    assert_eq!(layers.roads[0].name, "Nueces Street");
    Ok(())
}

#[tokio::test]
async fn test_different_boxes_fetch_separately() -> anyhow::Result<()> {
    let pipeline = FetchPipeline::new(MemoryCache::new(), CountingOverpass::new(), catalog());

    pipeline.fetch_raw(&viewport_bbox()).await?;
    pipeline.fetch_raw(&catalog().bounds).await?;

    assert_eq!(pipeline.source().calls(), 2);
    assert_eq!(pipeline.cache().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_stale_entry_is_refetched() -> anyhow::Result<()> {
    let cache = MemoryCache::new();
    let bbox = viewport_bbox();
    let key = bbox.cache_key();
    let old = CacheEntry::new(Utc::now() - Duration::hours(25), Default::default());
    cache.set(&key, &old)?;

    let pipeline = FetchPipeline::new(cache, CountingOverpass::new(), catalog());
    let data = pipeline.fetch_raw(&bbox).await?;

    assert_eq!(pipeline.source().calls(), 1);
    assert_eq!(data, sample_response());
    let stored = pipeline.cache().get(&key)?.unwrap();
    assert!(stored.timestamp > old.timestamp);
    assert_eq!(stored.data, sample_response());
    Ok(())
}

#[tokio::test]
async fn test_entry_younger_than_ttl_is_used() -> anyhow::Result<()> {
    let cache = MemoryCache::new();
    let bbox = viewport_bbox();
    let entry = CacheEntry::new(Utc::now() - Duration::hours(23), Default::default());
    cache.set(&bbox.cache_key(), &entry)?;

    let pipeline = FetchPipeline::new(cache, CountingOverpass::new(), catalog());
    let layers = pipeline.fetch_region(&bbox).await?;

    assert_eq!(pipeline.source().calls(), 0);
    assert!(layers.buildings.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_custom_ttl() -> anyhow::Result<()> {
    let cache = MemoryCache::new();
    let bbox = viewport_bbox();
    let entry = CacheEntry::new(Utc::now() - Duration::hours(2), Default::default());
    cache.set(&bbox.cache_key(), &entry)?;

    let pipeline = FetchPipeline::new(cache, CountingOverpass::new(), catalog())
        .with_ttl(Duration::hours(1));
    pipeline.fetch_raw(&bbox).await?;

    assert_eq!(pipeline.source().calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_entry_is_replaced() -> anyhow::Result<()> {
    let cache = MemoryCache::new();
    let bbox = viewport_bbox();
    let key = bbox.cache_key();
    cache.insert_raw(&key, "{\"timestamp\": \"yesterday\"");

    let pipeline = FetchPipeline::new(cache, CountingOverpass::new(), catalog());
    let layers = pipeline.fetch_region(&bbox).await?;

    assert_eq!(pipeline.source().calls(), 1);
    assert_eq!(layers.buildings.len(), 3);
    assert_eq!(pipeline.cache().get(&key)?.unwrap().data, sample_response());
    Ok(())
}

#[tokio::test]
async fn test_entry_with_out_of_range_timestamp_is_refetched() -> anyhow::Result<()> {
    let cache = MemoryCache::new();
    let bbox = viewport_bbox();
    let key = bbox.cache_key();
    cache.insert_raw(
        &key,
        r#"{"timestamp": -9223372036854775808, "data": {"elements": []}}"#,
    );

    let pipeline = FetchPipeline::new(cache, CountingOverpass::new(), catalog());
    let layers = pipeline.fetch_region(&bbox).await?;

    assert_eq!(pipeline.source().calls(), 1);
    assert_eq!(layers.buildings.len(), 3);
    let stored = pipeline.cache().get(&key)?.unwrap();
    assert!(stored.timestamp > 0);
    assert_eq!(stored.data, sample_response());
    Ok(())
}

#[tokio::test]
async fn test_quota_failure_does_not_fail_fetch() -> anyhow::Result<()> {
    let pipeline = FetchPipeline::new(MemoryCache::with_quota(64), CountingOverpass::new(), catalog());
    let bbox = viewport_bbox();

    let layers = pipeline.fetch_region(&bbox).await?;
    assert_eq!(layers.buildings.len(), 3);
    assert!(pipeline.cache().is_empty());

    // Nothing was stored, so the next fetch goes out again.
    pipeline.fetch_region(&bbox).await?;
    assert_eq!(pipeline.source().calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_network_failure_is_reported_and_not_cached() {
    let pipeline = FetchPipeline::new(MemoryCache::new(), CountingOverpass::failing(), catalog());

    let result = pipeline.fetch_region(&viewport_bbox()).await;

    assert!(result.is_err());
    assert_eq!(pipeline.in_flight(), 0);
    assert!(!pipeline.is_loading());
    assert!(pipeline.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_count_tracks_running_fetches() {
    let pipeline = FetchPipeline::new(
        MemoryCache::new(),
        CountingOverpass::with_latency(std::time::Duration::from_millis(100)),
        catalog(),
    );
    let bbox = viewport_bbox();
    let campus = catalog().bounds;

    let probe = async {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        pipeline.in_flight()
    };
    let (a, b, during) = tokio::join!(
        pipeline.fetch_region(&bbox),
        pipeline.fetch_region(&campus),
        probe
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(during, 2);
    assert_eq!(pipeline.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_fetch_clears_in_flight() {
    let pipeline = FetchPipeline::new(
        MemoryCache::new(),
        CountingOverpass::with_latency(std::time::Duration::from_secs(10)),
        catalog(),
    );

    let timed_out = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        pipeline.fetch_region(&viewport_bbox()),
    )
    .await;

    assert!(timed_out.is_err());
    assert_eq!(pipeline.in_flight(), 0);
    assert!(pipeline.cache().is_empty());
}

#[tokio::test]
async fn test_file_cache_survives_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bbox = viewport_bbox();

    let first = FetchPipeline::new(FileCache::new(dir.path()), CountingOverpass::new(), catalog());
    first.fetch_region(&bbox).await?;
    assert_eq!(first.source().calls(), 1);

    let second = FetchPipeline::new(FileCache::new(dir.path()), CountingOverpass::new(), catalog());
    let layers = second.fetch_region(&bbox).await?;
    assert_eq!(second.source().calls(), 0);
    assert_eq!(layers.buildings.len(), 3);

    assert_eq!(second.cache().keys()?, vec![bbox.cache_key()]);
    Ok(())
}
