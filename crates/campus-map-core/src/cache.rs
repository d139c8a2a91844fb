// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::overpass::OverpassResponse;

/// Default freshness window for fetched regions.
pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt cache entry '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Cache quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },
}

/// Stored form of one fetched region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fetch time in epoch milliseconds.
    pub timestamp: i64,
    pub data: OverpassResponse,
}

impl CacheEntry {
    pub fn new(fetched_at: chrono::DateTime<chrono::Utc>, data: OverpassResponse) -> Self {
        Self {
            timestamp: fetched_at.timestamp_millis(),
            data,
        }
    }

    /// Time since the fetch, or `None` when the stored timestamp is too far
    /// from `now` to represent.
    pub fn age(&self, now: chrono::DateTime<chrono::Utc>) -> Option<chrono::Duration> {
        now.timestamp_millis()
            .checked_sub(self.timestamp)
            .and_then(chrono::Duration::try_milliseconds)
    }

    /// An entry whose age cannot be computed is never fresh.
    pub fn is_fresh(&self, now: chrono::DateTime<chrono::Utc>, ttl: chrono::Duration) -> bool {
        self.age(now).is_some_and(|age| age < ttl)
    }
}

/// Key/value storage for fetched regions, keyed by `BoundingBox::cache_key`.
///
/// Methods take `&self`; implementations handle their own interior
/// mutability so one cache can serve overlapping fetches.
pub trait RegionCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;
    fn set(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

impl<C: RegionCache + ?Sized> RegionCache for &C {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        (**self).set(key, entry)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        (**self).remove(key)
    }
}

fn decode(key: &str, content: &str) -> Result<CacheEntry, CacheError> {
    serde_json::from_str(content).map_err(|source| CacheError::Corrupt {
        key: key.to_string(),
        source,
    })
}

/// In-process cache holding serialized entries, with an optional byte quota
/// shared by all entries.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    /// Stores raw text under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: &str, content: &str) {
        self.lock().insert(key.to_string(), content.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RegionCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        match self.lock().get(key) {
            Some(content) => decode(key, content).map(Some),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let content = serde_json::to_string(entry).map_err(CacheError::Serialize)?;
        let mut entries = self.lock();

        if let Some(quota) = self.quota {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let available = quota.saturating_sub(used);
            if content.len() > available {
                return Err(CacheError::QuotaExceeded {
                    needed: content.len(),
                    available,
                });
            }
        }

        entries.insert(key.to_string(), content);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// One JSON file per region inside a cache directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Cache in the platform cache directory.
    pub fn default_location() -> Self {
        Self::new(crate::get_cache_root())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Keys of all stored entries, sorted.
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Deletes every stored entry and returns how many were removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let keys = self.keys()?;
        for key in &keys {
            self.remove(key)?;
        }
        Ok(keys.len())
    }
}

impl RegionCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        match std::fs::read_to_string(self.entry_path(key)) {
            Ok(content) => decode(key, &content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string(entry).map_err(CacheError::Serialize)?;

        // Write-then-rename so a concurrent reader never sees half a file.
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, self.entry_path(key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        match std::fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
