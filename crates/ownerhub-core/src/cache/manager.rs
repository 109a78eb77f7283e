use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::models::DashboardStats;

/// Dashboard data younger than this is served without a network call.
pub const CACHE_TTL_MILLIS: i64 = 5 * 60 * 1000;

const DASHBOARD_STATS: &str = "dashboard_stats";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    /// Franchise the data was fetched for.
    #[serde(default)]
    pub franchise_id: Option<i32>,
}

impl<T> CachedData<T> {
    pub fn new(data: T, franchise_id: Option<i32>) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            franchise_id,
        }
    }

    pub fn age_millis_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.cached_at).num_milliseconds()
    }

    pub fn age_millis(&self) -> i64 {
        self.age_millis_at(Utc::now())
    }

    /// Fresh while strictly younger than the TTL. A timestamp in the
    /// future (clock skew) counts as fresh.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.age_millis_at(now) < CACHE_TTL_MILLIS
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    pub fn is_stale(&self) -> bool {
        !self.is_fresh()
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    /// Move the timestamp back by `age`; used to simulate old records.
    pub fn aged(mut self, age: Duration) -> Self {
        self.cached_at -= age;
        self
    }
}

/// On-disk cache for the dashboard record.
///
/// There is a single record, stamped with the franchise it belongs to. A
/// record for another franchise reads as absent.
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache dir: {}", cache_dir.display()))?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    /// Malformed or unreadable files read as absent.
    fn load<T: DeserializeOwned>(&self, name: &str) -> Option<CachedData<T>> {
        let path = self.cache_path(name);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(cache = name, error = %e, "Failed to read cache file");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(cached) => Some(cached),
            Err(e) => {
                warn!(cache = name, error = %e, "Ignoring malformed cache file");
                None
            }
        }
    }

    /// Each write goes through its own temp file in the cache dir, so
    /// concurrent writers never share a partially written file. Last
    /// rename wins.
    fn save<T: Serialize>(&self, name: &str, record: &CachedData<T>) -> Result<()> {
        let path = self.cache_path(name);
        let contents = serde_json::to_string_pretty(record)?;
        let mut tmp = NamedTempFile::new_in(&self.cache_dir)
            .with_context(|| format!("Failed to create temp file for cache: {}", name))?;
        tmp.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        tmp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace cache file: {}", name))?;
        Ok(())
    }

    // ===== Dashboard Stats =====

    pub fn load_dashboard_stats(&self, franchise_id: Option<i32>) -> Option<CachedData<DashboardStats>> {
        let cached: CachedData<DashboardStats> = self.load(DASHBOARD_STATS)?;
        if cached.franchise_id != franchise_id {
            debug!(
                cached_for = ?cached.franchise_id,
                active = ?franchise_id,
                "Cached dashboard belongs to another franchise"
            );
            return None;
        }
        Some(cached)
    }

    pub fn save_dashboard_stats(&self, stats: &DashboardStats, franchise_id: Option<i32>) -> Result<()> {
        self.store_dashboard_stats(&CachedData::new(stats.clone(), franchise_id))
    }

    pub fn store_dashboard_stats(&self, record: &CachedData<DashboardStats>) -> Result<()> {
        self.save(DASHBOARD_STATS, record)
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(self.cache_path(DASHBOARD_STATS)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove dashboard cache"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
