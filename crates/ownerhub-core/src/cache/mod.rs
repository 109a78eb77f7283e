//! Local caching module for the dashboard.
//!
//! This module provides the `CacheManager` for storing the latest dashboard
//! snapshot on disk. The snapshot is served without a network call while it
//! is younger than five minutes, and kept as a fallback after that.

pub mod manager;

pub use manager::{CacheManager, CachedData, CACHE_TTL_MILLIS};
