//! # Playback Configuration
//!
//! Tunables for the stream resolver and the playback controller.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stream resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Upper bound on one backend resolution, including fallbacks.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout: Duration,

    /// Freshness window for cached stream URLs. Video-host URLs are signed
    /// and expire, so this stays well below their lifetime.
    ///
    /// Default: 30 minutes.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: Duration,

    /// Maximum number of cached URLs.
    ///
    /// Default: 64.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Catalog-aggregator bitrate tiers, highest preference first.
    #[serde(default = "default_catalog_quality_preference")]
    pub catalog_quality_preference: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: default_resolve_timeout(),
            cache_ttl: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            catalog_quality_preference: default_catalog_quality_preference(),
        }
    }
}

impl ResolverConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.resolve_timeout.is_zero() {
            return Err("resolve_timeout must be > 0".to_string());
        }

        if self.cache_ttl.is_zero() {
            return Err("cache_ttl must be > 0".to_string());
        }

        if self.cache_capacity == 0 {
            return Err("cache_capacity must be at least 1".to_string());
        }

        if self.catalog_quality_preference.iter().any(|q| q.trim().is_empty()) {
            return Err("catalog_quality_preference cannot contain empty tiers".to_string());
        }

        Ok(())
    }
}

/// Playback controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Pause between a track failure and the automatic skip, long enough for
    /// the error to be visible.
    ///
    /// Default: 1.5 seconds.
    #[serde(default = "default_auto_skip_delay")]
    pub auto_skip_delay: Duration,

    /// Warm the cache for the following queue entry once a track starts.
    ///
    /// Default: true.
    #[serde(default = "default_prefetch_next")]
    pub prefetch_next: bool,

    /// Re-resolutions attempted when the sink rejects a cached or
    /// pre-resolved URL.
    ///
    /// Default: 1.
    #[serde(default = "default_max_stale_retries")]
    pub max_stale_retries: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            auto_skip_delay: default_auto_skip_delay(),
            prefetch_next: default_prefetch_next(),
            max_stale_retries: default_max_stale_retries(),
        }
    }
}

impl PlayerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.auto_skip_delay > Duration::from_secs(30) {
            return Err("auto_skip_delay must not exceed 30 seconds".to_string());
        }

        if self.max_stale_retries > 5 {
            return Err("max_stale_retries must be at most 5".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_resolve_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_cache_capacity() -> usize {
    64
}

fn default_catalog_quality_preference() -> Vec<String> {
    ["320kbps", "160kbps", "96kbps", "48kbps", "12kbps"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_auto_skip_delay() -> Duration {
    Duration::from_millis(1500)
}

fn default_prefetch_next() -> bool {
    true
}

fn default_max_stale_retries() -> u32 {
    1
}
