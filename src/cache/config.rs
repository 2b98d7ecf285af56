//! Snapshot cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

// Default values mirror the upstream fetch economics: lists change
// slowly, so snapshots stay fresh for hours.
const DEFAULT_TTL_SECONDS: u64 = 6 * 60 * 60;
const DEFAULT_CAPACITY: usize = 1000;

/// Snapshot cache tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a fetched snapshot stays fresh.
    pub ttl_seconds: u64,
    /// Maximum number of distinct list keys tracked.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECONDS,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            ttl_seconds: settings.ttl_seconds,
            capacity: settings.capacity,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Returns the key capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl_seconds, 21_600);
        assert_eq!(config.capacity, 1000);
    }

    #[test]
    fn ttl_converts_to_duration() {
        let config = CacheConfig {
            ttl_seconds: 90,
            ..Default::default()
        };
        assert_eq!(config.ttl(), Duration::from_secs(90));
    }

    #[test]
    fn capacity_clamps_to_min() {
        let config = CacheConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity_non_zero().get(), 1);
    }
}
