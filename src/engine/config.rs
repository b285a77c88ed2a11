// src/engine/config.rs
//
// Engine configuration. Everything is explicit and constructed by the host;
// `from_env()` only reads overrides, it never installs global state.

use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::{RawImageError, Result};

/// Default maximum number of resident buffers.
pub const DEFAULT_CACHE_CAPACITY: usize = 80;

/// Environment override for the cache capacity.
pub const CACHE_CAPACITY_ENV: &str = "RAW_IMAGE_CACHE_CAPACITY";

/// Environment override for the transform worker count.
pub const WORKER_THREADS_ENV: &str = "RAW_IMAGE_WORKER_THREADS";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entry-count bound (not a byte bound).
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl CacheConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Default config with `RAW_IMAGE_CACHE_CAPACITY` applied when it parses.
    pub fn from_env() -> Self {
        let capacity = read_env_usize(CACHE_CAPACITY_ENV).unwrap_or(DEFAULT_CACHE_CAPACITY);
        Self { capacity }
    }
}

/// Decode-time size limits enforced by the native loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_dimension: u32,
    pub max_pixels: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
        }
    }
}

impl DecodeLimits {
    pub fn check(&self, width: u32, height: u32) -> Result<()> {
        if width > self.max_dimension {
            return Err(RawImageError::dimension_exceeds_limit(
                width,
                self.max_dimension,
            ));
        }
        if height > self.max_dimension {
            return Err(RawImageError::dimension_exceeds_limit(
                height,
                self.max_dimension,
            ));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(RawImageError::pixel_count_exceeds_limit(
                pixels,
                self.max_pixels,
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    /// `None` = detect from available parallelism.
    pub worker_threads: Option<usize>,
    pub limits: DecodeLimits,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig::from_env(),
            worker_threads: read_env_usize(WORKER_THREADS_ENV),
            limits: DecodeLimits::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(RawImageError::invalid_parameter(
                "cache.capacity",
                "0",
                "cache capacity must be at least 1",
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(RawImageError::invalid_parameter(
                "worker_threads",
                "0",
                "use None to detect the thread count",
            ));
        }
        Ok(())
    }
}

fn read_env_usize(key: &str) -> Option<usize> {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.capacity, 80);
        assert_eq!(config.worker_threads, None);
        assert_eq!(config.limits.max_dimension, 32768);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = EngineConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());

        let config = EngineConfig {
            worker_threads: Some(0),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_limits_check() {
        let limits = DecodeLimits {
            max_dimension: 100,
            max_pixels: 5_000,
        };
        assert!(limits.check(100, 50).is_ok());
        assert!(matches!(
            limits.check(101, 1),
            Err(RawImageError::DimensionExceedsLimit { dimension: 101, .. })
        ));
        assert!(matches!(
            limits.check(100, 51),
            Err(RawImageError::PixelCountExceedsLimit { pixels: 5_100, .. })
        ));
    }
}
