//! Cache configuration.

use std::path::PathBuf;

/// Default cache root when `MODEL_CACHE_DIR` is not set.
pub const DEFAULT_CACHE_DIR: &str = "/tmp/cache";

/// Model cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory for all cached artefacts
    pub root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            root: std::env::var("MODEL_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_DIR)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.root, PathBuf::from("/tmp/cache"));
    }
}
