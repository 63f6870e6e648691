//! Cache configuration
//!
//! Settings for the LRU capacity budget and the memory pressure response.
//! Configuration can be loaded from a JSON file, environment variables, or
//! created programmatically.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lru::CacheBudget;

/// Configuration for an [`LruCache`](crate::LruCache)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Capacity budget in tiles or bytes
    pub budget: CacheBudget,
    /// Share of the budget kept after a high memory pressure signal (0.0 to 1.0)
    pub target_utilization: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            budget: CacheBudget::default(), // 256 MB
            target_utilization: 0.80,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with the given budget and default thresholds.
    pub fn new(budget: CacheBudget) -> Self {
        Self {
            budget,
            ..Default::default()
        }
    }

    /// Limits the cache to a number of resident tiles.
    pub fn with_tile_limit(mut self, tiles: usize) -> Self {
        self.budget = CacheBudget::Tiles(tiles);
        self
    }

    /// Limits the cache to a payload size in megabytes.
    ///
    /// Sizes beyond the address space saturate to `usize::MAX` bytes.
    pub fn with_mb_limit(mut self, mb: usize) -> Self {
        self.budget = CacheBudget::from_mb(mb);
        self
    }

    /// Sets the target utilization after a pressure response (clamped to 0.0..=1.0).
    pub fn with_target_utilization(mut self, target: f64) -> Self {
        self.target_utilization = target.clamp(0.0, 1.0);
        self
    }

    /// Checks that the configuration describes a usable cache.
    ///
    /// # Errors
    /// Returns an error for a zero budget or a target utilization outside 0.0..=1.0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.budget.limit() == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if !(0.0..=1.0).contains(&self.target_utilization) {
            return Err(ConfigError::InvalidValue("target_utilization".to_string()));
        }
        Ok(())
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TILESTORE_CACHE_TILES`: tile count budget (takes precedence)
    /// - `TILESTORE_CACHE_MB`: byte budget in MB (default: 256)
    /// - `TILESTORE_TARGET_UTILIZATION`: 0.0 to 1.0 (default: 0.8)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TILESTORE_CACHE_MB") {
            config.budget = val
                .parse::<usize>()
                .ok()
                .and_then(CacheBudget::checked_from_mb)
                .ok_or_else(|| ConfigError::InvalidValue("TILESTORE_CACHE_MB".to_string()))?;
        }

        if let Ok(val) = std::env::var("TILESTORE_CACHE_TILES") {
            let tiles = val
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue("TILESTORE_CACHE_TILES".to_string()))?;
            config.budget = CacheBudget::Tiles(tiles);
        }

        if let Ok(val) = std::env::var("TILESTORE_TARGET_UTILIZATION") {
            config.target_utilization = val
                .parse::<f64>()
                .ok()
                .filter(|target| (0.0..=1.0).contains(target))
                .ok_or_else(|| {
                    ConfigError::InvalidValue("TILESTORE_TARGET_UTILIZATION".to_string())
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    ///
    /// Expected file format (every key optional):
    /// ```json
    /// { "budget": { "tiles": 512 }, "target_utilization": 0.75 }
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    /// Parses configuration from a JSON string.
    fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    /// The budget would not hold a single tile
    #[error("cache budget must be greater than zero")]
    ZeroBudget,
    /// I/O error reading or writing configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Malformed configuration file
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_VARS: [&str; 3] = [
        "TILESTORE_CACHE_TILES",
        "TILESTORE_CACHE_MB",
        "TILESTORE_TARGET_UTILIZATION",
    ];

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.budget, CacheBudget::Bytes(256 * 1024 * 1024));
        assert!((config.target_utilization - 0.8).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = CacheConfig::default()
            .with_tile_limit(64)
            .with_target_utilization(1.5);
        assert_eq!(config.budget, CacheBudget::Tiles(64));
        assert_eq!(config.target_utilization, 1.0);

        let config = config.with_mb_limit(8);
        assert_eq!(config.budget, CacheBudget::Bytes(8 * 1024 * 1024));
    }

    #[test]
    fn test_zero_budget_is_rejected() {
        let config = CacheConfig::new(CacheBudget::Tiles(0));
        assert!(matches!(config.validate(), Err(ConfigError::ZeroBudget)));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&ENV_VARS);

        env::remove_var("TILESTORE_CACHE_TILES");
        env::set_var("TILESTORE_CACHE_MB", "64");
        env::set_var("TILESTORE_TARGET_UTILIZATION", "0.5");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.budget, CacheBudget::Bytes(64 * 1024 * 1024));
        assert_eq!(config.target_utilization, 0.5);
    }

    #[test]
    #[serial]
    fn test_from_env_tile_limit_wins() {
        let _guard = EnvGuard::new(&ENV_VARS);

        env::set_var("TILESTORE_CACHE_MB", "64");
        env::set_var("TILESTORE_CACHE_TILES", "100");
        env::remove_var("TILESTORE_TARGET_UTILIZATION");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.budget, CacheBudget::Tiles(100));
        assert!((config.target_utilization - 0.8).abs() < f64::EPSILON); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&ENV_VARS);

        env::remove_var("TILESTORE_CACHE_MB");
        env::remove_var("TILESTORE_TARGET_UTILIZATION");
        env::set_var("TILESTORE_CACHE_TILES", "not_a_number");
        assert!(matches!(
            CacheConfig::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "TILESTORE_CACHE_TILES"
        ));

        env::set_var("TILESTORE_CACHE_TILES", "0");
        assert!(matches!(CacheConfig::from_env(), Err(ConfigError::ZeroBudget)));

        env::set_var("TILESTORE_CACHE_TILES", "10");
        env::set_var("TILESTORE_TARGET_UTILIZATION", "2");
        assert!(CacheConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_oversized_mb() {
        let _guard = EnvGuard::new(&ENV_VARS);

        env::remove_var("TILESTORE_CACHE_TILES");
        env::remove_var("TILESTORE_TARGET_UTILIZATION");
        env::set_var("TILESTORE_CACHE_MB", usize::MAX.to_string());
        assert!(matches!(
            CacheConfig::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "TILESTORE_CACHE_MB"
        ));

        // Largest value that still fits.
        env::set_var("TILESTORE_CACHE_MB", (usize::MAX / (1024 * 1024)).to_string());
        let config = CacheConfig::from_env().unwrap();
        assert!(matches!(config.budget, CacheBudget::Bytes(bytes) if bytes > 0));
    }

    #[test]
    fn test_mb_limit_saturates() {
        let config = CacheConfig::default().with_mb_limit(usize::MAX);
        assert_eq!(config.budget, CacheBudget::Bytes(usize::MAX));
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_from_json_partial() {
        let config = CacheConfig::from_json(r#"{ "budget": { "tiles": 32 } }"#).unwrap();
        assert_eq!(config.budget, CacheBudget::Tiles(32));
        assert!((config.target_utilization - 0.8).abs() < f64::EPSILON); // default

        let config = CacheConfig::from_json("{}").unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_from_json_malformed() {
        assert!(matches!(
            CacheConfig::from_json("budget = 12"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_file_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("cache.json");

        let config = CacheConfig::new(CacheBudget::Tiles(128)).with_target_utilization(0.6);
        config.save_to_file(&config_path).unwrap();

        let loaded = CacheConfig::from_file(&config_path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = CacheConfig::from_file(temp_dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
