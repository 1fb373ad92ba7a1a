//! Configuration management for flightkeep.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "flightkeep";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "flights.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FLIGHTKEEP_`, sections split on `__`)
/// 2. TOML config file at `~/.config/flightkeep/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage backend configuration.
    pub storage: StorageConfig,
    /// Storage key layout.
    pub keys: KeyConfig,
    /// Write guard and recovery tuning.
    pub durability: DurabilityConfig,
    /// Auto-save configuration.
    pub autosave: AutoSaveConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/flightkeep/flights.db`
    pub database_path: Option<PathBuf>,
}

/// Names of the keys the durability manager reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Authoritative slot.
    pub primary: String,
    /// First fallback slot.
    pub backup: String,
    /// Second fallback slot.
    pub emergency: String,
    /// Raw timestamp of the last successful save.
    pub last_save: String,
    /// Keys written by older releases, newest first. Read-only.
    pub legacy: Vec<String>,
    /// Prefixes of ad-hoc snapshot keys scanned during recovery.
    pub safety_prefixes: Vec<String>,
    /// Prefix used when the shrink guard writes a snapshot.
    pub safety_write_prefix: String,
}

/// Write guard and recovery tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurabilityConfig {
    /// Writes with fewer records than this snapshot the current primary slot
    /// first, if it holds more.
    pub shrink_threshold: usize,
    /// Maximum number of safety keys examined during one recovery.
    pub max_safety_scan: usize,
}

/// Auto-save configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// Interval between automatic saves in milliseconds.
    pub interval_ms: u64,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            primary: "milavia_flights_primary".to_string(),
            backup: "milavia_flights_backup".to_string(),
            emergency: "milavia_flights_emergency_slot".to_string(),
            last_save: "milavia_flights_last_save".to_string(),
            legacy: vec![
                "milavia_requests_v2".to_string(),
                "milavia_requests".to_string(),
            ],
            safety_prefixes: vec![
                "safety_reduction_".to_string(),
                "safety_backup_".to_string(),
                "emergency_".to_string(),
            ],
            safety_write_prefix: "safety_reduction_".to_string(),
        }
    }
}

impl Default for DurabilityConfig {
    fn default() -> Self {
        Self {
            shrink_threshold: 5,
            max_safety_scan: 500,
        }
    }
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self { interval_ms: 5_000 }
    }
}

impl KeyConfig {
    /// The three redundant slot keys in read priority order.
    #[must_use]
    pub fn slots(&self) -> [&str; 3] {
        [
            self.primary.as_str(),
            self.backup.as_str(),
            self.emergency.as_str(),
        ]
    }

    fn validate(&self) -> Result<()> {
        let named = [
            ("primary", &self.primary),
            ("backup", &self.backup),
            ("emergency", &self.emergency),
            ("last_save", &self.last_save),
        ];

        for (i, (name, key)) in named.iter().enumerate() {
            if key.is_empty() {
                return Err(invalid(format!("keys.{name} must not be empty")));
            }
            if let Some((other, _)) = named[..i].iter().find(|(_, k)| k == key) {
                return Err(invalid(format!(
                    "keys.{name} and keys.{other} must differ (both are '{key}')"
                )));
            }
            if let Some(prefix) = self
                .safety_prefixes
                .iter()
                .find(|p| key.starts_with(p.as_str()))
            {
                return Err(invalid(format!(
                    "keys.{name} '{key}' would be scanned as a safety key (prefix '{prefix}')"
                )));
            }
        }

        if self.safety_prefixes.iter().any(String::is_empty) {
            return Err(invalid("keys.safety_prefixes must not contain an empty prefix"));
        }

        if !self.safety_prefixes.contains(&self.safety_write_prefix) {
            return Err(invalid(format!(
                "keys.safety_write_prefix '{}' is not listed in keys.safety_prefixes",
                self.safety_write_prefix
            )));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("FLIGHTKEEP_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.keys.validate()?;

        if self.durability.max_safety_scan == 0 {
            return Err(invalid("durability.max_safety_scan must be greater than 0"));
        }

        if self.autosave.interval_ms == 0 {
            return Err(invalid("autosave.interval_ms must be greater than 0"));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the auto-save interval as a Duration.
    #[must_use]
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert_eq!(config.durability.shrink_threshold, 5);
        assert_eq!(config.durability.max_safety_scan, 500);
        assert_eq!(config.autosave.interval_ms, 5_000);
    }

    #[test]
    fn test_default_keys() {
        let keys = KeyConfig::default();

        assert_eq!(
            keys.slots(),
            [
                "milavia_flights_primary",
                "milavia_flights_backup",
                "milavia_flights_emergency_slot"
            ]
        );
        assert_eq!(keys.legacy, vec!["milavia_requests_v2", "milavia_requests"]);
        assert!(keys.safety_prefixes.contains(&keys.safety_write_prefix));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = Config::default();
        config.autosave.interval_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("interval_ms"));
    }

    #[test]
    fn test_validate_zero_scan_cap() {
        let mut config = Config::default();
        config.durability.max_safety_scan = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_safety_scan"));
    }

    #[test]
    fn test_validate_empty_slot_key() {
        let mut config = Config::default();
        config.keys.backup = String::new();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("keys.backup"));
    }

    #[test]
    fn test_validate_duplicate_slot_keys() {
        let mut config = Config::default();
        config.keys.emergency = config.keys.primary.clone();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("keys.emergency and keys.primary must differ"));
    }

    #[test]
    fn test_validate_slot_key_shadowed_by_safety_prefix() {
        let mut config = Config::default();
        config.keys.emergency = "emergency_slot".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("would be scanned as a safety key"));
    }

    #[test]
    fn test_validate_unscanned_write_prefix() {
        let mut config = Config::default();
        config.keys.safety_write_prefix = "snapshot_".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("safety_write_prefix"));
    }

    #[test]
    fn test_validate_empty_safety_prefix() {
        let mut config = Config::default();
        config.keys.safety_prefixes.push(String::new());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("empty prefix"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("flights.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_autosave_interval() {
        assert_eq!(
            Config::default().autosave_interval(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("flightkeep"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "flightkeep_config_test_{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "[durability]\nshrink_threshold = 3\n\n[autosave]\ninterval_ms = 250\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.durability.shrink_threshold, 3);
        assert_eq!(config.durability.max_safety_scan, 500);
        assert_eq!(config.autosave.interval_ms, 250);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!(
            "flightkeep_config_invalid_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[autosave]\ninterval_ms = 0\n").unwrap();

        let err = Config::load_from(Some(path.clone())).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_keys_deserialize_partial() {
        let json = r#"{"primary": "flights_a", "legacy": []}"#;
        let keys: KeyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(keys.primary, "flights_a");
        assert!(keys.legacy.is_empty());
        assert_eq!(keys.backup, "milavia_flights_backup");
    }
}
