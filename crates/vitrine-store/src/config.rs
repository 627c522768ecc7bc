//! # Store Configuration
//!
//! Configuration management for the commerce store and its backends.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     VITRINE_LOCAL_KEY, VITRINE_REMOTE_KEY, VITRINE_DB_PATH,            │
//! │     VITRINE_REPLICA_DIR, VITRINE_POLL_INTERVAL_MS                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/vitrine/store.toml (Linux)                               │
//! │     ~/Library/Application Support/com.vitrine.vitrine/store.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     versioned keys, app data dir database, in-memory replica           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # store.toml
//! [keys]
//! local = "vitrine.commerce.local.v1"
//! remote = "vitrine.commerce.remote.v1"
//!
//! [local]
//! database_path = "/home/me/.local/share/vitrine/vitrine.db"
//!
//! [replica]
//! directory = "/home/me/Sync/vitrine"
//! poll_interval_ms = 2000
//!
//! [service]
//! command_buffer = 64
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::validate_key;
use crate::error::{StoreError, StoreResult};

/// Default key of the local snapshot blob.
pub const DEFAULT_LOCAL_KEY: &str = "vitrine.commerce.local.v1";

/// Default key of the remote snapshot blob.
pub const DEFAULT_REMOTE_KEY: &str = "vitrine.commerce.remote.v1";

// =============================================================================
// Storage Keys
// =============================================================================

/// The two storage keys the store reads and writes.
///
/// Both carry a version suffix so that a schema bump can move to fresh keys
/// without clobbering data an older build still reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreKeys {
    /// Key in the local durable store.
    #[serde(default = "default_local_key")]
    pub local: String,

    /// Key in the remote replica.
    #[serde(default = "default_remote_key")]
    pub remote: String,
}

fn default_local_key() -> String {
    DEFAULT_LOCAL_KEY.to_string()
}

fn default_remote_key() -> String {
    DEFAULT_REMOTE_KEY.to_string()
}

impl Default for StoreKeys {
    fn default() -> Self {
        StoreKeys {
            local: default_local_key(),
            remote: default_remote_key(),
        }
    }
}

impl StoreKeys {
    /// Creates a key pair.
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        StoreKeys {
            local: local.into(),
            remote: remote.into(),
        }
    }

    /// Rejects empty, identical or badly-charactered keys.
    pub fn validate(&self) -> StoreResult<()> {
        validate_key(&self.local)?;
        validate_key(&self.remote)?;
        if self.local == self.remote {
            return Err(StoreError::InvalidConfig(format!(
                "local and remote keys must differ (both '{}')",
                self.local
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Backend Settings
// =============================================================================

/// Local durable store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalSettings {
    /// SQLite database file. `None` means the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Remote replica settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaSettings {
    /// Shared (synced) directory. `None` means an in-memory replica.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// How often the directory watcher looks for external changes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    2000
}

impl Default for ReplicaSettings {
    fn default() -> Self {
        ReplicaSettings {
            directory: None,
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl ReplicaSettings {
    /// Poll interval as a Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Store task settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Capacity of the handle → task command channel.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

fn default_command_buffer() -> usize {
    64
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            command_buffer: default_command_buffer(),
        }
    }
}

// =============================================================================
// Main Store Configuration
// =============================================================================

/// Complete store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub keys: StoreKeys,

    #[serde(default)]
    pub local: LocalSettings,

    #[serde(default)]
    pub replica: ReplicaSettings,

    #[serde(default)]
    pub service: ServiceSettings,
}

impl StoreConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (store.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> StoreResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading store config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| StoreError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load store config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> StoreResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| StoreError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| StoreError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Store config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> StoreResult<()> {
        self.keys.validate()?;

        if self.replica.poll_interval_ms == 0 {
            return Err(StoreError::InvalidConfig(
                "poll_interval_ms must be greater than 0".into(),
            ));
        }

        if self.service.command_buffer == 0 {
            return Err(StoreError::InvalidConfig(
                "command_buffer must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from any variable source.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("VITRINE_LOCAL_KEY") {
            debug!(key = %key, "Overriding local key from environment");
            self.keys.local = key;
        }

        if let Some(key) = var("VITRINE_REMOTE_KEY") {
            debug!(key = %key, "Overriding remote key from environment");
            self.keys.remote = key;
        }

        if let Some(path) = var("VITRINE_DB_PATH") {
            self.local.database_path = Some(PathBuf::from(path));
        }

        if let Some(dir) = var("VITRINE_REPLICA_DIR") {
            debug!(dir = %dir, "Overriding replica directory from environment");
            self.replica.directory = Some(PathBuf::from(dir));
        }

        if let Some(interval) = var("VITRINE_POLL_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(ms) => self.replica.poll_interval_ms = ms,
                Err(_) => warn!(value = %interval, "Ignoring non-numeric VITRINE_POLL_INTERVAL_MS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("store.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The configured database path, or `vitrine.db` in the platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.local
            .database_path
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().join("vitrine.db")))
    }

    /// The shared replica directory, if configured.
    pub fn replica_directory(&self) -> Option<&std::path::Path> {
        self.replica.directory.as_deref()
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "vitrine", "vitrine")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.keys.local, DEFAULT_LOCAL_KEY);
        assert_eq!(config.keys.remote, DEFAULT_REMOTE_KEY);
        assert_eq!(config.replica.poll_interval_ms, 2000);
        assert_eq!(config.service.command_buffer, 64);
        assert!(config.replica.directory.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = StoreConfig::default();

        config.keys.remote = config.keys.local.clone();
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));

        config.keys.remote = String::new();
        assert!(matches!(config.validate(), Err(StoreError::InvalidKey(_))));

        config.keys.remote = "../escape".to_string();
        assert!(matches!(config.validate(), Err(StoreError::InvalidKey(_))));

        config.keys.remote = ".commerce".to_string();
        assert!(matches!(config.validate(), Err(StoreError::InvalidKey(_))));

        config.keys = StoreKeys::default();
        config.replica.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        config.replica.poll_interval_ms = 500;
        config.service.command_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("VITRINE_LOCAL_KEY", "test.local"),
            ("VITRINE_REMOTE_KEY", "test.remote"),
            ("VITRINE_DB_PATH", "/tmp/vitrine-test.db"),
            ("VITRINE_REPLICA_DIR", "/tmp/vitrine-sync"),
            ("VITRINE_POLL_INTERVAL_MS", "250"),
        ]
        .into_iter()
        .collect();

        let mut config = StoreConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.keys, StoreKeys::new("test.local", "test.remote"));
        assert_eq!(
            config.database_path(),
            Some(PathBuf::from("/tmp/vitrine-test.db"))
        );
        assert_eq!(
            config.replica_directory(),
            Some(std::path::Path::new("/tmp/vitrine-sync"))
        );
        assert_eq!(config.replica.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_bad_poll_interval_override_is_ignored() {
        let mut config = StoreConfig::default();
        config.apply_overrides(|name| {
            (name == "VITRINE_POLL_INTERVAL_MS").then(|| "soon".to_string())
        });
        assert_eq!(config.replica.poll_interval_ms, 2000);
    }

    #[test]
    fn test_toml_round_trip() {
        let contents = r#"
            [keys]
            local = "a.local"

            [replica]
            directory = "/srv/sync"
        "#;
        let config: StoreConfig = toml::from_str(contents).unwrap();
        assert_eq!(config.keys.local, "a.local");
        assert_eq!(config.keys.remote, DEFAULT_REMOTE_KEY);
        assert_eq!(config.replica.poll_interval_ms, 2000);

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[keys]"));
        assert!(toml_str.contains("[replica]"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.toml");

        let mut config = StoreConfig::default();
        config.service.command_buffer = 8;
        config.save(Some(path.clone())).unwrap();

        let loaded = StoreConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.service.command_buffer, 8);
    }
}
