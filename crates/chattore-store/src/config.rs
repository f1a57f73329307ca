//! Store configuration.
//!
//! Read from the `[store]` and `[logging]` sections of a TOML file
//! (`config/default.toml` by default). Missing files, sections and keys
//! fall back to [`StoreConfig::default`]; `CHATTORE_DB` and `CHATTORE_LOG`
//! override the path and log level.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Default location of the configuration file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub store: StoreSection,
    pub logging: LoggingSection,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// SQLite file holding all player state.
    pub database_path: PathBuf,
    /// How long a writer waits on a locked file before failing.
    pub busy_timeout_ms: u32,
    /// Rebuild the username cache from disk when the store opens.
    pub prime_username_cache: bool,
    /// Drop a player's nickname when they log in under a new username,
    /// unless the nickname embeds `<username>`.
    pub clear_nickname_on_change: bool,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/chattore.db"),
            busy_timeout_ms: 5_000,
            prime_username_cache: true,
            clear_nickname_on_change: false,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> StoreResult<Self> {
        toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Load `path` if it exists, otherwise use defaults. Environment
    /// overrides are applied in both cases.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
            Self::from_toml(&content)?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(db) = std::env::var("CHATTORE_DB")
            && !db.is_empty()
        {
            self.store.database_path = PathBuf::from(db);
        }
        if let Ok(level) = std::env::var("CHATTORE_LOG")
            && !level.is_empty()
        {
            self.logging.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = StoreConfig::from_toml("").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert!(config.store.prime_username_cache);
        assert!(!config.store.clear_nickname_on_change);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = StoreConfig::from_toml(
            r#"
            [store]
            database_path = "/srv/chat/player.db"
            prime_username_cache = false
            clear_nickname_on_change = true
            "#,
        )
        .unwrap();
        assert_eq!(config.store.database_path, PathBuf::from("/srv/chat/player.db"));
        assert!(!config.store.prime_username_cache);
        assert!(config.store.clear_nickname_on_change);
        assert_eq!(config.store.busy_timeout_ms, 5_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn malformed_document_is_config_error() {
        let err = StoreConfig::from_toml("[store\nbroken").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chattore.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.store.busy_timeout_ms, 5_000);
        // CHATTORE_LOG may be set in the environment running the tests.
        if std::env::var("CHATTORE_LOG").is_err() {
            assert_eq!(config.logging.level, "debug");
        }
    }
}
