use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

const CONFIG_FILE: &str = "config.yaml";

/// Quiet period before an edit is written back, in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// Retries after a failed load before the error is surfaced
pub const DEFAULT_FETCH_RETRIES: u32 = 3;

const DEFAULT_RETRY_BASE_MS: u64 = 1000;

/// Which persistence backend a project uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Loro,
    Sqlite,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Loro => write!(f, "loro"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "loro" => Ok(Backend::Loro),
            "sqlite" => Ok(Backend::Sqlite),
            _ => Err(format!("Invalid backend: {} (expected loro or sqlite)", s)),
        }
    }
}

/// Project configuration stored in `.stellarforge/config.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub debounce_ms: u64,
    pub fetch_retries: u32,
    pub backend: Backend,
    /// Actor id used when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            fetch_retries: DEFAULT_FETCH_RETRIES,
            backend: Backend::default(),
            actor: None,
        }
    }
}

impl Config {
    /// Load from `dir`, falling back to defaults when no file exists
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        self.validate()?;
        fs::write(dir.join(CONFIG_FILE), serde_yaml::to_string(self)?)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(ForgeError::Config(
                "debounce_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            fetch_retries: self.fetch_retries,
            ..SyncConfig::default()
        }
    }
}

/// Settings for a [`crate::sync::NoteSynchronizer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Quiet period after the last edit before a save fires
    pub debounce: Duration,
    /// How many times a failed load is retried
    pub fetch_retries: u32,
    /// First retry delay; doubles per attempt, capped at 30s
    pub retry_base_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            fetch_retries: DEFAULT_FETCH_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
        }
    }
}

impl SyncConfig {
    /// Same defaults with a different quiet period
    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            debounce,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.debounce_ms, 1000);
        assert_eq!(config.backend, Backend::Loro);
        assert_eq!(config.sync_config(), SyncConfig::default());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(Config::load(tmp.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            debounce_ms: 250,
            fetch_retries: 0,
            backend: Backend::Sqlite,
            actor: Some("ada".to_string()),
        };
        config.save(tmp.path()).unwrap();

        let loaded = Config::load(tmp.path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.sync_config().debounce, Duration::from_millis(250));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "backend: sqlite\n").unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.debounce_ms, DEFAULT_DEBOUNCE_MS);
    }

    #[test]
    fn test_zero_debounce_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "debounce_ms: 0\n").unwrap();

        assert!(matches!(
            Config::load(tmp.path()),
            Err(ForgeError::Config(_))
        ));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("SQLite".parse::<Backend>().unwrap(), Backend::Sqlite);
        assert!("postgres".parse::<Backend>().is_err());
    }
}
