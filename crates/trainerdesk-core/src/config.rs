//! Application configuration management.
//!
//! Holds the API endpoint, the last signed-in user, an optional log
//! directory and the sync tuning knobs (TTLs, refresh timeout, retry
//! policy).
//!
//! Configuration is stored at `~/.config/trainerdesk/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::TtlPolicy;
use crate::resilience::RetryPolicy;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "trainerdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

fn default_short_ttl() -> u64 {
    120
}

fn default_long_ttl() -> u64 {
    300
}

fn default_refresh_timeout() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    10_000
}

/// Cache and retry tuning. Every field falls back to its default when
/// missing from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_short_ttl")]
    pub short_ttl_secs: u64,
    #[serde(default = "default_long_ttl")]
    pub long_ttl_secs: u64,
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub retry_max_delay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            short_ttl_secs: default_short_ttl(),
            long_ttl_secs: default_long_ttl(),
            refresh_timeout_secs: default_refresh_timeout(),
            retry_max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_base_delay(),
            retry_max_delay_ms: default_max_delay(),
        }
    }
}

impl SyncSettings {
    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy {
            short: Duration::from_secs(self.short_ttl_secs),
            long: Duration::from_secs(self.long_ttl_secs),
        }
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_url: Option<String>,
    pub last_user_id: Option<String>,
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub sync: SyncSettings,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cache_and_retry_defaults() {
        let sync = SyncSettings::default();
        assert_eq!(sync.ttl_policy(), TtlPolicy::default());
        assert_eq!(sync.retry_policy(), RetryPolicy::default());
        assert_eq!(sync.refresh_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join("config.json")).expect("load");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_round_trip_and_partial_sync_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            api_url: Some("https://api.example.com".to_string()),
            last_user_id: Some("trainer-1".to_string()),
            log_dir: None,
            sync: SyncSettings {
                short_ttl_secs: 60,
                ..Default::default()
            },
        };
        config.save_to(&path).expect("save");
        assert_eq!(Config::load_from(&path).expect("load"), config);

        std::fs::write(&path, r#"{"api_url":"http://localhost","sync":{"long_ttl_secs":600}}"#)
            .expect("write");
        let partial = Config::load_from(&path).expect("load partial");
        assert_eq!(partial.sync.long_ttl_secs, 600);
        assert_eq!(partial.sync.short_ttl_secs, 120);
        assert_eq!(partial.sync.retry_max_attempts, 3);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").expect("write");
        assert!(Config::load_from(&path).is_err());
    }
}
