//! Service settings.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. a TOML file, `updist.toml` or the path in `UPDIST_CONFIG`
//! 3. `UPDIST_`-prefixed environment variables, `__` separating sections
//!    (`UPDIST_TASK__WORKERS=8`)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use updist_distribute::Endpoint;

pub const CONFIG_ENV: &str = "UPDIST_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "updist.toml";
const ENV_PREFIX: &str = "UPDIST_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] Box<figment::Error>),

    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self { Self::Load(Box::new(e)) }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage:    StorageSettings,
    pub cache:      CacheSettings,
    pub task:       TaskSettings,
    pub distribute: DistributeSettings,
    pub cdk:        CdkSettings,
    pub log:        LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Artifact directory; storage paths are relative to it.
    pub root:    PathBuf,
    /// Staging root for patch builds, the OS temp dir when unset.
    pub staging: Option<PathBuf>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root:    PathBuf::from("data/artifacts"),
            staging: None,
        }
    }
}

impl StorageSettings {
    pub fn staging_root(&self) -> PathBuf { self.staging.clone().unwrap_or_else(std::env::temp_dir) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self { Self { ttl_secs: 300 } }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub workers:           usize,
    pub max_retry:         u32,
    pub retry_base_ms:     u64,
    pub task_timeout_secs: u64,
    pub pending_ttl_secs:  u64,
    pub status_ttl_secs:   u64,
    pub purge:             PurgeSettings,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            workers:           4,
            max_retry:         5,
            retry_base_ms:     500,
            task_timeout_secs: 600,
            pending_ttl_secs:  3600,
            status_ttl_secs:   600,
            purge:             PurgeSettings::default(),
        }
    }
}

/// Daily purge time in a fixed UTC offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeSettings {
    pub hour:             u32,
    pub minute:           u32,
    pub utc_offset_hours: i32,
}

impl Default for PurgeSettings {
    fn default() -> Self {
        Self {
            hour:             4,
            minute:           0,
            utc_offset_hours: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributeSettings {
    /// Percent of downloads, 0 to 100, served by the edge pool.
    pub edge_ratio:            u8,
    /// Downloads per license key and day; 0 disables the cap.
    pub daily_limit:           u64,
    pub download_key_ttl_secs: u64,
    pub stats_flush_secs:      u64,
    pub cdn:                   CdnSettings,
    pub regions:               BTreeMap<String, Vec<Endpoint>>,
    pub default_region:        String,
}

impl Default for DistributeSettings {
    fn default() -> Self {
        Self {
            edge_ratio:            0,
            daily_limit:           10,
            download_key_ttl_secs: 3600,
            stats_flush_secs:      60,
            cdn:                   CdnSettings::default(),
            regions:               BTreeMap::new(),
            default_region:        "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdnSettings {
    pub base_url: String,
    pub secret:   String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdkSettings {
    /// Remote license-key validator. Keys are not checked when unset.
    pub validate_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CdkSettings {
    fn default() -> Self {
        Self {
            validate_url: None,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub json:  bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json:  false,
        }
    }
}

impl Settings {
    /// Load from the default sources. Not validated.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Defaults, then `path` if it exists, then the environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::extract(
            Self::figment()
                .merge(Toml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Defaults only; callers merge their own providers on top.
    pub fn figment() -> Figment { Figment::from(Serialized::defaults(Self::default())) }

    pub fn extract(figment: Figment) -> Result<Self, ConfigError> { Ok(figment.extract()?) }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.task.workers == 0 {
            return Err(invalid("task.workers", "must be at least 1"));
        }
        if self.distribute.edge_ratio > 100 {
            return Err(invalid(
                "distribute.edge_ratio",
                format!("{} exceeds 100", self.distribute.edge_ratio),
            ));
        }
        if self.distribute.edge_ratio < 100 {
            if self.distribute.cdn.secret.is_empty() {
                return Err(invalid(
                    "distribute.cdn.secret",
                    "required unless every download goes to the edge pool",
                ));
            }
            if self.distribute.cdn.base_url.is_empty() {
                return Err(invalid(
                    "distribute.cdn.base_url",
                    "required unless every download goes to the edge pool",
                ));
            }
        }
        for (region, endpoints) in &self.distribute.regions {
            if endpoints.iter().any(|e| e.url.is_empty()) {
                return Err(invalid("distribute.regions", format!("empty url in region '{region}'")));
            }
        }
        if self.task.purge.hour > 23 || self.task.purge.minute > 59 {
            return Err(invalid(
                "task.purge",
                format!("{}:{} is not a time of day", self.task.purge.hour, self.task.purge.minute),
            ));
        }
        if !(-23..=23).contains(&self.task.purge.utc_offset_hours) {
            return Err(invalid("task.purge.utc_offset_hours", "must be within ±23"));
        }
        Ok(self)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<Settings, ConfigError> {
        Settings::extract(Settings::figment().merge(Toml::string(toml)))
    }

    const VALID: &str = r#"
        [distribute]
        edge_ratio = 30
        daily_limit = 5
        default_region = "cn"

        [distribute.cdn]
        base_url = "https://cdn.example.com"
        secret = "s3cret"

        [[distribute.regions.cn]]
        url = "https://edge-1.example.com"
        weight = 5

        [[distribute.regions.cn]]
        url = "https://edge-2.example.com"
        weight = 1
    "#;

    #[test]
    fn defaults_fill_unset_fields() {
        let settings = from_toml(VALID).unwrap().validate().unwrap();
        assert_eq!(settings.task, TaskSettings::default());
        assert_eq!(settings.cache.ttl(), Duration::from_secs(300));
        assert_eq!(settings.distribute.edge_ratio, 30);
        assert_eq!(settings.distribute.regions["cn"].len(), 2);
        assert_eq!(settings.distribute.regions["cn"][0].weight, 5);
    }

    #[test]
    fn later_sources_override() {
        let settings = Settings::extract(
            Settings::figment()
                .merge(Toml::string(VALID))
                .merge(Serialized::default("task.workers", 16)),
        )
        .unwrap();
        assert_eq!(settings.task.workers, 16);
        assert_eq!(settings.distribute.daily_limit, 5);
    }

    #[test]
    fn cdn_secret_required_below_full_edge() {
        let err = Settings::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "distribute.cdn.secret", .. }));

        let mut all_edge = Settings::default();
        all_edge.distribute.edge_ratio = 100;
        assert!(all_edge.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let mut settings = from_toml(VALID).unwrap();
        settings.distribute.edge_ratio = 101;
        assert!(settings.clone().validate().is_err());

        let mut settings = from_toml(VALID).unwrap();
        settings.task.workers = 0;
        assert!(settings.validate().is_err());

        let mut settings = from_toml(VALID).unwrap();
        settings.task.purge.hour = 24;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::extract(
            Settings::figment().merge(Toml::file(dir.path().join("absent.toml"))),
        )
        .unwrap();
        assert_eq!(settings, Settings::default());
    }
}
