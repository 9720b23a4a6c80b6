//! TOML-based application configuration.
//!
//! Stores scheduling defaults:
//! - Time zone and optional coordinates for sunlight bounds
//! - Default scheduling mode and horizon
//! - Database location and the user id instances are written for
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::sunlight::Coordinates;

/// Longest horizon a run may scan, in days.
pub const MAX_HORIZON_DAYS: u32 = 365;

/// Scheduler defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// IANA zone name.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default)]
    pub location: Option<Coordinates>,
    /// `regular`, `rush`, `rest`, `monumental:<id>` or `skilled:<id,id>`.
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default = "default_missed_grace_minutes")]
    pub missed_grace_minutes: i64,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Overrides `<data_dir>/dayplan.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub storage: StorageSection,
}

// Default functions
fn default_time_zone() -> String {
    "UTC".into()
}
fn default_mode() -> String {
    "regular".into()
}
fn default_horizon_days() -> u32 {
    MAX_HORIZON_DAYS
}
fn default_missed_grace_minutes() -> i64 {
    1
}
fn default_user_id() -> String {
    "local".into()
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            location: None,
            mode: default_mode(),
            horizon_days: default_horizon_days(),
            missed_grace_minutes: default_missed_grace_minutes(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database_path: None,
            user_id: default_user_id(),
        }
    }
}

impl SchedulerSection {
    /// Horizon clamped to `1..=365`.
    pub fn horizon_days(&self) -> u32 {
        self.horizon_days.clamp(1, MAX_HORIZON_DAYS)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let unknown = || invalid("unknown config key".to_string());

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(invalid("config key is empty".to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    // Unset optional values take JSON when it parses, a plain string otherwise.
                    serde_json::Value::Null => serde_json::from_str(value)
                        .unwrap_or_else(|_| serde_json::Value::String(value.into())),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location, `<data_dir>/config.toml`.
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Database file: the configured override or `<data_dir>/dayplan.db`.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => data_dir()
                .map(|dir| dir.join("dayplan.db"))
                .map_err(|e| ConfigError::LoadFailed {
                    path: PathBuf::from("dayplan.db"),
                    message: e.to_string(),
                }),
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
