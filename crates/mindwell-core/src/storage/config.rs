//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Focus and break lengths
//! - Breathing session length and phase split
//! - Experience points awarded per completed session
//! - Notification channels (sound, voice, vibration)
//!
//! Configuration is stored at `~/.config/mindwell/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::{PhaseTable, TimerMode, TimerSettings};

/// Focus/break timer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    #[serde(default = "default_true")]
    pub auto_advance: bool,
}

/// Breathing session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreathingConfig {
    #[serde(default = "default_session_total_seconds")]
    pub session_total_seconds: u32,
    #[serde(default = "default_inhale_seconds")]
    pub inhale_seconds: u32,
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u32,
    #[serde(default = "default_exhale_seconds")]
    pub exhale_seconds: u32,
}

/// Experience points per completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsConfig {
    #[serde(default = "default_focus_xp")]
    pub focus_xp: u32,
    #[serde(default = "default_break_xp")]
    pub break_xp: u32,
    #[serde(default = "default_breathing_xp")]
    pub breathing_xp: u32,
}

/// Notification configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub sound: bool,
    #[serde(default = "default_true")]
    pub voice: bool,
    #[serde(default = "default_true")]
    pub vibration: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/mindwell/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub breathing: BreathingConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_focus_minutes() -> u32 {
    25
}
fn default_break_minutes() -> u32 {
    5
}
fn default_session_total_seconds() -> u32 {
    60
}
fn default_inhale_seconds() -> u32 {
    3
}
fn default_hold_seconds() -> u32 {
    1
}
fn default_exhale_seconds() -> u32 {
    3
}
fn default_focus_xp() -> u32 {
    100
}
fn default_break_xp() -> u32 {
    20
}
fn default_breathing_xp() -> u32 {
    50
}
fn default_true() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            break_minutes: default_break_minutes(),
            auto_advance: true,
        }
    }
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            session_total_seconds: default_session_total_seconds(),
            inhale_seconds: default_inhale_seconds(),
            hold_seconds: default_hold_seconds(),
            exhale_seconds: default_exhale_seconds(),
        }
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            focus_xp: default_focus_xp(),
            break_xp: default_break_xp(),
            breathing_xp: default_breathing_xp(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
            voice: true,
            vibration: true,
        }
    }
}

impl BreathingConfig {
    pub fn phase_table(&self) -> PhaseTable {
        PhaseTable {
            inhale_secs: u64::from(self.inhale_seconds),
            hold_secs: u64::from(self.hold_seconds),
            exhale_secs: u64::from(self.exhale_seconds),
        }
    }
}

impl RewardsConfig {
    pub fn xp_for(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Focus => self.focus_xp,
            TimerMode::Break => self.break_xp,
            TimerMode::Breathing => self.breathing_xp,
        }
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

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u32>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                            .into(),
                    ),
                    serde_json::Value::Object(_) => {
                        return Err(ConfigError::UnknownKey(key.to_string()))
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Change a value in memory. The result must still validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or is out of range.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Reject values a session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("timer.focus_minutes", self.timer.focus_minutes),
            ("timer.break_minutes", self.timer.break_minutes),
            ("breathing.session_total_seconds", self.breathing.session_total_seconds),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be a positive integer".into(),
                });
            }
        }
        if self.breathing.phase_table().cycle_secs() == 0 {
            return Err(ConfigError::InvalidValue {
                key: "breathing".to_string(),
                message: "breathing cycle must be at least one second".into(),
            });
        }
        Ok(())
    }

    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            focus_secs: u64::from(self.timer.focus_minutes) * 60,
            break_secs: u64::from(self.timer.break_minutes) * 60,
            breathing_secs: u64::from(self.breathing.session_total_seconds),
            breathing: self.breathing.phase_table(),
            auto_advance: self.timer.auto_advance,
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("using default configuration: {}", e);
            Self::default()
        })
    }
}
