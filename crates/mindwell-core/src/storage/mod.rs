mod config;
pub mod database;

pub use config::{BreathingConfig, Config, NotificationsConfig, RewardsConfig, TimerConfig};
pub use database::{Database, Progress, SessionRecord, Stats};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/mindwell[-dev]/` based on MINDWELL_ENV.
///
/// Set MINDWELL_ENV=dev to use development data directory.
/// Set MINDWELL_DATA_DIR to use an explicit directory instead.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("MINDWELL_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("MINDWELL_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("mindwell-dev")
            } else {
                base_dir.join("mindwell")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
