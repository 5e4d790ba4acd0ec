use std::path::PathBuf;

use chrono_tz::Tz;
use thiserror::Error;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_TZ: Tz = chrono_tz::America::Santiago;
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ROOMSLOT_TZ: unknown timezone {0:?}")]
    Timezone(String),
    #[error("{var}: expected an unsigned integer, got {value:?}")]
    Number { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub tz: Tz,
    /// Log appends tolerated before the CLI compacts on exit.
    pub compact_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            tz: DEFAULT_TZ,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup("ROOMSLOT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(tz) = lookup("ROOMSLOT_TZ") {
            config.tz = tz.trim().parse().map_err(|_| ConfigError::Timezone(tz))?;
        }
        if let Some(value) = lookup("ROOMSLOT_COMPACT_THRESHOLD") {
            config.compact_threshold = value.trim().parse().map_err(|_| ConfigError::Number {
                var: "ROOMSLOT_COMPACT_THRESHOLD",
                value,
            })?;
        }
        Ok(config)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }
}
