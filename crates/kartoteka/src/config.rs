//! # Configuration
//!
//! Kartoteka configuration is loaded with [`confique`], layered in priority order:
//!
//! 1. **Environment variables**: `KARTOTEKA_FALLBACK_FILE`, `KARTOTEKA_LOG_FILTER`, etc.
//! 2. **Config file**: `kartoteka.toml` in the OS config directory (via `directories`),
//!    or in `$KARTOTEKA_HOME` when that is set.
//! 3. **Compiled defaults**: `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `fallback_file` | `<data dir>/fallback.json` | Key-value fallback store file |
//! | `data_folder` | none | Data folder used on first run only |
//! | `autosave_delay_ms` | `2000` | Debounce delay for form autosave |
//! | `log_filter` | `info` | `tracing` filter directive |
//! | `history_limit` | `10` | Examination-type versions kept for revert |
//!
//! `data_folder` only seeds the setting. Once the fallback store holds a data
//! folder, that value wins, so a folder chosen at runtime survives restarts.
//!
//! `KARTOTEKA_ENV=dev` switches the CLI into dev mode (debug logging).

use crate::error::{KartotekaError, Result};
use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "kartoteka.toml";
pub const FALLBACK_FILE_NAME: &str = "fallback.json";
pub const HOME_ENV: &str = "KARTOTEKA_HOME";
pub const MODE_ENV: &str = "KARTOTEKA_ENV";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KartotekaConfig {
    /// Where the key-value fallback store is persisted.
    #[config(env = "KARTOTEKA_FALLBACK_FILE")]
    pub fallback_file: Option<PathBuf>,

    /// Data folder to use when none has been chosen yet.
    #[config(env = "KARTOTEKA_DATA_FOLDER")]
    pub data_folder: Option<PathBuf>,

    /// Autosave debounce delay in milliseconds.
    #[config(default = 2000, env = "KARTOTEKA_AUTOSAVE_DELAY_MS")]
    pub autosave_delay_ms: u64,

    #[config(default = "info", env = "KARTOTEKA_LOG_FILTER")]
    pub log_filter: String,

    /// Examination-type snapshots kept for revert.
    #[config(default = 10, env = "KARTOTEKA_HISTORY_LIMIT")]
    pub history_limit: usize,
}

impl Default for KartotekaConfig {
    fn default() -> Self {
        Self {
            fallback_file: None,
            data_folder: None,
            autosave_delay_ms: 2000,
            log_filter: "info".to_string(),
            history_limit: 10,
        }
    }
}

impl KartotekaConfig {
    /// Load from the environment and `config_file` (if it exists) over the defaults.
    pub fn load(config_file: &Path) -> Result<Self> {
        KartotekaConfig::builder()
            .env()
            .file(config_file)
            .load()
            .map_err(|e| KartotekaError::Config(e.to_string()))
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn fallback_path(&self, paths: &AppPaths) -> PathBuf {
        self.fallback_file
            .clone()
            .unwrap_or_else(|| paths.data_dir.join(FALLBACK_FILE_NAME))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dev,
    Prod,
}

impl Mode {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "dev" || v == "development" => Mode::Dev,
            _ => Mode::Prod,
        }
    }

    pub fn from_env() -> Self {
        Mode::parse(std::env::var(MODE_ENV).ok().as_deref())
    }
}

/// Where the config file and the default fallback store live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Everything under one directory. Used for `$KARTOTEKA_HOME` and in tests.
    pub fn under(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            config_dir: home.clone(),
            data_dir: home,
        }
    }

    /// `$KARTOTEKA_HOME` if set, otherwise the OS-appropriate directories.
    pub fn resolve() -> Result<Self> {
        if let Some(home) = std::env::var_os(HOME_ENV) {
            return Ok(Self::under(home));
        }
        let dirs = ProjectDirs::from("rs", "kartoteka", "kartoteka").ok_or_else(|| {
            KartotekaError::Config("could not determine a home directory".to_string())
        })?;
        Ok(Self {
            config_dir: dirs.config_dir().to_path_buf(),
            data_dir: dirs.data_dir().to_path_buf(),
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }
}
