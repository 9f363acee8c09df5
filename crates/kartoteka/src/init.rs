//! # Context Construction
//!
//! Wires the production pieces together: configuration, the file-backed fallback
//! store, the real file bridge and the [`DataStorage`] façade on top.
//!
//! ```text
//! AppPaths::resolve() ──▶ KartotekaConfig::load() ──▶ JsonFileFallback::open()
//!                                                          │
//!                         FsBridge ────────────────────────┴──▶ DataStorage::new()
//! ```
//!
//! The context is built once by the host and passed to whatever needs storage.
//! There is no global instance. Form autosave shares the same fallback store, so
//! drafts and records land in one file.

use crate::autosave::{Autosave, AutosaveOptions};
use crate::config::{AppPaths, KartotekaConfig};
use crate::error::Result;
use crate::service::DataStorage;
use crate::store::fallback::{self, keys};
use crate::store::{FsBridge, JsonFileFallback};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

pub type Fallback = Arc<JsonFileFallback>;
pub type Storage = DataStorage<FsBridge, Fallback>;

pub struct KartotekaContext {
    pub storage: Storage,
    pub config: KartotekaConfig,
    pub paths: AppPaths,
}

/// Resolve paths, load configuration and open storage.
pub fn initialize() -> Result<KartotekaContext> {
    let paths = AppPaths::resolve()?;
    let config = KartotekaConfig::load(&paths.config_file())?;
    build_context(config, paths)
}

/// Open storage for an already loaded configuration.
pub fn build_context(config: KartotekaConfig, paths: AppPaths) -> Result<KartotekaContext> {
    let fallback_path = config.fallback_path(&paths);
    debug!("opening fallback store at {}", fallback_path.display());
    let fallback = Arc::new(JsonFileFallback::open(&fallback_path)?);

    if let Some(folder) = &config.data_folder {
        let existing: Option<String> = fallback::get_json(&fallback, keys::DATA_FOLDER_PATH)?;
        if existing.is_none() {
            info!("seeding data folder from config: {}", folder.display());
            fallback::set_json(
                fallback.as_ref(),
                keys::DATA_FOLDER_PATH,
                &folder.to_string_lossy(),
            )?;
        }
    }

    let storage =
        DataStorage::new(FsBridge::new(), fallback).with_history_limit(config.history_limit);
    Ok(KartotekaContext {
        storage,
        config,
        paths,
    })
}

impl KartotekaContext {
    /// Options for a form autosave under `key`, with the configured delay.
    pub fn autosave_options<T>(&self, key: &str) -> AutosaveOptions<T> {
        AutosaveOptions::new(key).delay(self.config.autosave_delay())
    }

    /// An autosave writing its drafts to this context's fallback store.
    pub fn autosave<T>(&self, options: AutosaveOptions<T>) -> Autosave<T, Fallback>
    where
        T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        Autosave::new(options, Arc::clone(self.storage.fallback()))
    }
}
