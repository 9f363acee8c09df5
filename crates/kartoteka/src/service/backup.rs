//! Backups and data-folder migration.
//!
//! A backup is a gzip tar of the whole data folder, minus the backup folder
//! itself, written to `SigurnosneKopije/backup_{YYYY-MM-DD_HH-MM-SS}.tar.gz`.
//! Both operations need a ready file backend and fail with `Unavailable` otherwise.

use super::DataStorage;
use crate::error::{KartotekaError, Result};
use crate::store::layout::{Layout, BACKUPS_DIR};
use crate::store::{system_log, FallbackStore, FileBridge};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

const BACKUP_PREFIX: &str = "backup_";
const BACKUP_SUFFIX: &str = ".tar.gz";

pub fn backup_file_name(at: chrono::DateTime<Local>) -> String {
    format!(
        "{}{}{}",
        BACKUP_PREFIX,
        at.format("%Y-%m-%d_%H-%M-%S"),
        BACKUP_SUFFIX
    )
}

impl<B: FileBridge, F: FallbackStore> DataStorage<B, F> {
    pub fn create_backup(&self) -> Result<PathBuf> {
        let layout = self.require_ready()?;
        let name = backup_file_name(Local::now());
        let dest = layout.backups_dir().join(&name);

        self.bridge()
            .create_archive(layout.base(), &dest, &[BACKUPS_DIR])?;
        info!("backup written to {}", dest.display());
        system_log::log_action(self.bridge(), &layout, &format!("Backup created: {}", name));
        Ok(dest)
    }

    /// Backup file names, oldest first.
    pub fn list_backups(&self) -> Result<Vec<String>> {
        let layout = self.require_ready()?;
        let mut names: Vec<String> = self
            .bridge()
            .list_directory(&layout.backups_dir())?
            .into_iter()
            .filter(|n| n.starts_with(BACKUP_PREFIX) && n.ends_with(BACKUP_SUFFIX))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Delete one backup by file name. `Ok(false)` if it did not exist.
    pub fn delete_backup(&self, name: &str) -> Result<bool> {
        let layout = self.require_ready()?;
        if name.contains(['/', '\\']) || name.contains("..") || !name.starts_with(BACKUP_PREFIX) {
            return Err(KartotekaError::Validation(format!(
                "not a backup file name: {}",
                name
            )));
        }
        let deleted = self.bridge().delete(&layout.backups_dir().join(name))?;
        if deleted {
            system_log::log_action(self.bridge(), &layout, &format!("Backup deleted: {}", name));
        }
        Ok(deleted)
    }

    /// Copy the current data folder to `new_path` and switch to it.
    ///
    /// The old folder is left in place.
    pub fn migrate_data_folder(&self, new_path: &Path) -> Result<()> {
        let layout = self.require_ready()?;
        if layout.base() == new_path {
            return Ok(());
        }
        if new_path.starts_with(layout.base()) {
            return Err(KartotekaError::Validation(format!(
                "{} is inside the current data folder",
                new_path.display()
            )));
        }

        self.bridge().copy_directory(layout.base(), new_path)?;
        if !self.initialize(new_path) {
            return Err(KartotekaError::Store(format!(
                "copied data but could not initialize {}",
                new_path.display()
            )));
        }
        info!(
            "data folder moved from {} to {}",
            layout.base().display(),
            new_path.display()
        );
        if let Some(new_layout) = self.layout_if_ready() {
            system_log::log_action(
                self.bridge(),
                &new_layout,
                &format!("Data folder migrated from {}", layout.base().display()),
            );
        }
        Ok(())
    }

    fn require_ready(&self) -> Result<Layout> {
        self.layout_if_ready().ok_or(KartotekaError::Unavailable)
    }
}
