use super::bridge::FileBridge;
use crate::error::{KartotekaError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::Path;

/// Production bridge over `std::fs`.
///
/// Writes go straight to the target file. There is no temp-file-then-rename step,
/// so a crash mid-write can leave a truncated document behind.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsBridge;

impl FsBridge {
    pub fn new() -> Self {
        Self
    }
}

fn copy_dir_all(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| KartotekaError::from_io(e, dest))?;
    let entries = fs::read_dir(src).map_err(|e| KartotekaError::from_io(e, src))?;
    for entry in entries {
        let entry = entry.map_err(KartotekaError::Io)?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_dir_all(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| KartotekaError::from_io(e, &from))?;
        }
    }
    Ok(())
}

impl FileBridge for FsBridge {
    fn is_available(&self) -> bool {
        true
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| KartotekaError::from_io(e, path))
    }

    fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content).map_err(|e| KartotekaError::from_io(e, path))
    }

    fn create_directory(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(path).map_err(|e| KartotekaError::from_io(e, path))
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<String>> {
        let entries = fs::read_dir(path).map_err(|e| KartotekaError::from_io(e, path))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(KartotekaError::Io)?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn copy_directory(&self, src: &Path, dest: &Path) -> Result<()> {
        if !src.is_dir() {
            return Err(KartotekaError::NotFound(src.to_path_buf()));
        }
        copy_dir_all(src, dest)
    }

    fn create_archive(&self, source_dir: &Path, dest: &Path, exclude: &[&str]) -> Result<()> {
        if !source_dir.is_dir() {
            return Err(KartotekaError::NotFound(source_dir.to_path_buf()));
        }
        if let Some(parent) = dest.parent() {
            self.create_directory(parent)?;
        }

        let file = File::create(dest).map_err(|e| KartotekaError::from_io(e, dest))?;
        let enc = GzEncoder::new(file, Compression::default());
        let mut tar = tar::Builder::new(enc);

        let entries = fs::read_dir(source_dir).map_err(|e| KartotekaError::from_io(e, source_dir))?;
        for entry in entries {
            let entry = entry.map_err(KartotekaError::Io)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if exclude.contains(&name.as_str()) {
                continue;
            }
            let path = entry.path();
            let appended = if path.is_dir() {
                tar.append_dir_all(&name, &path)
            } else {
                tar.append_path_with_name(&path, &name)
            };
            appended.map_err(|e| KartotekaError::Archive(format!("{}: {}", path.display(), e)))?;
        }

        let enc = tar
            .into_inner()
            .map_err(|e| KartotekaError::Archive(e.to_string()))?;
        enc.finish()
            .map_err(|e| KartotekaError::Archive(e.to_string()))?;
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<bool> {
        if path.is_dir() {
            fs::remove_dir_all(path).map_err(|e| KartotekaError::from_io(e, path))?;
            Ok(true)
        } else if path.exists() {
            fs::remove_file(path).map_err(|e| KartotekaError::from_io(e, path))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
