use crate::error::{KartotekaError, Result};
use std::path::Path;
use std::sync::Arc;

/// Abstract interface for raw file operations.
///
/// This trait handles the "how" of reaching the disk (real file system, memory,
/// or nothing at all), while the layout and façade layers decide "what" to write.
///
/// Missing files are an expected condition: `read_text` reports them as
/// [`KartotekaError::NotFound`] so callers can substitute a default. Only an
/// unavailable bridge or a permission problem is a real failure.
pub trait FileBridge: Send + Sync {
    /// True only when a usable file system sits behind this bridge.
    fn is_available(&self) -> bool;

    fn exists(&self, path: &Path) -> bool;

    /// Read a whole file as UTF-8. Returns `NotFound` if the file is absent.
    fn read_text(&self, path: &Path) -> Result<String>;

    /// Replace the file contents. The parent directory must already exist.
    fn write_text(&self, path: &Path, content: &str) -> Result<()>;

    /// Create the directory and its missing parents. Succeeds if it already exists.
    fn create_directory(&self, path: &Path) -> Result<()>;

    /// Names (not paths) of the direct children of `path`, sorted.
    fn list_directory(&self, path: &Path) -> Result<Vec<String>>;

    /// Recursively copy `src` into `dest`, creating `dest` if needed.
    fn copy_directory(&self, src: &Path, dest: &Path) -> Result<()>;

    /// Pack `source_dir` into a compressed archive at `dest`, skipping the
    /// top-level entries named in `exclude`.
    fn create_archive(&self, source_dir: &Path, dest: &Path, exclude: &[&str]) -> Result<()>;

    /// Remove a file or a directory tree. Returns false if nothing was there.
    fn delete(&self, path: &Path) -> Result<bool>;
}

impl<B: FileBridge + ?Sized> FileBridge for Arc<B> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        (**self).read_text(path)
    }

    fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        (**self).write_text(path, content)
    }

    fn create_directory(&self, path: &Path) -> Result<()> {
        (**self).create_directory(path)
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<String>> {
        (**self).list_directory(path)
    }

    fn copy_directory(&self, src: &Path, dest: &Path) -> Result<()> {
        (**self).copy_directory(src, dest)
    }

    fn create_archive(&self, source_dir: &Path, dest: &Path, exclude: &[&str]) -> Result<()> {
        (**self).create_archive(source_dir, dest, exclude)
    }

    fn delete(&self, path: &Path) -> Result<bool> {
        (**self).delete(path)
    }
}

/// Bridge for hosts without file system access. Every operation fails with
/// [`KartotekaError::Unavailable`], so the façade stays in fallback-only mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBridge;

impl FileBridge for DisabledBridge {
    fn is_available(&self) -> bool {
        false
    }

    fn exists(&self, _path: &Path) -> bool {
        false
    }

    fn read_text(&self, _path: &Path) -> Result<String> {
        Err(KartotekaError::Unavailable)
    }

    fn write_text(&self, _path: &Path, _content: &str) -> Result<()> {
        Err(KartotekaError::Unavailable)
    }

    fn create_directory(&self, _path: &Path) -> Result<()> {
        Err(KartotekaError::Unavailable)
    }

    fn list_directory(&self, _path: &Path) -> Result<Vec<String>> {
        Err(KartotekaError::Unavailable)
    }

    fn copy_directory(&self, _src: &Path, _dest: &Path) -> Result<()> {
        Err(KartotekaError::Unavailable)
    }

    fn create_archive(&self, _source_dir: &Path, _dest: &Path, _exclude: &[&str]) -> Result<()> {
        Err(KartotekaError::Unavailable)
    }

    fn delete(&self, _path: &Path) -> Result<bool> {
        Err(KartotekaError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Patient;
    use crate::service::{DataStorage, DegradedReason, SaveOutcome, ServiceState};
    use crate::store::MemoryFallback;

    #[test]
    fn test_disabled_bridge_refuses_everything() {
        let bridge = DisabledBridge;
        let path = Path::new("/clinic/a.json");
        assert!(!bridge.is_available());
        assert!(!bridge.exists(path));
        assert!(matches!(bridge.read_text(path), Err(KartotekaError::Unavailable)));
        assert!(matches!(bridge.delete(path), Err(KartotekaError::Unavailable)));
    }

    #[test]
    fn test_storage_over_disabled_bridge_keeps_working() {
        let storage = DataStorage::new(DisabledBridge, MemoryFallback::new());
        assert!(!storage.initialize(Path::new("/clinic")));
        assert_eq!(storage.state(), ServiceState::FallbackOnly);

        let saved = storage.save_patient(Patient::new("Ana", "Marković"));
        assert_eq!(
            saved.outcome,
            SaveOutcome::FallbackOnly(DegradedReason::BackendUnavailable)
        );
        assert_eq!(storage.get_patients().len(), 1);
    }
}
