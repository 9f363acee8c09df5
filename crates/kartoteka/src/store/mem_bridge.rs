use super::bridge::FileBridge;
use crate::error::{KartotekaError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Tree {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
}

impl Tree {
    fn add_dir(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }

    fn children(&self, path: &Path) -> BTreeSet<String> {
        let file_names = self.files.keys();
        let dir_names = self.dirs.iter();
        file_names
            .chain(dir_names)
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect()
    }
}

/// In-memory file bridge for testing.
///
/// Uses a `Mutex` so the bridge can be shared with the façade and still be
/// inspected from the test. Every I/O call increments a counter, which lets
/// tests assert that a fallback-only service never touched the disk.
pub struct MemBridge {
    tree: Mutex<Tree>,
    available: bool,
    simulate_write_error: AtomicBool,
    calls: AtomicUsize,
}

impl Default for MemBridge {
    fn default() -> Self {
        Self {
            tree: Mutex::new(Tree::default()),
            available: true,
            simulate_write_error: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MemBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bridge that reports itself unavailable, as on a host without file access.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    /// Enable write error simulation for testing degraded saves.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Number of I/O operations performed so far (`is_available` is not counted).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Test helper: all file paths currently stored.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.tree().files.keys().cloned().collect()
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.available {
            Ok(())
        } else {
            Err(KartotekaError::Unavailable)
        }
    }

    fn check_write(&self) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(KartotekaError::Store("Simulated write error".to_string()));
        }
        Ok(())
    }
}

impl FileBridge for MemBridge {
    fn is_available(&self) -> bool {
        self.available
    }

    fn exists(&self, path: &Path) -> bool {
        if self.touch().is_err() {
            return false;
        }
        let tree = self.tree();
        tree.files.contains_key(path) || tree.dirs.contains(path)
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        self.touch()?;
        self.tree()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| KartotekaError::NotFound(path.to_path_buf()))
    }

    fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        self.touch()?;
        self.check_write()?;
        let mut tree = self.tree();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !tree.dirs.contains(parent) {
                return Err(KartotekaError::NotFound(parent.to_path_buf()));
            }
        }
        tree.files.insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn create_directory(&self, path: &Path) -> Result<()> {
        self.touch()?;
        self.check_write()?;
        self.tree().add_dir(path);
        Ok(())
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<String>> {
        self.touch()?;
        let tree = self.tree();
        if !tree.dirs.contains(path) {
            return Err(KartotekaError::NotFound(path.to_path_buf()));
        }
        Ok(tree.children(path).into_iter().collect())
    }

    fn copy_directory(&self, src: &Path, dest: &Path) -> Result<()> {
        self.touch()?;
        self.check_write()?;
        let mut tree = self.tree();
        if !tree.dirs.contains(src) {
            return Err(KartotekaError::NotFound(src.to_path_buf()));
        }
        let dirs: Vec<PathBuf> = tree
            .dirs
            .iter()
            .filter_map(|d| d.strip_prefix(src).ok().map(|rel| dest.join(rel)))
            .collect();
        let files: Vec<(PathBuf, String)> = tree
            .files
            .iter()
            .filter_map(|(p, c)| p.strip_prefix(src).ok().map(|rel| (dest.join(rel), c.clone())))
            .collect();
        tree.add_dir(dest);
        for dir in dirs {
            tree.add_dir(&dir);
        }
        tree.files.extend(files);
        Ok(())
    }

    /// Writes a JSON listing of the archived relative paths instead of a real archive.
    fn create_archive(&self, source_dir: &Path, dest: &Path, exclude: &[&str]) -> Result<()> {
        self.touch()?;
        self.check_write()?;
        let mut tree = self.tree();
        if !tree.dirs.contains(source_dir) {
            return Err(KartotekaError::NotFound(source_dir.to_path_buf()));
        }
        let listed: Vec<String> = tree
            .files
            .keys()
            .filter_map(|p| p.strip_prefix(source_dir).ok())
            .filter(|rel| {
                rel.components()
                    .next()
                    .map(|c| !exclude.contains(&c.as_os_str().to_string_lossy().as_ref()))
                    .unwrap_or(false)
            })
            .map(|rel| rel.to_string_lossy().into_owned())
            .collect();
        let content = serde_json::to_string_pretty(&listed)?;
        if let Some(parent) = dest.parent() {
            tree.add_dir(parent);
        }
        tree.files.insert(dest.to_path_buf(), content);
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<bool> {
        self.touch()?;
        self.check_write()?;
        let mut tree = self.tree();
        let before = tree.files.len() + tree.dirs.len();
        tree.files.retain(|p, _| !p.starts_with(path));
        tree.dirs.retain(|p| !p.starts_with(path));
        Ok(tree.files.len() + tree.dirs.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_requires_parent_directory() {
        let bridge = MemBridge::new();
        let err = bridge
            .write_text(Path::new("/data/a.json"), "{}")
            .unwrap_err();
        assert!(err.is_not_found());

        bridge.create_directory(Path::new("/data")).unwrap();
        bridge.write_text(Path::new("/data/a.json"), "{}").unwrap();
        assert_eq!(bridge.read_text(Path::new("/data/a.json")).unwrap(), "{}");
    }

    #[test]
    fn test_list_directory_returns_direct_children() {
        let bridge = MemBridge::new();
        bridge.create_directory(Path::new("/data/a/b")).unwrap();
        bridge.write_text(Path::new("/data/x.json"), "1").unwrap();
        bridge.write_text(Path::new("/data/a/b/y.json"), "2").unwrap();

        let names = bridge.list_directory(Path::new("/data")).unwrap();
        assert_eq!(names, vec!["a".to_string(), "x.json".to_string()]);
    }

    #[test]
    fn test_delete_removes_subtree() {
        let bridge = MemBridge::new();
        bridge.create_directory(Path::new("/data/a")).unwrap();
        bridge.write_text(Path::new("/data/a/y.json"), "2").unwrap();

        assert!(bridge.delete(Path::new("/data/a")).unwrap());
        assert!(!bridge.exists(Path::new("/data/a/y.json")));
        assert!(!bridge.delete(Path::new("/data/a")).unwrap());
    }

    #[test]
    fn test_unavailable_bridge_counts_calls_and_fails() {
        let bridge = MemBridge::unavailable();
        assert!(!bridge.is_available());
        assert_eq!(bridge.call_count(), 0);

        assert!(matches!(
            bridge.read_text(Path::new("/x")),
            Err(KartotekaError::Unavailable)
        ));
        assert_eq!(bridge.call_count(), 1);
    }

    #[test]
    fn test_simulated_write_error() {
        let bridge = MemBridge::new();
        bridge.create_directory(Path::new("/data")).unwrap();
        bridge.set_simulate_write_error(true);
        assert!(bridge.write_text(Path::new("/data/a.json"), "{}").is_err());
    }

    #[test]
    fn test_archive_skips_excluded_top_level_entries() {
        let bridge = MemBridge::new();
        bridge.create_directory(Path::new("/data/keep")).unwrap();
        bridge.create_directory(Path::new("/data/skip")).unwrap();
        bridge.write_text(Path::new("/data/keep/a.json"), "1").unwrap();
        bridge.write_text(Path::new("/data/skip/b.json"), "2").unwrap();

        bridge
            .create_archive(Path::new("/data"), Path::new("/data/skip/out.zip"), &["skip"])
            .unwrap();

        let listing: Vec<String> =
            serde_json::from_str(&bridge.read_text(Path::new("/data/skip/out.zip")).unwrap())
                .unwrap();
        assert_eq!(listing, vec!["keep/a.json".to_string()]);
    }
}
