//! Whole-document JSON reads and writes over a [`FileBridge`].
//!
//! Documents are always written pretty-printed (two-space indent) and parent
//! directories are created on demand. Writes are not atomic.

use super::bridge::FileBridge;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Read and decode a document. Fails with `NotFound` or `Serialization`.
pub fn read_json<T, B>(bridge: &B, path: &Path) -> Result<T>
where
    T: DeserializeOwned,
    B: FileBridge + ?Sized,
{
    let content = bridge.read_text(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Read a document, returning `default` when it is missing or unreadable.
pub fn read_json_or<T, B>(bridge: &B, path: &Path, default: T) -> T
where
    T: DeserializeOwned,
    B: FileBridge + ?Sized,
{
    match read_json(bridge, path) {
        Ok(value) => value,
        Err(e) if e.is_not_found() => default,
        Err(e) => {
            warn!("failed to read {}: {}", path.display(), e);
            default
        }
    }
}

/// Encode and write a document, creating its parent directory first.
pub fn try_write_json<T, B>(bridge: &B, path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    B: FileBridge + ?Sized,
{
    if let Some(parent) = path.parent() {
        bridge.create_directory(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    bridge.write_text(path, &content)
}

/// Like [`try_write_json`], but logs the failure and reports it as `false`.
pub fn write_json<T, B>(bridge: &B, path: &Path, value: &T) -> bool
where
    T: Serialize + ?Sized,
    B: FileBridge + ?Sized,
{
    match try_write_json(bridge, path, value) {
        Ok(()) => true,
        Err(e) => {
            warn!("failed to write {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KartotekaError;
    use crate::store::mem_bridge::MemBridge;
    use serde_json::{json, Value};

    #[test]
    fn test_write_then_read_nested_document() {
        let bridge = MemBridge::new();
        let path = Path::new("/data/deep/nested/doc.json");
        let doc = json!({
            "patients": [{"id": 1, "tags": ["a", "b"], "meta": {"x": null, "y": 2.5}}],
            "count": 1
        });

        assert!(write_json(&bridge, path, &doc));
        let back: Value = read_json(&bridge, path).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_written_document_is_pretty_printed() {
        let bridge = MemBridge::new();
        let path = Path::new("/data/doc.json");
        try_write_json(&bridge, path, &json!({"a": 1})).unwrap();
        assert_eq!(bridge.read_text(path).unwrap(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_read_missing_document() {
        let bridge = MemBridge::new();
        let path = Path::new("/data/none.json");

        let err = read_json::<Value, _>(&bridge, path).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(read_json_or(&bridge, path, json!([])), json!([]));
    }

    #[test]
    fn test_read_corrupt_document_falls_back_to_default() {
        let bridge = MemBridge::new();
        let path = Path::new("/data/bad.json");
        bridge.create_directory(Path::new("/data")).unwrap();
        bridge.write_text(path, "{ truncated").unwrap();

        assert!(matches!(
            read_json::<Value, _>(&bridge, path),
            Err(KartotekaError::Serialization(_))
        ));
        assert_eq!(read_json_or(&bridge, path, json!({"ok": true})), json!({"ok": true}));
    }

    #[test]
    fn test_write_failure_reports_false() {
        let bridge = MemBridge::new();
        bridge.set_simulate_write_error(true);
        assert!(try_write_json(&bridge, Path::new("/data/a.json"), &json!(1)).is_err());
        assert!(!write_json(&bridge, Path::new("/data/a.json"), &json!(1)));
    }
}
