//! # Fallback Store
//!
//! A flat string key-value store that is always written, whether or not a file
//! bridge is available. It mirrors every collection the façade saves and holds the
//! small bits of session state (current user, data folder, drafts).
//!
//! Values are JSON text. [`get_json`] and [`set_json`] handle the encoding.
//!
//! ## Implementations
//!
//! - [`MemoryFallback`]: process-local map, used in tests and as a last resort.
//! - [`JsonFileFallback`]: the whole map persisted as one pretty-printed JSON object.

use crate::error::{KartotekaError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod keys {
    pub const PATIENTS: &str = "patients";
    pub const USERS: &str = "users";
    pub const APPOINTMENTS: &str = "appointments";
    pub const EXAMINATION_TYPES: &str = "examination-types";
    pub const EXAMINATION_TYPES_HISTORY: &str = "examination-types-history";
    pub const REPORTS: &str = "reports";
    pub const DATA_FOLDER_PATH: &str = "dataFolderPath";
    pub const CURRENT_USER: &str = "currentUser";
    pub const AUDIT_LOGS: &str = "auditLogs";
    pub const CLINIC_INFO: &str = "clinicInfo";
    pub const CLINIC_LOGO: &str = "clinicLogo";

    pub fn autosave(key: &str) -> String {
        format!("autosave_{}", key)
    }

    pub fn patient_history(id: &str) -> String {
        format!("patient-history-{}", id)
    }

    pub fn clinical(patient_id: &str) -> String {
        format!("clinical-{}", patient_id)
    }
}

pub trait FallbackStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;
}

impl<F: FallbackStore + ?Sized> FallbackStore for std::sync::Arc<F> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

/// Read and decode a JSON value. Missing keys are `Ok(None)`.
pub fn get_json<T, F>(store: &F, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    F: FallbackStore + ?Sized,
{
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn set_json<T, F>(store: &F, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FallbackStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MemoryFallback {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryFallback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FallbackStore for MemoryFallback {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(lock(&self.entries).keys().cloned().collect())
    }
}

/// Fallback store persisted to a single JSON file.
///
/// The map is loaded once at open and rewritten in full on every change.
pub struct JsonFileFallback {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileFallback {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| KartotekaError::from_io(e, &path))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| KartotekaError::from_io(e, parent))?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content).map_err(|e| KartotekaError::from_io(e, &self.path))
    }
}

impl FallbackStore for JsonFileFallback {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(lock(&self.entries).keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_helpers_round_trip() {
        let store = MemoryFallback::new();
        set_json(&store, "clinicInfo", &json!({"name": "Ordinacija"})).unwrap();

        let loaded: Option<serde_json::Value> = get_json(&store, "clinicInfo").unwrap();
        assert_eq!(loaded, Some(json!({"name": "Ordinacija"})));

        let missing: Option<serde_json::Value> = get_json(&store, "nothing").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_get_json_reports_corrupt_value() {
        let store = MemoryFallback::new();
        store.set("patients", "not json").unwrap();
        let res: Result<Option<Vec<serde_json::Value>>> = get_json(&store, "patients");
        assert!(matches!(res, Err(KartotekaError::Serialization(_))));
    }

    #[test]
    fn test_json_file_fallback_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("fallback.json");

        let store = JsonFileFallback::open(&path).unwrap();
        store.set(keys::DATA_FOLDER_PATH, "\"/clinic\"").unwrap();
        store.set("temp", "1").unwrap();
        store.remove("temp").unwrap();
        drop(store);

        let reopened = JsonFileFallback::open(&path).unwrap();
        assert_eq!(
            reopened.get(keys::DATA_FOLDER_PATH).unwrap().as_deref(),
            Some("\"/clinic\"")
        );
        assert_eq!(reopened.keys().unwrap(), vec![keys::DATA_FOLDER_PATH.to_string()]);
    }

    #[test]
    fn test_key_builders() {
        assert_eq!(keys::autosave("report-7"), "autosave_report-7");
        assert_eq!(keys::patient_history("12"), "patient-history-12");
        assert_eq!(keys::clinical("12"), "clinical-12");
    }
}
