//! # Data Storage Service
//!
//! [`DataStorage`] is the single entry point every feature uses for persistence.
//! It owns the data-folder setting, decides per call whether the file backend is
//! usable, and keeps the fallback store in step with every write.
//!
//! ## States
//!
//! ```text
//! Uninitialized ──initialize──▶ Initializing ──ok──▶ Ready
//!                                    │
//!                                    └──no bridge / error──▶ FallbackOnly
//! ```
//!
//! The constructor reads the persisted data folder and initializes right away when
//! one is set. A later [`DataStorage::initialize`] can move the service from
//! `FallbackOnly` back to `Ready`.
//!
//! ## Read Path
//!
//! - `FallbackOnly`: read the fallback store. The bridge is never touched.
//! - `Ready`: read the index document, using the fallback copy when the document
//!   is missing or unreadable. A missing file never shows up as an empty list.
//!
//! ## Write Path
//!
//! 1. Assign an id if the record has none.
//! 2. Upsert into the current list and write it to the fallback store. Always.
//! 3. If `Ready`, write the index document (and per-record files) through the
//!    bridge, then append a line to the system log.
//!
//! A failed file write is logged and reported as
//! [`SaveOutcome::FallbackOnly`]. It never undoes the fallback write and never
//! surfaces as an error. Each collection's read-modify-write cycle runs under its
//! own lock, so two callers cannot drop each other's updates.
//!
//! ## Module Overview
//!
//! - [`patients`], [`users`], [`appointments`], [`reports`], [`examination_types`]:
//!   per-collection operations
//! - [`settings`]: clinic info, logo and per-patient clinical data
//! - [`backup`]: archives and data-folder migration

use crate::error::{KartotekaError, Result};
use crate::model::{append_missing, find_by_id, upsert, AuditLog, EntityId, Record};
use crate::store::fallback::{self, keys, FallbackStore};
use crate::store::layout::{self, IndexFile, Layout};
use crate::store::system_log::{self, LogEntry};
use crate::store::FileBridge;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

pub mod appointments;
pub mod backup;
pub mod examination_types;
pub mod patients;
pub mod reports;
pub mod settings;
pub mod users;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
    FallbackOnly,
}

/// Why a save reached only the fallback store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedReason {
    /// No usable file backend (no bridge, or no data folder initialized).
    BackendUnavailable,
    /// The backend was ready but the file write failed.
    WriteFailed,
}

/// Why a save did not happen at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    FallbackWrite,
}

/// Result of a save through the façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written to the fallback store and to disk.
    Durable,
    /// Written to the fallback store only.
    FallbackOnly(DegradedReason),
    Failed(FailureReason),
}

impl SaveOutcome {
    /// The plain success flag: true whenever the fallback store was updated.
    pub fn succeeded(&self) -> bool {
        !matches!(self, SaveOutcome::Failed(_))
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, SaveOutcome::Durable)
    }
}

/// A saved record together with how far the save got.
#[derive(Debug, Clone, PartialEq)]
pub struct Saved<T> {
    pub record: T,
    pub outcome: SaveOutcome,
}

/// An id-keyed collection: its fallback key, its index document and its lock slot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Collection {
    pub key: &'static str,
    pub index: IndexFile,
    pub label: &'static str,
    slot: usize,
}

pub(crate) const PATIENTS: Collection = Collection {
    key: keys::PATIENTS,
    index: layout::PATIENTS_INDEX,
    label: "patient",
    slot: 0,
};

pub(crate) const USERS: Collection = Collection {
    key: keys::USERS,
    index: layout::USERS_INDEX,
    label: "user",
    slot: 1,
};

pub(crate) const APPOINTMENTS: Collection = Collection {
    key: keys::APPOINTMENTS,
    index: layout::APPOINTMENTS_INDEX,
    label: "appointment",
    slot: 2,
};

pub(crate) const REPORTS: Collection = Collection {
    key: keys::REPORTS,
    index: layout::REPORTS_INDEX,
    label: "report",
    slot: 3,
};

pub(crate) const EXAMINATION_TYPES: Collection = Collection {
    key: keys::EXAMINATION_TYPES,
    index: layout::EXAMINATION_TYPES_INDEX,
    label: "examination type",
    slot: 4,
};

const AUDIT_SLOT: usize = 5;
const SETTINGS_SLOT: usize = 6;
const LOCK_SLOTS: usize = 7;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

struct Backend {
    state: ServiceState,
    layout: Option<Layout>,
}

pub struct DataStorage<B: FileBridge, F: FallbackStore> {
    bridge: B,
    fallback: F,
    backend: RwLock<Backend>,
    locks: [Mutex<()>; LOCK_SLOTS],
    history_limit: usize,
}

impl<B: FileBridge, F: FallbackStore> DataStorage<B, F> {
    /// Build the service and, if a data folder was saved earlier, initialize it.
    pub fn new(bridge: B, fallback: F) -> Self {
        let storage = Self {
            bridge,
            fallback,
            backend: RwLock::new(Backend {
                state: ServiceState::Uninitialized,
                layout: None,
            }),
            locks: Default::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        };

        match storage.data_folder() {
            Some(path) => {
                storage.initialize(&path);
            }
            None => debug!("no data folder configured, using fallback store"),
        }
        storage
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    pub fn state(&self) -> ServiceState {
        self.read_backend().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Ready
    }

    /// The data folder in use, if the file backend is ready.
    pub fn base_path(&self) -> Option<PathBuf> {
        self.read_backend()
            .layout
            .as_ref()
            .map(|l| l.base().to_path_buf())
    }

    /// The data folder persisted in the fallback store, whether or not it is usable.
    pub fn data_folder(&self) -> Option<PathBuf> {
        match fallback::get_json::<String, _>(&self.fallback, keys::DATA_FOLDER_PATH) {
            Ok(path) => path.filter(|p| !p.trim().is_empty()).map(PathBuf::from),
            Err(e) => {
                warn!("unreadable data folder setting: {}", e);
                None
            }
        }
    }

    /// Try to make `path` the active data folder.
    ///
    /// On success the folder taxonomy exists, the path is persisted and the
    /// service is `Ready`. On failure the service is `FallbackOnly`.
    pub fn initialize(&self, path: &Path) -> bool {
        self.write_backend().state = ServiceState::Initializing;

        if !self.bridge.is_available() {
            debug!("file bridge unavailable, staying on fallback store");
            self.set_backend(ServiceState::FallbackOnly, None);
            return false;
        }

        let layout = Layout::new(path);
        match layout::initialize(&self.bridge, &layout) {
            Ok(()) => {
                let path_text = path.to_string_lossy().into_owned();
                if let Err(e) = fallback::set_json(&self.fallback, keys::DATA_FOLDER_PATH, &path_text)
                {
                    error!("failed to persist data folder setting: {}", e);
                }
                info!("data folder ready at {}", path.display());
                system_log::log_action(&self.bridge, &layout, "Data folder initialized");
                self.set_backend(ServiceState::Ready, Some(layout));
                true
            }
            Err(e) => {
                warn!("failed to initialize data folder {}: {}", path.display(), e);
                self.set_backend(ServiceState::FallbackOnly, None);
                false
            }
        }
    }

    pub fn get_system_logs(&self) -> Vec<LogEntry> {
        let Some(layout) = self.layout_if_ready() else {
            return Vec::new();
        };
        system_log::read_logs(&self.bridge, &layout).unwrap_or_else(|e| {
            warn!("failed to read system log: {}", e);
            Vec::new()
        })
    }

    // --- Audit trail ---

    /// Append to the user-facing audit log. Never truncated, never mirrored to disk.
    pub fn append_audit(&self, entry: AuditLog) -> SaveOutcome {
        let _guard = self.lock_slot(AUDIT_SLOT);
        let mut logs: Vec<AuditLog> = self.fallback_list(keys::AUDIT_LOGS);
        logs.push(entry);
        match fallback::set_json(&self.fallback, keys::AUDIT_LOGS, &logs) {
            Ok(()) => SaveOutcome::FallbackOnly(DegradedReason::BackendUnavailable),
            Err(e) => {
                error!("failed to append audit entry: {}", e);
                SaveOutcome::Failed(FailureReason::FallbackWrite)
            }
        }
    }

    pub fn get_audit_logs(&self) -> Vec<AuditLog> {
        self.fallback_list(keys::AUDIT_LOGS)
    }

    /// Who to record as `performedBy`: the logged-in user's name or email.
    pub(crate) fn actor(&self) -> Option<String> {
        self.current_user()
            .map(|u| u.name.clone().unwrap_or_else(|| u.email.clone()))
    }

    // --- Internals shared by the collection modules ---

    fn read_backend(&self) -> std::sync::RwLockReadGuard<'_, Backend> {
        self.backend.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_backend(&self) -> std::sync::RwLockWriteGuard<'_, Backend> {
        self.backend.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_backend(&self, state: ServiceState, layout: Option<Layout>) {
        let mut backend = self.write_backend();
        backend.state = state;
        backend.layout = layout;
    }

    pub(crate) fn layout_if_ready(&self) -> Option<Layout> {
        let backend = self.read_backend();
        match backend.state {
            ServiceState::Ready => backend.layout.clone(),
            _ => None,
        }
    }

    fn lock_slot(&self, slot: usize) -> MutexGuard<'_, ()> {
        self.locks[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock(&self, collection: &Collection) -> MutexGuard<'_, ()> {
        self.lock_slot(collection.slot)
    }

    pub(crate) fn lock_settings(&self) -> MutexGuard<'_, ()> {
        self.lock_slot(SETTINGS_SLOT)
    }

    /// Decode a list from the fallback store; missing or corrupt means empty.
    pub(crate) fn fallback_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match fallback::get_json::<Vec<T>, _>(&self.fallback, key) {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                warn!("fallback entry '{}' unreadable: {}", key, e);
                Vec::new()
            }
        }
    }

    pub(crate) fn fallback_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        fallback::get_json(&self.fallback, key).unwrap_or_else(|e| {
            warn!("fallback entry '{}' unreadable: {}", key, e);
            None
        })
    }

    pub(crate) fn store_fallback<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        fallback::set_json(&self.fallback, key, value)
    }

    /// Read-through load. The fallback copy wins for every id it holds; index
    /// records it lacks (a folder filled on another machine) are appended.
    pub(crate) fn load<T: Record>(&self, collection: &Collection) -> Vec<T> {
        let mut items: Vec<T> = self.fallback_list(collection.key);
        if let Some(layout) = self.layout_if_ready() {
            let path = layout.index_path(&collection.index);
            match layout::read_index(&self.bridge, &path, collection.index.field) {
                Ok(on_disk) => append_missing(&mut items, on_disk),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("failed to read {}: {}", path.display(), e),
            }
        }
        items.into_iter().map(T::upgrade).collect()
    }

    /// Run a file-side write if the backend is ready and log it on success.
    pub(crate) fn mirror<W>(&self, action: &str, write: W) -> SaveOutcome
    where
        W: FnOnce(&B, &Layout) -> Result<()>,
    {
        let Some(layout) = self.layout_if_ready() else {
            return SaveOutcome::FallbackOnly(DegradedReason::BackendUnavailable);
        };
        match write(&self.bridge, &layout) {
            Ok(()) => {
                system_log::log_action(&self.bridge, &layout, action);
                SaveOutcome::Durable
            }
            Err(e) => {
                warn!("file backend write failed ({}): {}", action, e);
                SaveOutcome::FallbackOnly(DegradedReason::WriteFailed)
            }
        }
    }

    /// Write a whole list: fallback first, then the index document. Caller holds the lock.
    pub(crate) fn persist_list<T: Record>(
        &self,
        collection: &Collection,
        items: &[T],
        action: &str,
    ) -> SaveOutcome {
        if let Err(e) = self.store_fallback(collection.key, items) {
            error!("failed to write '{}' to fallback store: {}", collection.key, e);
            return SaveOutcome::Failed(FailureReason::FallbackWrite);
        }
        self.mirror(action, |bridge, layout| {
            let path = layout.index_path(&collection.index);
            layout::write_index(bridge, &path, collection.index.field, items)
        })
    }

    /// Upsert one record by id.
    pub(crate) fn save_one<T: Record>(&self, collection: &Collection, mut item: T) -> Saved<T> {
        let id = item.ensure_id();
        let _guard = self.lock(collection);
        let mut items: Vec<T> = self.load(collection);
        upsert(&mut items, item.clone());
        let outcome = self.persist_list(
            collection,
            &items,
            &format!("Saved {} {}", collection.label, id),
        );
        Saved {
            record: item,
            outcome,
        }
    }

    /// Replace the whole collection.
    pub(crate) fn save_all<T: Record>(&self, collection: &Collection, mut items: Vec<T>) -> SaveOutcome {
        for item in items.iter_mut() {
            item.ensure_id();
        }
        let _guard = self.lock(collection);
        self.persist_list(
            collection,
            &items,
            &format!("Saved {} {} records", items.len(), collection.label),
        )
    }

    /// Load one record, change it and save it back, all under the collection lock.
    pub(crate) fn update_one<T, U>(
        &self,
        collection: &Collection,
        id: &EntityId,
        change: U,
    ) -> Result<Saved<T>>
    where
        T: Record,
        U: FnOnce(&mut T) -> Result<()>,
    {
        let _guard = self.lock(collection);
        let mut items: Vec<T> = self.load(collection);
        let mut item = find_by_id(&items, id)
            .cloned()
            .ok_or_else(|| not_found(collection, id))?;
        change(&mut item)?;
        upsert(&mut items, item.clone());
        let outcome = self.persist_list(
            collection,
            &items,
            &format!("Updated {} {}", collection.label, id),
        );
        Ok(Saved {
            record: item,
            outcome,
        })
    }
}

pub(crate) fn not_found(collection: &Collection, id: &EntityId) -> KartotekaError {
    KartotekaError::Validation(format!("no {} with id {}", collection.label, id))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::store::{MemBridge, MemoryFallback};
    use std::sync::Arc;

    pub type TestStorage = DataStorage<Arc<MemBridge>, Arc<MemoryFallback>>;

    /// Service over an in-memory bridge, initialized at `/clinic`.
    pub fn ready() -> (TestStorage, Arc<MemBridge>, Arc<MemoryFallback>) {
        let bridge = Arc::new(MemBridge::new());
        let fallback = Arc::new(MemoryFallback::new());
        let storage = DataStorage::new(bridge.clone(), fallback.clone());
        assert!(storage.initialize(Path::new("/clinic")));
        (storage, bridge, fallback)
    }

    /// Service with no usable file backend.
    pub fn fallback_only() -> (TestStorage, Arc<MemBridge>, Arc<MemoryFallback>) {
        let bridge = Arc::new(MemBridge::unavailable());
        let fallback = Arc::new(MemoryFallback::new());
        let storage = DataStorage::new(bridge.clone(), fallback.clone());
        (storage, bridge, fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::model::{AuditAction, ExaminationType};
    use crate::store::{MemBridge, MemoryFallback};
    use std::sync::Arc;

    #[test]
    fn test_new_without_data_folder_is_uninitialized() {
        let storage = DataStorage::new(MemBridge::new(), MemoryFallback::new());
        assert_eq!(storage.state(), ServiceState::Uninitialized);
        assert!(storage.base_path().is_none());
    }

    #[test]
    fn test_new_initializes_persisted_data_folder() {
        let bridge = Arc::new(MemBridge::new());
        let fallback = Arc::new(MemoryFallback::new());
        fallback.set(keys::DATA_FOLDER_PATH, "\"/clinic\"").unwrap();

        let storage = DataStorage::new(bridge.clone(), fallback);
        assert_eq!(storage.state(), ServiceState::Ready);
        assert_eq!(storage.base_path(), Some(PathBuf::from("/clinic")));
        assert!(bridge.exists(Path::new("/clinic/Pacijenti/index.json")));
    }

    #[test]
    fn test_initialize_without_bridge_goes_fallback_only() {
        let (storage, bridge, fallback) = fallback_only();
        assert!(!storage.initialize(Path::new("/clinic")));
        assert_eq!(storage.state(), ServiceState::FallbackOnly);
        assert_eq!(bridge.call_count(), 0);
        assert!(fallback.get(keys::DATA_FOLDER_PATH).unwrap().is_none());
    }

    #[test]
    fn test_failed_initialize_can_recover() {
        let bridge = Arc::new(MemBridge::new());
        let storage = DataStorage::new(bridge.clone(), MemoryFallback::new());

        bridge.set_simulate_write_error(true);
        assert!(!storage.initialize(Path::new("/clinic")));
        assert_eq!(storage.state(), ServiceState::FallbackOnly);

        bridge.set_simulate_write_error(false);
        assert!(storage.initialize(Path::new("/clinic")));
        assert_eq!(storage.state(), ServiceState::Ready);
        assert_eq!(storage.data_folder(), Some(PathBuf::from("/clinic")));
    }

    #[test]
    fn test_initialize_twice_is_idempotent() {
        let (storage, bridge, _) = ready();
        let before = bridge.list_directory(Path::new("/clinic")).unwrap();
        assert!(storage.initialize(Path::new("/clinic")));
        assert_eq!(bridge.list_directory(Path::new("/clinic")).unwrap(), before);
    }

    #[test]
    fn test_initialize_writes_system_log() {
        let (storage, _, _) = ready();
        let logs = storage.get_system_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "Data folder initialized");
    }

    #[test]
    fn test_outcome_flags() {
        assert!(SaveOutcome::Durable.succeeded());
        assert!(SaveOutcome::Durable.is_durable());
        assert!(SaveOutcome::FallbackOnly(DegradedReason::WriteFailed).succeeded());
        assert!(!SaveOutcome::FallbackOnly(DegradedReason::WriteFailed).is_durable());
        assert!(!SaveOutcome::Failed(FailureReason::FallbackWrite).succeeded());
    }

    #[test]
    fn test_read_through_prefers_fallback_over_missing_index() {
        let (storage, bridge, _) = ready();
        let saved = storage.save_examination_type(ExaminationType::new("EKG", 15, 1200.0));
        assert!(saved.outcome.is_durable());

        bridge
            .delete(Path::new("/clinic/VrstePregleda/examination-types.json"))
            .unwrap();
        let types = storage.get_examination_types();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "EKG");
    }

    #[test]
    fn test_read_through_falls_back_on_corrupt_index() {
        let (storage, bridge, _) = ready();
        storage.save_examination_type(ExaminationType::new("EKG", 15, 1200.0));
        bridge
            .write_text(
                Path::new("/clinic/VrstePregleda/examination-types.json"),
                "{ broken",
            )
            .unwrap();
        assert_eq!(storage.get_examination_types().len(), 1);
    }

    #[test]
    fn test_failed_file_write_keeps_fallback_copy() {
        let (storage, bridge, fallback) = ready();
        bridge.set_simulate_write_error(true);

        let saved = storage.save_examination_type(ExaminationType::new("EKG", 15, 1200.0));
        assert_eq!(
            saved.outcome,
            SaveOutcome::FallbackOnly(DegradedReason::WriteFailed)
        );
        let mirrored: Vec<ExaminationType> =
            fallback::get_json(&*fallback, keys::EXAMINATION_TYPES)
                .unwrap()
                .unwrap();
        assert_eq!(mirrored.len(), 1);
    }

    #[test]
    fn test_save_after_failed_file_write_keeps_earlier_record() {
        let (storage, bridge, fallback) = ready();
        bridge.set_simulate_write_error(true);
        let first = storage.save_examination_type(ExaminationType::new("EKG", 15, 1200.0));
        assert_eq!(
            first.outcome,
            SaveOutcome::FallbackOnly(DegradedReason::WriteFailed)
        );
        assert_eq!(storage.get_examination_types().len(), 1);

        bridge.set_simulate_write_error(false);
        let second = storage.save_examination_type(ExaminationType::new("Holter", 60, 4000.0));
        assert!(second.outcome.is_durable());

        let names: Vec<String> = storage
            .get_examination_types()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["EKG", "Holter"]);
        let mirrored: Vec<ExaminationType> =
            fallback::get_json(&*fallback, keys::EXAMINATION_TYPES)
                .unwrap()
                .unwrap();
        assert_eq!(mirrored.len(), 2);
        let on_disk: Vec<ExaminationType> = layout::read_index(
            &*bridge,
            Path::new("/clinic/VrstePregleda/examination-types.json"),
            "types",
        )
        .unwrap();
        assert_eq!(on_disk.len(), 2);
    }

    #[test]
    fn test_records_only_in_index_are_loaded() {
        let (storage, bridge, _) = ready();
        bridge
            .write_text(
                Path::new("/clinic/VrstePregleda/examination-types.json"),
                r#"{"types": [{"id": 9, "name": "Holter", "duration": 60, "price": 4000}]}"#,
            )
            .unwrap();
        storage.save_examination_type(ExaminationType::new("EKG", 15, 1200.0));

        let types = storage.get_examination_types();
        assert_eq!(types.len(), 2);
        assert!(types.iter().any(|t| t.id == Some(EntityId::Number(9))));
    }

    #[test]
    fn test_audit_log_is_append_only() {
        let (storage, _, _) = fallback_only();
        storage.append_audit(AuditLog::new(AuditAction::View, "patient", Some(EntityId::Number(1))));
        storage.append_audit(AuditLog::new(AuditAction::Print, "report", None));

        let logs = storage.get_audit_logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action, AuditAction::View);
        assert_eq!(logs[1].action, AuditAction::Print);
    }

    #[test]
    fn test_concurrent_saves_do_not_lose_updates() {
        let (storage, _, _) = ready();
        let storage = Arc::new(storage);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    for j in 0..5 {
                        storage.save_examination_type(ExaminationType::new(
                            &format!("type {}-{}", i, j),
                            10,
                            100.0,
                        ));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(storage.get_examination_types().len(), 40);
    }
}
