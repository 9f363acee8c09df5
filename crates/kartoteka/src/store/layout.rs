//! # Data Folder Layout
//!
//! Every path below is relative to the user-chosen base directory:
//!
//! ```text
//! <base>/
//! ├── Pacijenti/
//! │   ├── index.json                  {"patients": [...]}
//! │   └── {name}_{jmbg}/karton.json   one patient snapshot
//! ├── Korisnici/users.json            {"users": [...]}
//! ├── Termini/appointments.json       {"appointments": [...]}
//! ├── Nalazi/
//! │   ├── index.json                  {"reports": [{id, patientId, date, type, doctor}]}
//! │   └── {reportId}.json             one full report
//! ├── Postavke/clinic-info.json
//! ├── VrstePregleda/examination-types.json   {"types": [...]}
//! ├── SigurnosneKopije/               backup archives
//! └── Logs/system-log.json            {"logs": [{timestamp, action}]}
//! ```
//!
//! [`initialize`] creates whatever is missing and never overwrites an existing
//! document, so it runs on every start.
//!
//! Patient folders are named once, from the name and JMBG at creation time, and
//! stored on the record as `folderName`. Renaming a patient later does not move
//! the folder.

use super::bridge::FileBridge;
use super::json_io;
use crate::error::{KartotekaError, Result};
use crate::model::{EntityId, Patient};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PATIENTS_DIR: &str = "Pacijenti";
pub const USERS_DIR: &str = "Korisnici";
pub const APPOINTMENTS_DIR: &str = "Termini";
pub const REPORTS_DIR: &str = "Nalazi";
pub const SETTINGS_DIR: &str = "Postavke";
pub const EXAMINATION_TYPES_DIR: &str = "VrstePregleda";
pub const BACKUPS_DIR: &str = "SigurnosneKopije";
pub const LOGS_DIR: &str = "Logs";

pub const ALL_DIRS: [&str; 8] = [
    PATIENTS_DIR,
    USERS_DIR,
    APPOINTMENTS_DIR,
    REPORTS_DIR,
    SETTINGS_DIR,
    EXAMINATION_TYPES_DIR,
    BACKUPS_DIR,
    LOGS_DIR,
];

const PATIENT_CHART_FILE: &str = "karton.json";

/// An index document: a JSON object holding one list under `field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFile {
    pub dir: &'static str,
    pub file: &'static str,
    pub field: &'static str,
}

pub const PATIENTS_INDEX: IndexFile = IndexFile {
    dir: PATIENTS_DIR,
    file: "index.json",
    field: "patients",
};

pub const USERS_INDEX: IndexFile = IndexFile {
    dir: USERS_DIR,
    file: "users.json",
    field: "users",
};

pub const APPOINTMENTS_INDEX: IndexFile = IndexFile {
    dir: APPOINTMENTS_DIR,
    file: "appointments.json",
    field: "appointments",
};

pub const REPORTS_INDEX: IndexFile = IndexFile {
    dir: REPORTS_DIR,
    file: "index.json",
    field: "reports",
};

pub const EXAMINATION_TYPES_INDEX: IndexFile = IndexFile {
    dir: EXAMINATION_TYPES_DIR,
    file: "examination-types.json",
    field: "types",
};

pub const SYSTEM_LOG_INDEX: IndexFile = IndexFile {
    dir: LOGS_DIR,
    file: "system-log.json",
    field: "logs",
};

const ALL_INDEXES: [IndexFile; 6] = [
    PATIENTS_INDEX,
    USERS_INDEX,
    APPOINTMENTS_INDEX,
    REPORTS_INDEX,
    EXAMINATION_TYPES_INDEX,
    SYSTEM_LOG_INDEX,
];

/// Resolves the fixed taxonomy against one base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    base: PathBuf,
}

impl Layout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn index_path(&self, index: &IndexFile) -> PathBuf {
        self.base.join(index.dir).join(index.file)
    }

    pub fn patient_chart(&self, folder: &str) -> PathBuf {
        self.base
            .join(PATIENTS_DIR)
            .join(folder)
            .join(PATIENT_CHART_FILE)
    }

    pub fn report_file(&self, id: &EntityId) -> PathBuf {
        self.base
            .join(REPORTS_DIR)
            .join(format!("{}.json", sanitize_component(&id.to_string())))
    }

    pub fn clinic_info_file(&self) -> PathBuf {
        self.base.join(SETTINGS_DIR).join("clinic-info.json")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.base.join(BACKUPS_DIR)
    }
}

/// Create missing directories and seed missing index documents.
pub fn initialize<B: FileBridge + ?Sized>(bridge: &B, layout: &Layout) -> Result<()> {
    bridge.create_directory(layout.base())?;
    for dir in ALL_DIRS {
        bridge.create_directory(&layout.base().join(dir))?;
    }

    for index in ALL_INDEXES {
        let path = layout.index_path(&index);
        if !bridge.exists(&path) {
            debug!("seeding {}", path.display());
            write_index::<Value, _>(bridge, &path, index.field, &[])?;
        }
    }

    let clinic = layout.clinic_info_file();
    if !bridge.exists(&clinic) {
        json_io::try_write_json(bridge, &clinic, &json!({}))?;
    }
    Ok(())
}

/// Read the list stored in an index document. A bare top-level array is accepted too.
pub fn read_index<T, B>(bridge: &B, path: &Path, field: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    B: FileBridge + ?Sized,
{
    let doc: Value = json_io::read_json(bridge, path)?;
    let items = match doc {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => map.remove(field).ok_or_else(|| {
            KartotekaError::Store(format!("{} has no '{}' list", path.display(), field))
        })?,
        _ => {
            return Err(KartotekaError::Store(format!(
                "{} is not an index document",
                path.display()
            )))
        }
    };
    Ok(serde_json::from_value(items)?)
}

pub fn write_index<T, B>(bridge: &B, path: &Path, field: &str, items: &[T]) -> Result<()>
where
    T: Serialize,
    B: FileBridge + ?Sized,
{
    let mut doc = Map::new();
    doc.insert(field.to_string(), serde_json::to_value(items)?);
    json_io::try_write_json(bridge, path, &Value::Object(doc))
}

fn sanitize_component(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `{name}_{jmbg}` with path-unsafe characters replaced. Falls back to the id
/// when the patient has no JMBG.
pub fn patient_folder_name(patient: &Patient) -> String {
    let name = patient.display_name();
    let name = if name.is_empty() {
        "pacijent".to_string()
    } else {
        sanitize_component(&name)
    };
    let suffix = patient
        .jmbg
        .as_deref()
        .map(str::trim)
        .filter(|j| !j.is_empty())
        .map(str::to_string)
        .or_else(|| patient.id.as_ref().map(|id| id.to_string()))
        .unwrap_or_default();
    if suffix.is_empty() {
        name
    } else {
        format!("{}_{}", name, sanitize_component(&suffix))
    }
}

/// Make sure the patient has a folder, write the chart snapshot into it and
/// return the folder name.
///
/// A folder already recorded on the patient is reused as-is. A derived name that
/// is taken by a different patient gets the id appended.
pub fn create_patient_directory<B: FileBridge + ?Sized>(
    bridge: &B,
    layout: &Layout,
    patient: &Patient,
) -> Result<String> {
    let folder = match patient.folder_name.as_deref().filter(|f| !f.is_empty()) {
        Some(existing) => existing.to_string(),
        None => {
            let derived = patient_folder_name(patient);
            let chart = layout.patient_chart(&derived);
            let taken_by_other = match json_io::read_json::<Patient, _>(bridge, &chart) {
                Ok(other) => other.id.is_some() && other.id != patient.id,
                Err(_) => false,
            };
            if taken_by_other {
                let id = patient.id.as_ref().map(|i| i.to_string()).unwrap_or_default();
                format!("{}_{}", derived, sanitize_component(&id))
            } else {
                derived
            }
        }
    };

    let mut snapshot = patient.clone();
    snapshot.folder_name = Some(folder.clone());
    json_io::try_write_json(bridge, &layout.patient_chart(&folder), &snapshot)?;
    Ok(folder)
}
