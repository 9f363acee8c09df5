//! # Domain Model
//!
//! Plain records for the clinic: [`Patient`], [`User`], [`Appointment`],
//! [`MedicalReport`], [`ExaminationType`], [`AuditLog`] and [`ClinicInfo`].
//!
//! ## Ids
//!
//! Documents written by older versions carry numeric ids, newer ones carry strings.
//! [`EntityId`] accepts both. Ids generated here are UUID v4 strings.
//!
//! ## Schema Versions
//!
//! Every collection record has a `schemaVersion` field (missing means 0). The
//! [`Record::upgrade`] hook runs on every read, so old shapes are brought forward
//! lazily instead of through a migration step. Unknown fields are kept in a
//! flattened `extra` map and written back untouched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod appointment;
pub mod audit;
pub mod clinic;
pub mod examination_type;
pub mod patient;
pub mod report;
pub mod user;

pub use appointment::{Appointment, AppointmentStatus};
pub use audit::{AuditAction, AuditLog};
pub use clinic::ClinicInfo;
pub use examination_type::{ExaminationType, ExaminationTypeSnapshot};
pub use patient::Patient;
pub use report::{
    DoctorInfo, MedicalReport, PatientInfo, ReportEdit, ReportStatus, ReportSummary,
    ReportVersion, VerificationStatus, VisitType,
};
pub use user::{Role, User};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Number(i64),
    Text(String),
}

impl EntityId {
    pub fn generate() -> Self {
        EntityId::Text(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Number(n) => write!(f, "{}", n),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::Number(n)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Text(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::Text(s)
    }
}

/// A record stored in one of the id-keyed collections.
pub trait Record: Serialize + DeserializeOwned + Clone + Send {
    /// Schema version written by this build.
    const SCHEMA_VERSION: u32;

    fn id(&self) -> Option<&EntityId>;

    fn set_id(&mut self, id: EntityId);

    fn schema_version(&self) -> u32;

    /// Bring a record read from storage up to [`Record::SCHEMA_VERSION`].
    fn upgrade(self) -> Self;

    /// Assign a fresh id if the record has none. Returns the id.
    fn ensure_id(&mut self) -> EntityId {
        if let Some(id) = self.id() {
            return id.clone();
        }
        let id = EntityId::generate();
        self.set_id(id.clone());
        id
    }
}

/// Insert `item` or replace the record with the same id. Returns true if it replaced.
pub fn upsert<T: Record>(items: &mut Vec<T>, item: T) -> bool {
    let existing = item
        .id()
        .and_then(|id| items.iter().position(|i| i.id() == Some(id)));
    match existing {
        Some(pos) => {
            items[pos] = item;
            true
        }
        None => {
            items.push(item);
            false
        }
    }
}

pub fn find_by_id<'a, T: Record>(items: &'a [T], id: &EntityId) -> Option<&'a T> {
    items.iter().find(|i| i.id() == Some(id))
}

/// Append the records of `others` whose id `items` does not hold yet.
pub fn append_missing<T: Record>(items: &mut Vec<T>, others: Vec<T>) {
    for other in others {
        let known = other.id().is_some_and(|id| find_by_id(items, id).is_some());
        if !known {
            items.push(other);
        }
    }
}
