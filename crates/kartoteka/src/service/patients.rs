//! Patient records.
//!
//! Besides the index entry, every patient gets a folder under `Pacijenti/` holding
//! a `karton.json` snapshot. The folder name is fixed on first save and kept on
//! the record, so later renames do not orphan the folder. The previous version of
//! a patient is pushed to `patient-history-{id}` on every update.

use super::{DataStorage, FailureReason, SaveOutcome, Saved, PATIENTS};
use crate::model::{find_by_id, upsert, AuditAction, AuditLog, EntityId, Patient, Record};
use crate::store::fallback::keys;
use crate::store::layout;
use crate::store::{FallbackStore, FileBridge};
use chrono::Utc;
use tracing::error;

impl<B: FileBridge, F: FallbackStore> DataStorage<B, F> {
    pub fn get_patients(&self) -> Vec<Patient> {
        self.load(&PATIENTS)
    }

    pub fn get_patient(&self, id: &EntityId) -> Option<Patient> {
        find_by_id(&self.get_patients(), id).cloned()
    }

    pub fn save_patient(&self, mut patient: Patient) -> Saved<Patient> {
        let id = patient.ensure_id();
        let now = Utc::now();
        patient.updated_at = Some(now);
        patient.schema_version = Patient::SCHEMA_VERSION;

        let _guard = self.lock(&PATIENTS);
        let mut patients: Vec<Patient> = self.load(&PATIENTS);
        let previous = find_by_id(&patients, &id).cloned();

        if patient.created_at.is_none() {
            patient.created_at = previous.as_ref().and_then(|p| p.created_at).or(Some(now));
        }
        if patient.folder_name.is_none() {
            patient.folder_name = previous.as_ref().and_then(|p| p.folder_name.clone());
        }
        if let Some(prev) = &previous {
            self.push_patient_history(&id, prev);
        }

        upsert(&mut patients, patient.clone());
        if let Err(e) = self.store_fallback(PATIENTS.key, &patients) {
            error!("failed to write patients to fallback store: {}", e);
            return Saved {
                record: patient,
                outcome: SaveOutcome::Failed(FailureReason::FallbackWrite),
            };
        }

        let mut folder = None;
        let outcome = self.mirror(&format!("Saved patient {}", id), |bridge, layout| {
            let name = layout::create_patient_directory(bridge, layout, &patient)?;
            if let Some(stored) = patients.iter_mut().find(|p| p.id.as_ref() == Some(&id)) {
                stored.folder_name = Some(name.clone());
            }
            let path = layout.index_path(&PATIENTS.index);
            layout::write_index(bridge, &path, PATIENTS.index.field, &patients)?;
            folder = Some(name);
            Ok(())
        });

        if let Some(name) = folder {
            if patient.folder_name.as_deref() != Some(name.as_str()) {
                patient.folder_name = Some(name);
                if let Err(e) = self.store_fallback(PATIENTS.key, &patients) {
                    error!("failed to record patient folder in fallback store: {}", e);
                }
            }
        }

        let action = if previous.is_some() {
            AuditAction::Update
        } else {
            AuditAction::Create
        };
        let actor = self.actor();
        self.append_audit(AuditLog::new(action, "patient", Some(id)).by(actor.as_deref()));

        Saved {
            record: patient,
            outcome,
        }
    }

    /// Replace the whole patient list. Chart folders are written for every patient.
    pub fn save_patients(&self, mut patients: Vec<Patient>) -> SaveOutcome {
        for patient in patients.iter_mut() {
            patient.ensure_id();
        }
        let _guard = self.lock(&PATIENTS);
        if let Err(e) = self.store_fallback(PATIENTS.key, &patients) {
            error!("failed to write patients to fallback store: {}", e);
            return SaveOutcome::Failed(FailureReason::FallbackWrite);
        }

        let action = format!("Saved {} patient records", patients.len());
        let outcome = self.mirror(&action, |bridge, layout| {
            for patient in patients.iter_mut() {
                let name = layout::create_patient_directory(bridge, layout, patient)?;
                patient.folder_name = Some(name);
            }
            let path = layout.index_path(&PATIENTS.index);
            layout::write_index(bridge, &path, PATIENTS.index.field, &patients)
        });
        if outcome.is_durable() {
            if let Err(e) = self.store_fallback(PATIENTS.key, &patients) {
                error!("failed to record patient folders in fallback store: {}", e);
            }
        }
        outcome
    }

    /// Earlier versions of a patient, oldest first.
    pub fn get_patient_history(&self, id: &EntityId) -> Vec<Patient> {
        self.fallback_list(&keys::patient_history(&id.to_string()))
    }

    fn push_patient_history(&self, id: &EntityId, previous: &Patient) {
        let key = keys::patient_history(&id.to_string());
        let mut history: Vec<Patient> = self.fallback_list(&key);
        history.push(previous.clone());
        if history.len() > self.history_limit {
            let excess = history.len() - self.history_limit;
            history.drain(..excess);
        }
        if let Err(e) = self.store_fallback(&key, &history) {
            error!("failed to record patient history for {}: {}", id, e);
        }
    }
}
