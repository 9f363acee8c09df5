//! Clinic settings and small per-patient blobs that only live in the fallback store.

use super::{DataStorage, DegradedReason, FailureReason, SaveOutcome};
use crate::model::{ClinicInfo, EntityId};
use crate::store::fallback::keys;
use crate::store::{json_io, FallbackStore, FileBridge};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

impl<B: FileBridge, F: FallbackStore> DataStorage<B, F> {
    pub fn get_clinic_info(&self) -> ClinicInfo {
        let mirrored: ClinicInfo = self.fallback_value(keys::CLINIC_INFO).unwrap_or_default();
        match self.layout_if_ready() {
            Some(layout) => json_io::read_json_or(self.bridge(), &layout.clinic_info_file(), mirrored),
            None => mirrored,
        }
    }

    pub fn save_clinic_info(&self, info: &ClinicInfo) -> SaveOutcome {
        let _guard = self.lock_settings();
        if let Err(e) = self.store_fallback(keys::CLINIC_INFO, info) {
            error!("failed to write clinic info to fallback store: {}", e);
            return SaveOutcome::Failed(FailureReason::FallbackWrite);
        }
        self.mirror("Saved clinic info", |bridge, layout| {
            json_io::try_write_json(bridge, &layout.clinic_info_file(), info)
        })
    }

    /// Logo as a data URL.
    pub fn get_clinic_logo(&self) -> Option<String> {
        self.fallback_value(keys::CLINIC_LOGO)
    }

    pub fn save_clinic_logo(&self, data_url: &str) -> SaveOutcome {
        self.save_fallback_only(keys::CLINIC_LOGO, data_url)
    }

    /// Free-form clinical data for one patient (vitals, allergies, notes).
    pub fn get_clinical_data(&self, patient_id: &EntityId) -> Option<Value> {
        self.fallback_value(&keys::clinical(&patient_id.to_string()))
    }

    pub fn save_clinical_data(&self, patient_id: &EntityId, data: &Value) -> SaveOutcome {
        self.save_fallback_only(&keys::clinical(&patient_id.to_string()), data)
    }

    fn save_fallback_only<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> SaveOutcome {
        let _guard = self.lock_settings();
        match self.store_fallback(key, value) {
            Ok(()) => SaveOutcome::FallbackOnly(DegradedReason::BackendUnavailable),
            Err(e) => {
                error!("failed to write '{}' to fallback store: {}", key, e);
                SaveOutcome::Failed(FailureReason::FallbackWrite)
            }
        }
    }
}
