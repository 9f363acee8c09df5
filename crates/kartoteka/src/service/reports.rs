//! Medical reports.
//!
//! On disk each report is its own `Nalazi/{id}.json`, and `Nalazi/index.json`
//! lists only summaries. The fallback store keeps the full reports under `reports`.

use super::{not_found, DataStorage, FailureReason, SaveOutcome, Saved, REPORTS};
use crate::error::Result;
use crate::model::{
    append_missing, find_by_id, upsert, AuditAction, AuditLog, EntityId, MedicalReport, Record,
    ReportEdit, ReportSummary,
};
use crate::store::layout::{self, Layout};
use crate::store::{json_io, FallbackStore, FileBridge};
use chrono::Utc;
use tracing::{error, warn};

impl<B: FileBridge, F: FallbackStore> DataStorage<B, F> {
    pub fn get_reports(&self) -> Vec<MedicalReport> {
        self.load_reports()
    }

    pub fn get_report(&self, id: &EntityId) -> Option<MedicalReport> {
        let mirrored: Vec<MedicalReport> = self.fallback_list(REPORTS.key);
        find_by_id(&mirrored, id)
            .cloned()
            .or_else(|| {
                let layout = self.layout_if_ready()?;
                self.read_report_file(&layout, id)
            })
            .map(Record::upgrade)
    }

    pub fn get_patient_reports(&self, patient_id: &EntityId) -> Vec<MedicalReport> {
        let mut reports: Vec<MedicalReport> = self
            .load_reports()
            .into_iter()
            .filter(|r| &r.patient_id == patient_id)
            .collect();
        reports.sort_by(|a, b| b.date.cmp(&a.date));
        reports
    }

    pub fn save_report(&self, mut report: MedicalReport) -> Saved<MedicalReport> {
        let id = report.ensure_id();
        let now = Utc::now();
        report.updated_at = Some(now);

        let guard = self.lock(&REPORTS);
        let mut reports = self.load_reports();
        let stored = find_by_id(&reports, &id);
        report.created_at = stored
            .and_then(|r| r.created_at)
            .or(report.created_at)
            .or(Some(now));
        report.adopt_lifecycle(stored);
        let created = !upsert(&mut reports, report.clone());
        let outcome = self.persist_reports(&reports, &report, &format!("Saved report {}", id));
        drop(guard);

        let action = if created {
            AuditAction::Create
        } else {
            AuditAction::Update
        };
        self.append_audit(self.report_audit(action, &id));
        Saved {
            record: report,
            outcome,
        }
    }

    pub fn finalize_report(&self, id: &EntityId) -> Result<Saved<MedicalReport>> {
        self.update_report(id, |r| r.finalize())
    }

    pub fn verify_report(&self, id: &EntityId, verified_by: &str) -> Result<Saved<MedicalReport>> {
        let saved = self.update_report(id, |r| r.verify(verified_by, Utc::now()))?;
        self.append_audit(
            AuditLog::new(AuditAction::Verify, "report", Some(id.clone()))
                .by(Some(verified_by))
                .report(id.clone()),
        );
        Ok(saved)
    }

    pub fn edit_report(
        &self,
        id: &EntityId,
        changes: ReportEdit,
        reason: &str,
    ) -> Result<Saved<MedicalReport>> {
        let actor = self.actor();
        let saved = self.update_report(id, |r| {
            r.edit(changes, reason, actor.as_deref(), Utc::now())
        })?;
        self.append_audit(self.report_audit(AuditAction::Edit, id).reason(reason.trim()));
        Ok(saved)
    }

    /// The report, if it is saved and verified. Printing is audited.
    pub fn print_report(&self, id: &EntityId) -> Result<MedicalReport> {
        let report = self
            .get_report(id)
            .ok_or_else(|| not_found(&REPORTS, id))?;
        report.ensure_printable(true)?;
        self.append_audit(self.report_audit(AuditAction::Print, id));
        Ok(report)
    }

    fn update_report<U>(&self, id: &EntityId, change: U) -> Result<Saved<MedicalReport>>
    where
        U: FnOnce(&mut MedicalReport) -> Result<()>,
    {
        let _guard = self.lock(&REPORTS);
        let mut reports = self.load_reports();
        let mut report = find_by_id(&reports, id)
            .cloned()
            .ok_or_else(|| not_found(&REPORTS, id))?;
        change(&mut report)?;
        report.updated_at = Some(Utc::now());
        upsert(&mut reports, report.clone());
        let outcome = self.persist_reports(&reports, &report, &format!("Updated report {}", id));
        Ok(Saved {
            record: report,
            outcome,
        })
    }

    fn load_reports(&self) -> Vec<MedicalReport> {
        let mut reports: Vec<MedicalReport> = self.fallback_list(REPORTS.key);
        if let Some(layout) = self.layout_if_ready() {
            let index_path = layout.index_path(&REPORTS.index);
            match layout::read_index::<ReportSummary, _>(
                self.bridge(),
                &index_path,
                REPORTS.index.field,
            ) {
                Ok(summaries) => {
                    let on_disk: Vec<MedicalReport> = summaries
                        .iter()
                        .filter(|summary| find_by_id(&reports, &summary.id).is_none())
                        .filter_map(|summary| self.read_report_file(&layout, &summary.id))
                        .collect();
                    append_missing(&mut reports, on_disk);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("failed to read {}: {}", index_path.display(), e),
            }
        }
        reports.into_iter().map(Record::upgrade).collect()
    }

    fn read_report_file(&self, layout: &Layout, id: &EntityId) -> Option<MedicalReport> {
        let path = layout.report_file(id);
        match json_io::read_json(self.bridge(), &path) {
            Ok(report) => Some(report),
            Err(e) => {
                if !e.is_not_found() {
                    warn!("failed to read {}: {}", path.display(), e);
                }
                None
            }
        }
    }

    fn persist_reports(
        &self,
        reports: &[MedicalReport],
        changed: &MedicalReport,
        action: &str,
    ) -> SaveOutcome {
        if let Err(e) = self.store_fallback(REPORTS.key, reports) {
            error!("failed to write reports to fallback store: {}", e);
            return SaveOutcome::Failed(FailureReason::FallbackWrite);
        }
        self.mirror(action, |bridge, layout| {
            if let Some(id) = changed.id.as_ref() {
                json_io::try_write_json(bridge, &layout.report_file(id), changed)?;
            }
            let summaries: Vec<ReportSummary> =
                reports.iter().filter_map(MedicalReport::summary).collect();
            let path = layout.index_path(&REPORTS.index);
            layout::write_index(bridge, &path, REPORTS.index.field, &summaries)
        })
    }

    fn report_audit(&self, action: AuditAction, id: &EntityId) -> AuditLog {
        let actor = self.actor();
        AuditLog::new(action, "report", Some(id.clone()))
            .by(actor.as_deref())
            .report(id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::DegradedReason;
    use super::*;
    use crate::error::KartotekaError;
    use crate::model::{DoctorInfo, VerificationStatus};
    use chrono::NaiveDate;
    use std::path::Path;

    fn draft() -> MedicalReport {
        let mut report = MedicalReport::draft(
            EntityId::Number(1),
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            "Nalaz uredan.",
            "Bez terapije.",
        );
        report.examination_type = Some("EKG".to_string());
        report.doctor_info = Some(DoctorInfo {
            name: "Dr Jović".to_string(),
            ..Default::default()
        });
        report
    }

    #[test]
    fn test_save_report_writes_file_and_summary() {
        let (storage, bridge, _) = ready();
        let saved = storage.save_report(draft());
        assert!(saved.outcome.is_durable());
        let id = saved.record.id.clone().unwrap();

        assert!(bridge.exists(&Path::new("/clinic/Nalazi").join(format!("{}.json", id))));
        let summaries: Vec<ReportSummary> = layout::read_index(
            &*bridge,
            Path::new("/clinic/Nalazi/index.json"),
            "reports",
        )
        .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].kind.as_deref(), Some("EKG"));
        assert_eq!(summaries[0].doctor.as_deref(), Some("Dr Jović"));

        assert_eq!(storage.get_report(&id).unwrap().report, "Nalaz uredan.");
        assert_eq!(storage.get_reports().len(), 1);
    }

    #[test]
    fn test_missing_report_file_uses_fallback_copy() {
        let (storage, bridge, _) = ready();
        let id = storage.save_report(draft()).record.id.unwrap();
        bridge
            .delete(&Path::new("/clinic/Nalazi").join(format!("{}.json", id)))
            .unwrap();

        assert_eq!(storage.get_reports().len(), 1);
        assert!(storage.get_report(&id).is_some());
    }

    #[test]
    fn test_report_update_during_write_failure_is_read_back() {
        let (storage, bridge, _) = ready();
        let id = storage.save_report(draft()).record.id.unwrap();

        bridge.set_simulate_write_error(true);
        let finalized = storage.finalize_report(&id).unwrap();
        assert_eq!(
            finalized.outcome,
            SaveOutcome::FallbackOnly(DegradedReason::WriteFailed)
        );
        bridge.set_simulate_write_error(false);

        let report = storage.get_report(&id).unwrap();
        assert_eq!(report.verification_status, VerificationStatus::Pending);
        storage.save_report(draft());
        assert_eq!(storage.get_reports().len(), 2);
        assert!(storage.verify_report(&id, "Dr Jović").is_ok());
    }

    #[test]
    fn test_verification_flow_and_printing() {
        let (storage, _, _) = ready();
        let id = storage.save_report(draft()).record.id.unwrap();

        assert!(matches!(
            storage.print_report(&id),
            Err(KartotekaError::Validation(_))
        ));
        assert!(matches!(
            storage.verify_report(&id, "Dr Jović"),
            Err(KartotekaError::InvalidTransition(_))
        ));

        storage.finalize_report(&id).unwrap();
        let verified = storage.verify_report(&id, "Dr Jović").unwrap().record;
        assert_eq!(verified.verification_status, VerificationStatus::Verified);

        let printed = storage.print_report(&id).unwrap();
        assert_eq!(printed.verified_by.as_deref(), Some("Dr Jović"));

        let actions: Vec<AuditAction> = storage.get_audit_logs().iter().map(|l| l.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::Create, AuditAction::Verify, AuditAction::Print]
        );
    }

    #[test]
    fn test_save_cannot_mark_report_verified() {
        let (storage, _, _) = ready();
        let mut forged = draft();
        forged.verification_status = VerificationStatus::Verified;
        let saved = storage.save_report(forged).record;
        let id = saved.id.clone().unwrap();
        assert_eq!(saved.verification_status, VerificationStatus::Unverified);
        assert!(storage.print_report(&id).is_err());

        storage.finalize_report(&id).unwrap();
        storage.verify_report(&id, "Dr Jović").unwrap();
        let mut resaved = storage.get_report(&id).unwrap();
        resaved.notes = Some("Kontrola za mesec dana.".to_string());
        resaved.verification_status = VerificationStatus::Unverified;
        resaved.verified_by = None;
        let resaved = storage.save_report(resaved).record;
        assert_eq!(resaved.verification_status, VerificationStatus::Verified);
        assert_eq!(resaved.verified_by.as_deref(), Some("Dr Jović"));
    }

    #[test]
    fn test_edit_requires_reason_and_resets_verification() {
        let (storage, _, _) = fallback_only();
        let id = storage.save_report(draft()).record.id.unwrap();
        storage.finalize_report(&id).unwrap();
        storage.verify_report(&id, "Dr Jović").unwrap();

        let changes = ReportEdit {
            therapy: Some("Odmor.".to_string()),
            ..Default::default()
        };
        assert!(storage.edit_report(&id, changes.clone(), "").is_err());

        let edited = storage
            .edit_report(&id, changes, "dopuna terapije")
            .unwrap();
        assert_eq!(
            edited.outcome,
            SaveOutcome::FallbackOnly(DegradedReason::BackendUnavailable)
        );
        let report = edited.record;
        assert_eq!(report.therapy, "Odmor.");
        assert_eq!(report.versions.len(), 1);
        assert_eq!(report.versions[0].therapy, "Bez terapije.");
        assert_eq!(report.verification_status, VerificationStatus::Pending);

        let last = storage.get_audit_logs().pop().unwrap();
        assert_eq!(last.action, AuditAction::Edit);
        assert_eq!(last.reason.as_deref(), Some("dopuna terapije"));
    }

    #[test]
    fn test_patient_reports_newest_first() {
        let (storage, _, _) = fallback_only();
        let mut older = draft();
        older.date = NaiveDate::from_ymd_opt(2023, 1, 10).unwrap();
        storage.save_report(older);
        storage.save_report(draft());
        let mut other = draft();
        other.patient_id = EntityId::Number(2);
        storage.save_report(other);

        let reports = storage.get_patient_reports(&EntityId::Number(1));
        assert_eq!(reports.len(), 2);
        assert!(reports[0].date > reports[1].date);
    }
}
