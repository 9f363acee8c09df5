//! # Medical Reports
//!
//! A report moves through two independent axes:
//!
//! ```text
//! status:        draft ──finalize──▶ final
//! verification:  unverified ──finalize──▶ pending ──verify──▶ verified
//!                                            ▲                  │
//!                                            └──────edit────────┘
//! ```
//!
//! Printing requires a saved report whose verification is `verified`. Every edit
//! needs a free-text reason and pushes the previous text onto `versions`.

use super::{EntityId, Record};
use crate::error::{KartotekaError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Draft,
    Final,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitType {
    #[default]
    First,
    Followup,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Pending,
    Verified,
}

/// Patient details as they were when the report was written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jmbg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportVersion {
    pub version: u32,
    pub report: String,
    pub therapy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub edited_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_by: Option<String>,
    pub reason: String,
}

/// New text for [`MedicalReport::edit`]. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ReportEdit {
    pub report: Option<String>,
    pub therapy: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub patient_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<EntityId>,
    pub date: NaiveDate,
    #[serde(default)]
    pub report: String,
    #[serde(default)]
    pub therapy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default)]
    pub visit_type: VisitType,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examination_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_info: Option<PatientInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_info: Option<DoctorInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<ReportVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub schema_version: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Row of `Nalazi/index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: EntityId,
    pub patient_id: EntityId,
    pub date: NaiveDate,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<String>,
}

impl MedicalReport {
    /// A new draft.
    pub fn draft(patient_id: EntityId, date: NaiveDate, report: &str, therapy: &str) -> Self {
        Self {
            id: None,
            patient_id,
            doctor_id: None,
            date,
            report: report.to_string(),
            therapy: therapy.to_string(),
            notes: None,
            status: ReportStatus::Draft,
            visit_type: VisitType::First,
            verification_status: VerificationStatus::Unverified,
            examination_type: None,
            patient_info: None,
            doctor_info: None,
            versions: Vec::new(),
            verified_by: None,
            verified_at: None,
            created_at: Some(Utc::now()),
            updated_at: None,
            schema_version: Self::SCHEMA_VERSION,
            extra: Map::new(),
        }
    }

    pub fn finalize(&mut self) -> Result<()> {
        if self.status == ReportStatus::Final {
            return Err(KartotekaError::InvalidTransition(
                "report is already final".to_string(),
            ));
        }
        self.status = ReportStatus::Final;
        self.verification_status = VerificationStatus::Pending;
        Ok(())
    }

    pub fn verify(&mut self, verified_by: &str, now: DateTime<Utc>) -> Result<()> {
        match self.verification_status {
            VerificationStatus::Pending => {
                self.verification_status = VerificationStatus::Verified;
                self.verified_by = Some(verified_by.to_string());
                self.verified_at = Some(now);
                Ok(())
            }
            VerificationStatus::Unverified => Err(KartotekaError::InvalidTransition(
                "report must be finalized before verification".to_string(),
            )),
            VerificationStatus::Verified => Err(KartotekaError::InvalidTransition(
                "report is already verified".to_string(),
            )),
        }
    }

    /// Apply an edit, archiving the previous text. A verified report goes back to pending.
    pub fn edit(
        &mut self,
        changes: ReportEdit,
        reason: &str,
        edited_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(KartotekaError::Validation(
                "an edit reason is required".to_string(),
            ));
        }

        self.versions.push(ReportVersion {
            version: self.versions.len() as u32 + 1,
            report: self.report.clone(),
            therapy: self.therapy.clone(),
            notes: self.notes.clone(),
            edited_at: now,
            edited_by: edited_by.map(str::to_string),
            reason: reason.to_string(),
        });

        if let Some(report) = changes.report {
            self.report = report;
        }
        if let Some(therapy) = changes.therapy {
            self.therapy = therapy;
        }
        if changes.notes.is_some() {
            self.notes = changes.notes;
        }
        self.updated_at = Some(now);

        if self.verification_status == VerificationStatus::Verified {
            self.verification_status = VerificationStatus::Pending;
            self.verified_by = None;
            self.verified_at = None;
        }
        Ok(())
    }

    /// Take status and verification from the stored copy. A new report starts
    /// unverified, or pending when it is already final.
    pub fn adopt_lifecycle(&mut self, stored: Option<&MedicalReport>) {
        match stored {
            Some(stored) => {
                self.status = stored.status;
                self.verification_status = stored.verification_status;
                self.verified_by = stored.verified_by.clone();
                self.verified_at = stored.verified_at;
            }
            None => {
                self.verification_status = match self.status {
                    ReportStatus::Final => VerificationStatus::Pending,
                    ReportStatus::Draft => VerificationStatus::Unverified,
                };
                self.verified_by = None;
                self.verified_at = None;
            }
        }
    }

    pub fn is_printable(&self, saved: bool) -> bool {
        saved && self.verification_status == VerificationStatus::Verified
    }

    pub fn ensure_printable(&self, saved: bool) -> Result<()> {
        if !saved {
            return Err(KartotekaError::Validation(
                "report must be saved before printing".to_string(),
            ));
        }
        if self.verification_status != VerificationStatus::Verified {
            return Err(KartotekaError::Validation(format!(
                "report cannot be printed while verification is {:?}",
                self.verification_status
            )));
        }
        Ok(())
    }

    /// Index row, or `None` for a report that has not been given an id yet.
    pub fn summary(&self) -> Option<ReportSummary> {
        let id = self.id.clone()?;
        let kind = self.examination_type.clone().unwrap_or_else(|| {
            match self.visit_type {
                VisitType::First => "first",
                VisitType::Followup => "followup",
            }
            .to_string()
        });
        Some(ReportSummary {
            id,
            patient_id: self.patient_id.clone(),
            date: self.date,
            kind: Some(kind),
            doctor: self.doctor_info.as_ref().map(|d| d.name.clone()),
        })
    }
}

impl Record for MedicalReport {
    const SCHEMA_VERSION: u32 = 1;

    fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn upgrade(mut self) -> Self {
        self.schema_version = Self::SCHEMA_VERSION;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> MedicalReport {
        MedicalReport::draft(
            EntityId::Number(1),
            NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
            "Uredan nalaz.",
            "Bez terapije.",
        )
    }

    #[test]
    fn test_finalize_moves_to_pending() {
        let mut r = report();
        r.finalize().unwrap();
        assert_eq!(r.status, ReportStatus::Final);
        assert_eq!(r.verification_status, VerificationStatus::Pending);
        assert!(r.finalize().is_err());
    }

    #[test]
    fn test_adopt_lifecycle_ignores_caller_verification() {
        let mut fresh = report();
        fresh.verification_status = VerificationStatus::Verified;
        fresh.adopt_lifecycle(None);
        assert_eq!(fresh.verification_status, VerificationStatus::Unverified);
        assert!(fresh.verified_by.is_none());

        let mut stored = report();
        stored.finalize().unwrap();
        stored.verify("dr Petrović", Utc::now()).unwrap();
        let mut incoming = report();
        incoming.adopt_lifecycle(Some(&stored));
        assert_eq!(incoming.status, ReportStatus::Final);
        assert_eq!(incoming.verification_status, VerificationStatus::Verified);
        assert_eq!(incoming.verified_by.as_deref(), Some("dr Petrović"));
    }

    #[test]
    fn test_verify_requires_pending() {
        let mut r = report();
        assert!(r.verify("dr Petrović", Utc::now()).is_err());

        r.finalize().unwrap();
        let now = Utc::now();
        r.verify("dr Petrović", now).unwrap();
        assert_eq!(r.verification_status, VerificationStatus::Verified);
        assert_eq!(r.verified_by.as_deref(), Some("dr Petrović"));
        assert_eq!(r.verified_at, Some(now));
        assert!(r.verify("dr Petrović", now).is_err());
    }

    #[test]
    fn test_printing_rejected_unless_verified_and_saved() {
        let mut r = report();
        assert!(r.ensure_printable(true).is_err());

        r.finalize().unwrap();
        assert!(r.ensure_printable(true).is_err());

        r.verify("dr", Utc::now()).unwrap();
        assert!(r.ensure_printable(false).is_err());
        assert!(r.ensure_printable(true).is_ok());
        assert!(r.is_printable(true));
    }

    #[test]
    fn test_edit_requires_reason() {
        let mut r = report();
        let err = r
            .edit(ReportEdit::default(), "   ", None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, KartotekaError::Validation(_)));
        assert!(r.versions.is_empty());
    }

    #[test]
    fn test_edit_archives_previous_text_and_reopens_verification() {
        let mut r = report();
        r.finalize().unwrap();
        r.verify("dr", Utc::now()).unwrap();

        r.edit(
            ReportEdit {
                therapy: Some("Brufen 400mg".to_string()),
                ..Default::default()
            },
            "dopuna terapije",
            Some("dr"),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(r.therapy, "Brufen 400mg");
        assert_eq!(r.report, "Uredan nalaz.");
        assert_eq!(r.versions.len(), 1);
        assert_eq!(r.versions[0].therapy, "Bez terapije.");
        assert_eq!(r.versions[0].reason, "dopuna terapije");
        assert_eq!(r.verification_status, VerificationStatus::Pending);
        assert!(r.verified_by.is_none());
    }

    #[test]
    fn test_summary_uses_examination_type_and_doctor() {
        let mut r = report();
        assert!(r.summary().is_none());

        r.id = Some(EntityId::from("r-1"));
        r.examination_type = Some("Ultrazvuk".to_string());
        r.doctor_info = Some(DoctorInfo {
            name: "dr Ana".to_string(),
            ..Default::default()
        });
        let s = r.summary().unwrap();
        assert_eq!(s.kind.as_deref(), Some("Ultrazvuk"));
        assert_eq!(s.doctor.as_deref(), Some("dr Ana"));

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["type"], "Ultrazvuk");
        assert_eq!(json["patientId"], 1);
    }
}
