use super::{EntityId, Record};
use crate::error::{KartotekaError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

/// A booked visit.
///
/// Status only moves forward (`scheduled` to `completed` or `cancelled`), except
/// for a reschedule, which puts any appointment back to `scheduled` and needs a reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    pub date: NaiveDate,
    /// Wall-clock start, `HH:MM`.
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examination_type: Option<String>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reschedule_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub schema_version: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Appointment {
    pub fn new(date: NaiveDate, time: &str) -> Self {
        Self {
            id: None,
            patient_id: None,
            patient_name: None,
            doctor_id: None,
            doctor_name: None,
            date,
            time: time.to_string(),
            examination_type: None,
            status: AppointmentStatus::Scheduled,
            cancellation_reason: None,
            reschedule_reason: None,
            report_id: None,
            scheduled_at: Some(Utc::now()),
            completed_at: None,
            cancelled_at: None,
            schema_version: Self::SCHEMA_VERSION,
            extra: Map::new(),
        }
    }

    pub fn for_patient(mut self, id: EntityId, name: &str) -> Self {
        self.patient_id = Some(id);
        self.patient_name = Some(name.to_string());
        self
    }

    pub fn with_doctor(mut self, id: EntityId, name: &str) -> Self {
        self.doctor_id = Some(id);
        self.doctor_name = Some(name.to_string());
        self
    }

    fn require_scheduled(&self, action: &str) -> Result<()> {
        if self.status != AppointmentStatus::Scheduled {
            return Err(KartotekaError::InvalidTransition(format!(
                "cannot {} an appointment that is {:?}",
                action, self.status
            )));
        }
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.require_scheduled("complete")?;
        self.status = AppointmentStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Blank reasons are stored as no reason.
    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> Result<()> {
        self.require_scheduled("cancel")?;
        self.status = AppointmentStatus::Cancelled;
        let reason = reason.trim();
        self.cancellation_reason = (!reason.is_empty()).then(|| reason.to_string());
        self.cancelled_at = Some(now);
        Ok(())
    }

    pub fn reschedule(
        &mut self,
        date: NaiveDate,
        time: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(KartotekaError::Validation(
                "a reason is required to reschedule".to_string(),
            ));
        }
        self.date = date;
        self.time = time.to_string();
        self.status = AppointmentStatus::Scheduled;
        self.reschedule_reason = Some(reason.to_string());
        self.cancellation_reason = None;
        self.cancelled_at = None;
        self.completed_at = None;
        self.scheduled_at = Some(now);
        Ok(())
    }

    pub fn link_report(&mut self, report_id: EntityId) {
        self.report_id = Some(report_id);
    }
}

impl Record for Appointment {
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
