//! Appointment scheduling. Every status change is saved and audited.

use super::{DataStorage, SaveOutcome, Saved, APPOINTMENTS};
use crate::error::Result;
use crate::model::{find_by_id, Appointment, AuditAction, AuditLog, EntityId};
use crate::store::{FallbackStore, FileBridge};
use chrono::{NaiveDate, Utc};

impl<B: FileBridge, F: FallbackStore> DataStorage<B, F> {
    pub fn get_appointments(&self) -> Vec<Appointment> {
        self.load(&APPOINTMENTS)
    }

    pub fn get_appointment(&self, id: &EntityId) -> Option<Appointment> {
        find_by_id(&self.get_appointments(), id).cloned()
    }

    /// Appointments on `date`, ordered by time.
    pub fn get_appointments_on(&self, date: NaiveDate) -> Vec<Appointment> {
        let mut day: Vec<Appointment> = self
            .get_appointments()
            .into_iter()
            .filter(|a| a.date == date)
            .collect();
        day.sort_by(|a, b| a.time.cmp(&b.time));
        day
    }

    pub fn save_appointment(&self, appointment: Appointment) -> Saved<Appointment> {
        self.save_one(&APPOINTMENTS, appointment)
    }

    pub fn save_appointments(&self, appointments: Vec<Appointment>) -> SaveOutcome {
        self.save_all(&APPOINTMENTS, appointments)
    }

    pub fn cancel_appointment(&self, id: &EntityId, reason: &str) -> Result<Saved<Appointment>> {
        let saved = self.update_one(&APPOINTMENTS, id, |a: &mut Appointment| {
            a.cancel(reason, Utc::now())
        })?;
        let mut entry = self.appointment_audit(AuditAction::Cancel, id);
        if let Some(reason) = &saved.record.cancellation_reason {
            entry = entry.reason(reason.as_str());
        }
        self.append_audit(entry);
        Ok(saved)
    }

    pub fn complete_appointment(&self, id: &EntityId) -> Result<Saved<Appointment>> {
        let saved = self.update_one(&APPOINTMENTS, id, |a: &mut Appointment| {
            a.complete(Utc::now())
        })?;
        self.append_audit(self.appointment_audit(AuditAction::Complete, id));
        Ok(saved)
    }

    pub fn reschedule_appointment(
        &self,
        id: &EntityId,
        date: NaiveDate,
        time: &str,
        reason: &str,
    ) -> Result<Saved<Appointment>> {
        let saved = self.update_one(&APPOINTMENTS, id, |a: &mut Appointment| {
            a.reschedule(date, time, reason, Utc::now())
        })?;
        self.append_audit(
            self.appointment_audit(AuditAction::Reschedule, id)
                .reason(reason.trim())
                .details(format!("{} {}", date, time)),
        );
        Ok(saved)
    }

    pub fn link_report_to_appointment(
        &self,
        id: &EntityId,
        report_id: &EntityId,
    ) -> Result<Saved<Appointment>> {
        let saved = self.update_one(&APPOINTMENTS, id, |a: &mut Appointment| {
            a.link_report(report_id.clone());
            Ok(())
        })?;
        self.append_audit(
            self.appointment_audit(AuditAction::Update, id)
                .report(report_id.clone())
                .details("report linked"),
        );
        Ok(saved)
    }

    fn appointment_audit(&self, action: AuditAction, id: &EntityId) -> AuditLog {
        let actor = self.actor();
        AuditLog::new(action, "appointment", Some(id.clone()))
            .by(actor.as_deref())
            .appointment(id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::error::KartotekaError;
    use crate::model::AppointmentStatus;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn booked(storage: &TestStorage) -> EntityId {
        let appointment = Appointment::new(date(4), "09:30").for_patient(EntityId::Number(1), "Ana Marković");
        storage.save_appointment(appointment).record.id.unwrap()
    }

    #[test]
    fn test_cancel_saves_reason_and_audits() {
        let (storage, _, _) = ready();
        let id = booked(&storage);

        let saved = storage.cancel_appointment(&id, "pacijent bolestan").unwrap();
        assert!(saved.outcome.is_durable());
        assert_eq!(saved.record.status, AppointmentStatus::Cancelled);

        let stored = storage.get_appointment(&id).unwrap();
        assert_eq!(stored.status, AppointmentStatus::Cancelled);
        assert_eq!(
            stored.cancellation_reason.as_deref(),
            Some("pacijent bolestan")
        );

        let logs = storage.get_audit_logs();
        let entry = logs.last().unwrap();
        assert_eq!(entry.action, AuditAction::Cancel);
        assert_eq!(entry.appointment_id.as_ref(), Some(&id));
        assert_eq!(entry.reason.as_deref(), Some("pacijent bolestan"));
    }

    #[test]
    fn test_cancel_twice_is_rejected() {
        let (storage, _, _) = fallback_only();
        let id = booked(&storage);
        storage.cancel_appointment(&id, "").unwrap();
        assert!(matches!(
            storage.cancel_appointment(&id, ""),
            Err(KartotekaError::InvalidTransition(_))
        ));
        assert_eq!(storage.get_audit_logs().len(), 1);
    }

    #[test]
    fn test_unknown_appointment_is_an_error() {
        let (storage, _, _) = fallback_only();
        assert!(storage
            .complete_appointment(&EntityId::from("missing"))
            .is_err());
    }

    #[test]
    fn test_reschedule_requires_reason_and_reopens() {
        let (storage, _, _) = ready();
        let id = booked(&storage);
        storage.cancel_appointment(&id, "").unwrap();

        assert!(matches!(
            storage.reschedule_appointment(&id, date(6), "11:00", " "),
            Err(KartotekaError::Validation(_))
        ));

        let saved = storage
            .reschedule_appointment(&id, date(6), "11:00", "termin pomeren")
            .unwrap()
            .record;
        assert_eq!(saved.status, AppointmentStatus::Scheduled);
        assert_eq!(saved.date, date(6));
        assert!(saved.cancellation_reason.is_none());
        assert_eq!(storage.get_appointments_on(date(6)).len(), 1);
        assert!(storage.get_appointments_on(date(4)).is_empty());
    }

    #[test]
    fn test_complete_and_link_report() {
        let (storage, _, _) = ready();
        let id = booked(&storage);

        storage.complete_appointment(&id).unwrap();
        storage
            .link_report_to_appointment(&id, &EntityId::from("r-1"))
            .unwrap();

        let stored = storage.get_appointment(&id).unwrap();
        assert_eq!(stored.status, AppointmentStatus::Completed);
        assert_eq!(stored.report_id, Some(EntityId::from("r-1")));

        let actions: Vec<AuditAction> = storage.get_audit_logs().iter().map(|l| l.action).collect();
        assert_eq!(actions, vec![AuditAction::Complete, AuditAction::Update]);
    }

    #[test]
    fn test_day_view_is_sorted_by_time() {
        let (storage, _, _) = fallback_only();
        storage.save_appointments(vec![
            Appointment::new(date(4), "14:00"),
            Appointment::new(date(4), "08:15"),
            Appointment::new(date(5), "09:00"),
        ]);
        let times: Vec<String> = storage
            .get_appointments_on(date(4))
            .into_iter()
            .map(|a| a.time)
            .collect();
        assert_eq!(times, vec!["08:15", "14:00"]);
    }
}
