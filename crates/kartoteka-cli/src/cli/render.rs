//! Plain-text rendering. Functions here take records and return strings; they
//! never print, so the output can be checked in tests.

use kartoteka::model::{Appointment, AuditLog, ExaminationType, MedicalReport, Patient};
use kartoteka::store::system_log::LogEntry;
use kartoteka::{DegradedReason, SaveOutcome, ServiceState};

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

fn id_text<T: ToString>(id: Option<&T>) -> String {
    id.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn state(state: ServiceState) -> &'static str {
    match state {
        ServiceState::Uninitialized => "no data folder",
        ServiceState::Initializing => "initializing",
        ServiceState::Ready => "ready",
        ServiceState::FallbackOnly => "fallback only",
    }
}

/// Warning line for a save that did not reach the data folder, if any.
pub fn outcome_warning(outcome: &SaveOutcome) -> Option<String> {
    match outcome {
        SaveOutcome::Durable => None,
        SaveOutcome::FallbackOnly(DegradedReason::BackendUnavailable) => Some(
            "warning: no data folder is active, saved to the fallback store only".to_string(),
        ),
        SaveOutcome::FallbackOnly(DegradedReason::WriteFailed) => Some(
            "warning: writing to the data folder failed, saved to the fallback store only"
                .to_string(),
        ),
        SaveOutcome::Failed(_) => Some("error: the record could not be saved".to_string()),
    }
}

pub fn patients(patients: &[Patient]) -> String {
    if patients.is_empty() {
        return "No patients.\n".to_string();
    }
    let mut out = String::new();
    for p in patients {
        out.push_str(&format!(
            "{:<38} {:<28} {:<14} {}\n",
            id_text(p.id.as_ref()),
            p.display_name(),
            or_dash(p.jmbg.as_deref()),
            p.date_of_birth
                .map(|d| d.format("%d.%m.%Y").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ));
    }
    out
}

pub fn appointments(appointments: &[Appointment]) -> String {
    if appointments.is_empty() {
        return "No appointments.\n".to_string();
    }
    let mut out = String::new();
    for a in appointments {
        let status = serde_json::to_value(a.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        out.push_str(&format!(
            "{:<38} {} {:<5} {:<10} {}",
            id_text(a.id.as_ref()),
            a.date,
            a.time,
            status,
            or_dash(a.patient_name.as_deref()),
        ));
        if let Some(reason) = &a.cancellation_reason {
            out.push_str(&format!(" ({})", reason));
        }
        out.push('\n');
    }
    out
}

pub fn reports(reports: &[MedicalReport]) -> String {
    if reports.is_empty() {
        return "No reports.\n".to_string();
    }
    let mut out = String::new();
    for r in reports {
        let patient = r
            .patient_info
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| r.patient_id.to_string());
        out.push_str(&format!(
            "{:<38} {} {:<24} {:?}/{:?}\n",
            id_text(r.id.as_ref()),
            r.date,
            patient,
            r.status,
            r.verification_status,
        ));
    }
    out
}

pub fn examination_types(types: &[ExaminationType]) -> String {
    if types.is_empty() {
        return "No examination types.\n".to_string();
    }
    types
        .iter()
        .map(|t| format!("{:<32} {:>4} min {:>10.2}\n", t.name, t.duration, t.price))
        .collect()
}

pub fn system_log(entries: &[LogEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}  {}\n", e.timestamp.format("%Y-%m-%d %H:%M:%S"), e.action))
        .collect()
}

pub fn audit_log(entries: &[AuditLog]) -> String {
    entries
        .iter()
        .map(|e| {
            let action = serde_json::to_value(e.action)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let mut line = format!(
                "{}  {:<10} {:<12} {:<38} {}",
                e.performed_at.format("%Y-%m-%d %H:%M:%S"),
                action,
                e.entity_type,
                id_text(e.entity_id.as_ref()),
                or_dash(e.performed_by.as_deref()),
            );
            if let Some(reason) = &e.reason {
                line.push_str(&format!("  \"{}\"", reason));
            }
            line.push('\n');
            line
        })
        .collect()
}
