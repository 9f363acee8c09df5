use super::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    View,
    Verify,
    Edit,
    Delete,
    Cancel,
    Complete,
    Reschedule,
    Print,
    Login,
    Logout,
}

/// User-facing audit trail entry. Append-only and never truncated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: EntityId,
    pub action: AuditAction,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performed_by: Option<String>,
    pub performed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<EntityId>,
}

impl AuditLog {
    pub fn new(action: AuditAction, entity_type: &str, entity_id: Option<EntityId>) -> Self {
        Self {
            id: EntityId::generate(),
            action,
            entity_type: entity_type.to_string(),
            entity_id,
            performed_by: None,
            performed_at: Utc::now(),
            details: None,
            reason: None,
            report_id: None,
            appointment_id: None,
        }
    }

    pub fn by(mut self, performed_by: Option<&str>) -> Self {
        self.performed_by = performed_by.map(str::to_string);
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn report(mut self, report_id: EntityId) -> Self {
        self.report_id = Some(report_id);
        self
    }

    pub fn appointment(mut self, appointment_id: EntityId) -> Self {
        self.appointment_id = Some(appointment_id);
        self
    }
}
