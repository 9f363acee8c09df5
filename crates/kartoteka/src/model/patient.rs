use super::{EntityId, Record};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A patient chart entry.
///
/// Older documents only carry a single `name`; newer ones carry `firstName` and
/// `lastName`. Both are kept in sync by [`Record::upgrade`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, alias = "dob", skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    /// National id number (JMBG).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jmbg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Folder under `Pacijenti/`, fixed when the chart is first written to disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub schema_version: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Patient {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            name: Some(format!("{} {}", first_name, last_name)),
            schema_version: Self::SCHEMA_VERSION,
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        parts.join(" ")
    }
}

impl Record for Patient {
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
        if self.schema_version < 1 {
            if self.first_name.is_none() && self.last_name.is_none() {
                if let Some(name) = self.name.as_deref() {
                    let mut parts = name.trim().splitn(2, char::is_whitespace);
                    self.first_name = parts.next().map(str::to_string).filter(|s| !s.is_empty());
                    self.last_name = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
                }
            }
            if self.name.is_none() {
                let name = self.display_name();
                if !name.is_empty() {
                    self.name = Some(name);
                }
            }
        }
        self.schema_version = Self::SCHEMA_VERSION;
        self
    }
}
