use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Letterhead details shown on printed reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Tax id (PIB).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pib: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
