use super::{EntityId, Record};
use crate::error::{KartotekaError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaminationType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    /// Minutes.
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub schema_version: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExaminationType {
    pub fn new(name: &str, duration: u32, price: f64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            duration,
            price,
            schema_version: Self::SCHEMA_VERSION,
            extra: Map::new(),
        }
    }
}

impl Record for ExaminationType {
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

/// A prior copy of the whole examination-type table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaminationTypeSnapshot {
    pub saved_at: DateTime<Utc>,
    pub types: Vec<ExaminationType>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportShape {
    Bare(Vec<ExaminationType>),
    Wrapped { types: Vec<ExaminationType> },
}

/// Parse an import file: either `[...]` or `{"types": [...]}`.
pub fn parse_import(json: &str) -> Result<Vec<ExaminationType>> {
    let shape: ImportShape = serde_json::from_str(json).map_err(|e| {
        KartotekaError::Validation(format!(
            "expected an array of examination types or {{\"types\": [...]}}: {}",
            e
        ))
    })?;
    let types = match shape {
        ImportShape::Bare(types) => types,
        ImportShape::Wrapped { types } => types,
    };
    if let Some(bad) = types.iter().find(|t| t.name.trim().is_empty()) {
        return Err(KartotekaError::Validation(format!(
            "examination type {} has no name",
            bad.id.as_ref().map(|i| i.to_string()).unwrap_or_default()
        )));
    }
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_accepts_bare_array() {
        let types = parse_import(r#"[{"id": 1, "name": "EKG", "duration": 15, "price": 1200}]"#)
            .unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "EKG");
        assert_eq!(types[0].price, 1200.0);
    }

    #[test]
    fn test_parse_import_accepts_wrapped_object() {
        let types = parse_import(
            r#"{"types": [{"name": "Pregled", "duration": 30, "price": 2500.5}, {"name": "Kontrola"}]}"#,
        )
        .unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(types[1].duration, 0);
    }

    #[test]
    fn test_parse_import_rejects_other_shapes() {
        assert!(parse_import(r#"{"items": []}"#).is_err());
        assert!(parse_import("not json").is_err());
        assert!(parse_import(r#"[{"name": "  "}]"#).is_err());
    }
}
