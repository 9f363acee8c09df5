//! The examination-type price list.
//!
//! Before every save the current table is pushed onto a bounded history kept in
//! the fallback store, so the last few versions can be restored with
//! [`DataStorage::revert_examination_types`].

use super::{DataStorage, SaveOutcome, Saved, EXAMINATION_TYPES};
use crate::error::{KartotekaError, Result};
use crate::model::examination_type::parse_import;
use crate::model::{upsert, ExaminationType, ExaminationTypeSnapshot, Record};
use crate::store::fallback::keys;
use crate::store::{FallbackStore, FileBridge};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

#[derive(Serialize)]
struct ExportDocument<'a> {
    types: &'a [ExaminationType],
}

impl<B: FileBridge, F: FallbackStore> DataStorage<B, F> {
    pub fn get_examination_types(&self) -> Vec<ExaminationType> {
        self.load(&EXAMINATION_TYPES)
    }

    pub fn save_examination_type(&self, mut item: ExaminationType) -> Saved<ExaminationType> {
        let id = item.ensure_id();
        let _guard = self.lock(&EXAMINATION_TYPES);
        let mut types: Vec<ExaminationType> = self.load(&EXAMINATION_TYPES);
        self.push_examination_type_snapshot(&types);
        upsert(&mut types, item.clone());
        let outcome = self.persist_list(
            &EXAMINATION_TYPES,
            &types,
            &format!("Saved examination type {}", id),
        );
        Saved {
            record: item,
            outcome,
        }
    }

    pub fn save_examination_types(&self, mut types: Vec<ExaminationType>) -> SaveOutcome {
        for item in types.iter_mut() {
            item.ensure_id();
        }
        let _guard = self.lock(&EXAMINATION_TYPES);
        let current: Vec<ExaminationType> = self.load(&EXAMINATION_TYPES);
        self.push_examination_type_snapshot(&current);
        self.persist_list(
            &EXAMINATION_TYPES,
            &types,
            &format!("Saved {} examination types", types.len()),
        )
    }

    /// Saved versions, oldest first.
    pub fn examination_type_history(&self) -> Vec<ExaminationTypeSnapshot> {
        self.fallback_list(keys::EXAMINATION_TYPES_HISTORY)
    }

    /// Restore the most recent snapshot and drop it from the history.
    pub fn revert_examination_types(&self) -> Result<(Vec<ExaminationType>, SaveOutcome)> {
        let _guard = self.lock(&EXAMINATION_TYPES);
        let mut history = self.examination_type_history();
        let snapshot = history.pop().ok_or_else(|| {
            KartotekaError::Validation("no earlier examination type version".to_string())
        })?;
        self.store_fallback(keys::EXAMINATION_TYPES_HISTORY, &history)?;

        let types: Vec<ExaminationType> =
            snapshot.types.into_iter().map(Record::upgrade).collect();
        let outcome = self.persist_list(
            &EXAMINATION_TYPES,
            &types,
            &format!("Reverted examination types to {}", snapshot.saved_at),
        );
        info!("examination types reverted to version from {}", snapshot.saved_at);
        Ok((types, outcome))
    }

    /// Pretty `{"types": [...]}` document.
    pub fn export_examination_types(&self) -> Result<String> {
        let types = self.get_examination_types();
        Ok(serde_json::to_string_pretty(&ExportDocument { types: &types })?)
    }

    /// Replace the table with an imported `[...]` or `{"types": [...]}` document.
    pub fn import_examination_types(&self, json: &str) -> Result<SaveOutcome> {
        let types = parse_import(json)?;
        info!("importing {} examination types", types.len());
        Ok(self.save_examination_types(types))
    }

    fn push_examination_type_snapshot(&self, current: &[ExaminationType]) {
        if current.is_empty() {
            return;
        }
        let mut history = self.examination_type_history();
        history.push(ExaminationTypeSnapshot {
            saved_at: Utc::now(),
            types: current.to_vec(),
        });
        if history.len() > self.history_limit {
            let excess = history.len() - self.history_limit;
            history.drain(..excess);
        }
        if let Err(e) = self.store_fallback(keys::EXAMINATION_TYPES_HISTORY, &history) {
            error!("failed to record examination type history: {}", e);
        }
    }
}
