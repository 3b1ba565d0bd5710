//! Mapping workflow on top of the [`Store`].
//!
//! `Mapper` owns no state of its own: every operation reads the current
//! [`AppState`](crate::store::AppState), computes the next one and writes it
//! back with a single [`Store::set_state`], so subscribers never observe a
//! half-applied transition.
//!
//! - Record workflow: [`Mapper::confirm_and_advance`], [`Mapper::advance_current_field`],
//!   [`Mapper::confirm_next`], [`Mapper::undo`]
//! - UI events: [`Mapper::handle_event`] (field drops, overlay moves)
//! - Editing: [`Mapper::configure_movement`], [`Mapper::remove_address`]
//! - Setup: [`Mapper::auto_detect`], [`Mapper::load_template`], [`Mapper::save_template`]

pub(crate) mod mutation;

use std::rc::Rc;

use serde_json::Value;

use crate::autodetect::detect_mapping;
use crate::config::{ConfirmNextMode, MapperConfig};
use crate::error::{Result, XlmapError};
use crate::events::{FieldDropped, MappingEvent, OverlayMoved};
use crate::export;
use crate::movement::{MovementEngine, ScriptEvaluator};
use crate::schema::SchemaIndex;
use crate::script::RhaiEvaluator;
use crate::store::{AppState, StatePatch, Store};
use crate::template::{self, TemplateLoad};
use crate::types::{Mapping, Movement};

pub struct Mapper {
    store: Rc<Store>,
    config: MapperConfig,
    evaluator: Box<dyn ScriptEvaluator>,
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Mapper {
    pub fn new(store: Rc<Store>) -> Self {
        Self::with_config(store, MapperConfig::default())
    }

    /// Scripts run in a [`RhaiEvaluator`] built from `config.script`.
    pub fn with_config(store: Rc<Store>, config: MapperConfig) -> Self {
        let evaluator = Box::new(RhaiEvaluator::new(&config.script));
        Self {
            store,
            config,
            evaluator,
        }
    }

    /// Swap the script evaluator.
    pub fn with_evaluator(mut self, evaluator: Box<dyn ScriptEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn store(&self) -> &Rc<Store> {
        &self.store
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    // ========================================================================
    // Record workflow
    // ========================================================================

    /// Snapshot the mapping into `records`, then move every address by its
    /// movement config. Returns `false` without touching state when the
    /// mapping is empty or no workbook is loaded.
    pub fn confirm_and_advance(&self) -> bool {
        let state = self.store.get_state();
        if state.mapping.is_empty() {
            tracing::debug!("confirm skipped: mapping is empty");
            return false;
        }
        let Some(workbook) = state.workbook.as_deref() else {
            tracing::warn!("confirm skipped: no workbook loaded");
            return false;
        };

        let next = MovementEngine::new(workbook, self.evaluator.as_ref())
            .with_jump_search_factor(self.config.jump_search_factor)
            .advance(&state.mapping);

        let mut records = Vec::clone(&state.records);
        records.push(Mapping::clone(&state.mapping));
        let count = records.len();
        self.store
            .set_state(StatePatch::new().records(records).mapping(next));
        tracing::info!(records = count, "record confirmed");
        true
    }

    /// Per-field workflow: snapshot the mapping and focus the next field.
    ///
    /// Returns `Ok(false)` when the focused field has no mapped address.
    pub fn advance_current_field(&self) -> Result<bool> {
        let state = self.store.get_state();
        let schema = state
            .schema
            .as_deref()
            .ok_or(XlmapError::MissingState("schema"))?;
        let names = SchemaIndex::from_schema(schema)?.field_names();
        let Some(current) = names.get(state.current_field_index) else {
            return Ok(false);
        };
        if state.mapping.get(current).map_or(true, Vec::is_empty) {
            tracing::debug!(field = %current, "advance skipped: field is unmapped");
            return Ok(false);
        }

        let mut records = Vec::clone(&state.records);
        records.push(Mapping::clone(&state.mapping));
        let next_index = (state.current_field_index + 1).min(names.len().saturating_sub(1));
        self.store.set_state(
            StatePatch::new()
                .records(records)
                .current_field_index(next_index),
        );
        tracing::info!(field = %current, next_index, "field confirmed");
        Ok(true)
    }

    /// "Confirm & Next" as selected by the state's `confirmNextMode`.
    pub fn confirm_next(&self) -> Result<bool> {
        match self.store.get_state().confirm_next_mode {
            ConfirmNextMode::ShiftRow => Ok(self.confirm_and_advance()),
            ConfirmNextMode::AdvanceField => self.advance_current_field(),
        }
    }

    /// Restore the last confirmed record as the working mapping.
    pub fn undo(&self) -> bool {
        let state = self.store.get_state();
        let mut records = Vec::clone(&state.records);
        let Some(last) = records.pop() else {
            return false;
        };
        let count = records.len();
        self.store
            .set_state(StatePatch::new().mapping(last).records(records));
        tracing::info!(records = count, "undo");
        true
    }

    /// Focus a schema field, clamped to the field list.
    pub fn select_field(&self, index: usize) -> Result<usize> {
        let state = self.store.get_state();
        let schema = state
            .schema
            .as_deref()
            .ok_or(XlmapError::MissingState("schema"))?;
        let count = SchemaIndex::from_schema(schema)?.properties.len();
        let index = index.min(count.saturating_sub(1));
        if index != state.current_field_index {
            self.store
                .set_state(StatePatch::new().current_field_index(index));
        }
        Ok(index)
    }

    // ========================================================================
    // UI events
    // ========================================================================

    /// Apply a UI event. Returns whether the mapping changed.
    pub fn handle_event(&self, event: &MappingEvent) -> bool {
        match event {
            MappingEvent::FieldDropped(drop) => self.drop_field(drop),
            MappingEvent::OverlayMoved(moved) => self.move_overlay(moved),
        }
    }

    pub fn drop_field(&self, drop: &FieldDropped) -> bool {
        self.update_mapping(|state, mapping| {
            let workbook = state.workbook.as_deref()?;
            let index = schema_index(state);
            mutation::apply_drop(mapping, workbook, index.as_ref(), drop)
        })
    }

    pub fn move_overlay(&self, moved: &OverlayMoved) -> bool {
        self.update_mapping(|state, mapping| {
            let workbook = state.workbook.as_deref()?;
            let index = schema_index(state);
            mutation::apply_move(mapping, workbook, index.as_ref(), moved)
        })
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Replace the movement of `mapping[field][index]`.
    pub fn configure_movement(&self, field: &str, index: usize, movement: Movement) -> bool {
        self.update_mapping(|_, mapping| mutation::set_movement(mapping, field, index, movement))
    }

    pub fn remove_address(&self, field: &str, index: usize) -> bool {
        self.update_mapping(|_, mapping| mutation::remove_address(mapping, field, index))
    }

    fn update_mapping<F>(&self, f: F) -> bool
    where
        F: FnOnce(&AppState, &Mapping) -> Option<Mapping>,
    {
        let state = self.store.get_state();
        match f(state.as_ref(), state.mapping.as_ref()) {
            Some(next) => {
                self.store.set_state(StatePatch::new().mapping(next));
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Pre-fill an empty mapping from the configured rules. Does nothing
    /// unless a workbook and a schema are loaded and the mapping is empty.
    pub fn auto_detect(&self) -> bool {
        let state = self.store.get_state();
        if !state.mapping.is_empty() {
            return false;
        }
        let Some(workbook) = state.workbook.as_deref() else {
            return false;
        };
        let Some(index) = schema_index(&state) else {
            return false;
        };
        let detected = detect_mapping(
            &index.field_names(),
            workbook,
            &self.config.auto_detect_rules,
        );
        if detected.is_empty() {
            return false;
        }
        tracing::debug!(fields = detected.len(), "auto-detected mapping");
        self.store.set_state(StatePatch::new().mapping(detected));
        true
    }

    pub fn save_template(&self) -> Result<String> {
        template::save_template(&self.store.get_state())
    }

    /// Replace the mapping with a template's placeable addresses and report
    /// the rest through `errors`.
    pub fn load_template(&self, text: &str) -> Result<TemplateLoad> {
        let state = self.store.get_state();
        let workbook = state
            .workbook
            .as_deref()
            .ok_or(XlmapError::MissingState("workbook"))?;
        let load = template::load_template(text, workbook)?;
        let mut patch = StatePatch::new().mapping(load.mapping.clone());
        if !load.missing.is_empty() {
            patch = patch.errors(load.warnings());
        }
        self.store.set_state(patch);
        Ok(load)
    }

    // ========================================================================
    // Export
    // ========================================================================

    pub fn build_json(&self) -> Result<Value> {
        export::build_json(&self.store.get_state())
    }

    pub fn build_preview_json(&self) -> Result<Value> {
        export::build_preview_json(&self.store.get_state())
    }

    pub fn missing_required_fields(&self) -> Result<Vec<String>> {
        let state = self.store.get_state();
        let schema = state
            .schema
            .as_deref()
            .ok_or(XlmapError::MissingState("schema"))?;
        export::find_missing_required_fields(schema, &state.mapping)
    }
}

/// Index of the loaded schema; `None` when absent or without properties.
fn schema_index(state: &AppState) -> Option<SchemaIndex> {
    state
        .schema
        .as_deref()
        .and_then(|schema| SchemaIndex::from_schema(schema).ok())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::types::{CellAddress, CellValue, WorkbookState};
    use serde_json::json;

    fn mapper() -> Mapper {
        let store = Rc::new(Store::new());
        store.set_state(
            StatePatch::new()
                .workbook(Some(WorkbookState::single_sheet(
                    "S",
                    vec![vec![CellValue::Text("v".into()); 2]; 3],
                )))
                .schema(Some(json!({
                    "properties": {"title": {"type": "string"}, "notes": {"type": "array"}}
                }))),
        );
        Mapper::new(store)
    }

    fn drop(field: &str, row: u32, col: u32) -> MappingEvent {
        MappingEvent::FieldDropped(FieldDropped {
            field: field.into(),
            row,
            col,
            sheet: None,
        })
    }

    #[test]
    fn test_confirm_is_one_notification() {
        let m = mapper();
        assert!(m.handle_event(&drop("title", 0, 0)));
        let before = m.store().version();
        assert!(m.confirm_and_advance());
        assert_eq!(m.store().version(), before + 1);
        let state = m.store().get_state();
        assert_eq!(state.records.len(), 1);
        assert_eq!(state.mapping["title"][0].row, 1);
    }

    #[test]
    fn test_confirm_empty_mapping_is_noop() {
        let m = mapper();
        let before = m.store().version();
        assert!(!m.confirm_and_advance());
        assert_eq!(m.store().version(), before);
    }

    #[test]
    fn test_advance_field_clamps_to_last() {
        let m = mapper();
        assert!(!m.advance_current_field().unwrap());
        m.handle_event(&drop("title", 0, 0));
        assert!(m.advance_current_field().unwrap());
        assert_eq!(m.store().get_state().current_field_index, 1);
        m.handle_event(&drop("notes", 1, 0));
        assert!(m.advance_current_field().unwrap());
        assert!(m.advance_current_field().unwrap());
        let state = m.store().get_state();
        assert_eq!(state.current_field_index, 1);
        assert_eq!(state.records.len(), 3);
    }

    #[test]
    fn test_confirm_next_follows_mode() {
        let m = mapper();
        m.store()
            .set_state(StatePatch::new().confirm_next_mode(ConfirmNextMode::AdvanceField));
        m.handle_event(&drop("title", 0, 0));
        assert!(m.confirm_next().unwrap());
        let state = m.store().get_state();
        assert_eq!(state.current_field_index, 1);
        assert_eq!(state.mapping["title"][0].row, 0);
    }

    #[test]
    fn test_undo_without_records() {
        assert!(!mapper().undo());
    }

    #[test]
    fn test_configure_and_remove() {
        let m = mapper();
        m.handle_event(&drop("title", 0, 0));
        assert!(m.configure_movement(
            "title",
            0,
            Movement::Offset {
                dy: 0,
                dx: 1,
                jump_next: false
            }
        ));
        assert!(!m.configure_movement("title", 4, Movement::default()));
        m.confirm_and_advance();
        assert_eq!(
            m.store().get_state().mapping["title"][0],
            CellAddress::new("S", 0, 1).with_movement(Movement::Offset {
                dy: 0,
                dx: 1,
                jump_next: false
            })
        );
        assert!(m.remove_address("title", 0));
        assert!(m.store().get_state().mapping.is_empty());
    }

    #[test]
    fn test_select_field_clamps() {
        let m = mapper();
        assert_eq!(m.select_field(7).unwrap(), 1);
        assert_eq!(m.store().get_state().current_field_index, 1);
    }
}
