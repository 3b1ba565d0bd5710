//! Common test utilities and assertion helpers.
//!
//! Sessions are a [`Mapper`] over a fresh [`Store`] with a workbook and schema
//! already loaded. Cells are addressed with A1 references throughout.
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use xlmap::cell_ref::{format_a1_cell, parse_a1_cell};
use xlmap::events::{FieldDropped, MappingEvent, OverlayMoved};
use xlmap::{
    AppState, CellAddress, Mapper, MapperConfig, Mapping, Movement, StatePatch, Store,
    WorkbookState,
};

// ============================================================================
// Session Helpers
// ============================================================================

/// Mapper over a store holding `workbook` and `schema`.
#[must_use]
pub fn session(workbook: WorkbookState, schema: Value) -> Mapper {
    session_with_config(workbook, schema, MapperConfig::default())
}

#[must_use]
pub fn session_with_config(workbook: WorkbookState, schema: Value, config: MapperConfig) -> Mapper {
    let store = Rc::new(Store::with_state(AppState {
        confirm_next_mode: config.confirm_next_mode,
        ..AppState::default()
    }));
    store.set_state(
        StatePatch::new()
            .workbook(Some(workbook))
            .schema(Some(schema)),
    );
    Mapper::with_config(store, config)
}

/// Every state a store notifies with, in order (including the initial call).
pub fn record_states(store: &Store) -> Rc<RefCell<Vec<Rc<AppState>>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    // Dropping the subscription handle keeps the listener registered.
    let _subscription = store.subscribe(move |state, _prev| {
        sink.borrow_mut().push(Rc::new(state.clone()));
        Ok(())
    });
    seen
}

// ============================================================================
// Event Helpers
// ============================================================================

pub fn pos(a1: &str) -> (u32, u32) {
    let p = parse_a1_cell(a1).unwrap_or_else(|| panic!("bad A1 reference {a1}"));
    (p.row, p.col)
}

/// Dispatch a FIELD_DROPPED event on the active sheet.
pub fn drop_at(mapper: &Mapper, field: &str, a1: &str) -> bool {
    let (row, col) = pos(a1);
    mapper.handle_event(&MappingEvent::FieldDropped(FieldDropped {
        field: field.to_string(),
        row,
        col,
        sheet: None,
    }))
}

/// Dispatch an OVERLAY_MOVED event on the active sheet.
pub fn move_to(mapper: &Mapper, field: &str, index: usize, a1: &str) -> bool {
    let (row, col) = pos(a1);
    mapper.handle_event(&MappingEvent::OverlayMoved(OverlayMoved {
        field: field.to_string(),
        index,
        row,
        col,
        sheet: None,
    }))
}

pub fn offset(dy: i32, dx: i32, jump_next: bool) -> Movement {
    Movement::Offset { dy, dx, jump_next }
}

/// Address on `sheet` at an A1 reference with the given movement.
pub fn addr(sheet: &str, a1: &str, movement: Movement) -> CellAddress {
    let (row, col) = pos(a1);
    CellAddress::new(sheet, row, col).with_movement(movement)
}

// ============================================================================
// Assertions
// ============================================================================

/// A1 references mapped for `field`, in order; empty when unmapped.
pub fn cells_of(mapping: &Mapping, field: &str) -> Vec<String> {
    mapping
        .get(field)
        .map(|addrs| {
            addrs
                .iter()
                .map(|a| format_a1_cell(a.row, a.col))
                .collect()
        })
        .unwrap_or_default()
}

/// Assert the live mapping of `field` is exactly `expected` (A1 references).
#[track_caller]
pub fn assert_mapped(mapper: &Mapper, field: &str, expected: &[&str]) {
    let state = mapper.store().get_state();
    assert_eq!(
        cells_of(&state.mapping, field),
        expected.iter().map(|s| (*s).to_string()).collect::<Vec<_>>(),
        "mapping of field {field}"
    );
}

#[track_caller]
pub fn assert_unmapped(mapper: &Mapper, field: &str) {
    let state = mapper.store().get_state();
    assert!(
        !state.mapping.contains_key(field),
        "field {field} should be absent, got {:?}",
        cells_of(&state.mapping, field)
    );
}
