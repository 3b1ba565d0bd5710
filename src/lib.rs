//! xlmap - map spreadsheet cells onto JSON Schema fields
//!
//! Drag cells onto schema fields, confirm a record, let every mapped address
//! step to the next record, and export the confirmed records as JSON:
//! - Observable application store with copy-on-read snapshots
//! - Per-address movement: fixed offset, jump to next non-empty cell, follow
//!   another address, or a sandboxed Rhai script
//! - Merge-aware grid (shadow cells are skipped and read through)
//! - Schema-shaped export with required-field checks
//! - Undo, mapping templates, auto-detect
//!
//! # Usage (Rust)
//!
//! ```
//! use std::rc::Rc;
//! use serde_json::json;
//! use xlmap::{CellValue, Mapper, StatePatch, Store, WorkbookState};
//! use xlmap::events::{FieldDropped, MappingEvent};
//!
//! let store = Rc::new(Store::new());
//! store.set_state(
//!     StatePatch::new()
//!         .workbook(Some(WorkbookState::single_sheet(
//!             "Sheet1",
//!             vec![vec![CellValue::Text("Alice".into())]],
//!         )))
//!         .schema(Some(json!({"properties": {"title": {"type": "string"}}}))),
//! );
//! let mapper = Mapper::new(Rc::clone(&store));
//! mapper.handle_event(&MappingEvent::FieldDropped(FieldDropped {
//!     field: "title".into(),
//!     row: 0,
//!     col: 0,
//!     sheet: None,
//! }));
//! assert!(mapper.confirm_and_advance());
//! assert_eq!(
//!     mapper.build_json().unwrap(),
//!     json!({"cells": {"title": {"cell": "A1", "value": "Alice"}}})
//! );
//! ```
//!
//! # Usage (JavaScript)
//!
//! ```javascript
//! import init, { XlMap } from 'xlmap';
//! await init();
//! const map = new XlMap();
//! map.set('workbook', workbook);
//! map.set('schema', schema);
//! map.dispatchEvent({ type: 'FIELD_DROPPED', detail: { field: 'title', row: 0, col: 0 } });
//! map.confirmAndAdvance();
//! console.log(map.buildJson());
//! ```

// Data model
pub mod cell_ref;
pub mod config;
pub mod error;
pub mod schema;
pub mod types;

// State and workflow
pub mod events;
pub mod mapper;
pub mod movement;
pub mod script;
pub mod store;

// Setup and output
pub mod autodetect;
pub mod export;
pub mod template;

// JavaScript bindings
pub mod bindings;

use wasm_bindgen::prelude::*;

pub use bindings::XlMap;
pub use config::{ConfirmNextMode, MapperConfig};
pub use error::{Result, XlmapError};
pub use mapper::Mapper;
pub use store::{AppState, StateKey, StatePatch, Store, Subscription};
pub use types::*;

/// Format a 0-indexed cell as an A1 reference (`(0, 27)` → `"AB1"`).
#[must_use]
#[wasm_bindgen(js_name = "formatA1")]
pub fn format_a1(row: u32, col: u32) -> String {
    cell_ref::format_a1_cell(row, col)
}

/// Parse an A1 reference into `[row, col]` (0-indexed), `undefined` if invalid.
#[must_use]
#[wasm_bindgen(js_name = "parseA1")]
pub fn parse_a1(a1: &str) -> Option<Vec<u32>> {
    cell_ref::parse_a1_cell(a1).map(|pos| vec![pos.row, pos.col])
}

/// Get the library version
#[must_use]
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
