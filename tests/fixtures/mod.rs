//! Test fixtures for building workbooks and schemas in memory.
//!
//! # Example
//!
//! ```rust,ignore
//! use fixtures::{SchemaBuilder, SheetBuilder, WorkbookBuilder};
//!
//! let workbook = WorkbookBuilder::new()
//!     .sheet(
//!         SheetBuilder::new("Sheet1")
//!             .row(&["Name", "Qty"])
//!             .row(&["Apples", "3"])
//!             .merge("A1:A2"),
//!     )
//!     .build();
//!
//! let schema = SchemaBuilder::new().string("name").array("qty").required(&["name"]).build();
//! ```
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use xlmap::cell_ref::{parse_a1_cell, parse_a1_range};
use xlmap::{CellValue, Grid, MergeCorner, MergeRange, WorkbookState};

// ============================================================================
// Sheet Builder
// ============================================================================

/// One sheet of a test workbook.
///
/// Rows are added top to bottom with [`SheetBuilder::row`]; single cells can
/// be placed anywhere with [`SheetBuilder::cell`], growing the grid as needed.
/// Every row is padded to the widest row unless [`SheetBuilder::ragged`] is set.
#[derive(Debug, Clone)]
pub struct SheetBuilder {
    name: String,
    rows: Vec<Vec<CellValue>>,
    merges: Vec<MergeRange>,
    ragged: bool,
}

impl SheetBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: Vec::new(),
            merges: Vec::new(),
            ragged: false,
        }
    }

    /// Append a row of text cells; `""` becomes an empty cell.
    #[must_use]
    pub fn row(mut self, cells: &[&str]) -> Self {
        self.rows.push(cells.iter().map(|c| text(c)).collect());
        self
    }

    /// `rows` x `cols` grid of `"r{row}c{col}"` text cells.
    #[must_use]
    pub fn filled(mut self, rows: usize, cols: usize) -> Self {
        self.rows = (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| CellValue::Text(format!("r{r}c{c}")))
                    .collect()
            })
            .collect();
        self
    }

    /// Place a value at an A1 reference.
    #[must_use]
    pub fn cell(mut self, a1: &str, value: CellValue) -> Self {
        let pos = parse_a1_cell(a1).expect("valid A1 reference");
        let (row, col) = (pos.row as usize, pos.col as usize);
        while self.rows.len() <= row {
            self.rows.push(Vec::new());
        }
        let cells = &mut self.rows[row];
        while cells.len() <= col {
            cells.push(CellValue::Empty);
        }
        cells[col] = value;
        self
    }

    #[must_use]
    pub fn merge(mut self, range: &str) -> Self {
        let range = parse_a1_range(range).expect("valid A1 range");
        self.merges.push(MergeRange {
            s: MergeCorner {
                r: range.start.row,
                c: range.start.col,
            },
            e: MergeCorner {
                r: range.end.row,
                c: range.end.col,
            },
        });
        self
    }

    /// Keep each row at its own length.
    #[must_use]
    pub fn ragged(mut self) -> Self {
        self.ragged = true;
        self
    }

    fn build(self) -> (String, Grid, Vec<MergeRange>) {
        let mut rows = self.rows;
        if !self.ragged {
            let width = rows.iter().map(Vec::len).max().unwrap_or(0);
            for row in &mut rows {
                row.resize(width, CellValue::Empty);
            }
        }
        (self.name, rows, self.merges)
    }
}

fn text(s: &str) -> CellValue {
    if s.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(s.to_string())
    }
}

// ============================================================================
// Workbook Builder
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct WorkbookBuilder {
    sheets: Vec<SheetBuilder>,
    active: Option<String>,
}

impl WorkbookBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sheet(mut self, sheet: SheetBuilder) -> Self {
        self.sheets.push(sheet);
        self
    }

    /// Defaults to the first sheet.
    #[must_use]
    pub fn active(mut self, name: &str) -> Self {
        self.active = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn build(self) -> WorkbookState {
        let mut names = Vec::new();
        let mut data = HashMap::new();
        let mut merges = HashMap::new();
        for sheet in self.sheets {
            let (name, grid, ranges) = sheet.build();
            names.push(name.clone());
            if !ranges.is_empty() {
                merges.insert(name.clone(), ranges);
            }
            data.insert(name, grid);
        }
        let active = self
            .active
            .or_else(|| names.first().cloned())
            .expect("at least one sheet");
        WorkbookState::new(names, active, data, merges).expect("valid workbook")
    }
}

// ============================================================================
// Schema Builder
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Object,
    CellsArray,
    ArrayRoot,
}

/// JSON Schema with a flat list of fields, wrapped in one of the three
/// supported root shapes.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    root: Root,
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Plain object root: `{properties, required}`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Root::Object,
            properties: Map::new(),
            required: Vec::new(),
        }
    }

    /// `{properties: {cells: {type: array, items: {...}}}}`
    #[must_use]
    pub fn cells_array(mut self) -> Self {
        self.root = Root::CellsArray;
        self
    }

    /// `{type: array, items: {...}}`
    #[must_use]
    pub fn array_root(mut self) -> Self {
        self.root = Root::ArrayRoot;
        self
    }

    #[must_use]
    pub fn string(self, name: &str) -> Self {
        self.field(name, json!({"type": "string"}))
    }

    #[must_use]
    pub fn array(self, name: &str) -> Self {
        self.field(name, json!({"type": "array", "items": {"type": "object"}}))
    }

    #[must_use]
    pub fn field(mut self, name: &str, meta: Value) -> Self {
        self.properties.insert(name.to_string(), meta);
        self
    }

    #[must_use]
    pub fn required(mut self, names: &[&str]) -> Self {
        self.required.extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    #[must_use]
    pub fn build(self) -> Value {
        let item = json!({
            "type": "object",
            "properties": Value::Object(self.properties),
            "required": self.required,
        });
        match self.root {
            Root::Object => item,
            Root::CellsArray => json!({
                "type": "object",
                "properties": {"cells": {"type": "array", "items": item}}
            }),
            Root::ArrayRoot => json!({"type": "array", "items": item}),
        }
    }
}
