//! Schema-driven JSON export.
//!
//! Every mapped address becomes `{ "cell": "B3", "value": "..." }`. Array
//! fields export a list of those pairs in mapping order; scalar fields export
//! their single pair or are left out.

use serde_json::{json, Map, Value};

use crate::cell_ref::format_a1_cell;
use crate::error::{Result, XlmapError};
use crate::schema::{SchemaIndex, SchemaShape};
use crate::store::AppState;
use crate::types::{CellAddress, Mapping, WorkbookState};

/// Build the export document from the confirmed records.
///
/// The schema root picks the shape:
///
/// | root                           | output                              |
/// |--------------------------------|-------------------------------------|
/// | object with array `cells`      | `{ "cells": [record, ...] }`        |
/// | array                          | `[{ "cells": record }, ...]`        |
/// | plain object                   | `{ "cells": last_record }`          |
pub fn build_json(state: &AppState) -> Result<Value> {
    let (workbook, index) = export_inputs(state)?;
    let flat = |record: &Mapping| Value::Object(flatten(record, workbook, &index));

    let doc = match index.shape {
        SchemaShape::CellsArray => json!({
            "cells": state.records.iter().map(flat).collect::<Vec<_>>()
        }),
        SchemaShape::ArrayRoot => Value::Array(
            state
                .records
                .iter()
                .map(|r| json!({ "cells": flat(r) }))
                .collect(),
        ),
        SchemaShape::PlainObject => {
            let last = state.records.last().ok_or(XlmapError::NoConfirmedRecords)?;
            json!({ "cells": flat(last) })
        }
    };
    Ok(doc)
}

/// `{ "cells": ... }` for the live mapping; needs no confirmed records.
pub fn build_preview_json(state: &AppState) -> Result<Value> {
    let (workbook, index) = export_inputs(state)?;
    Ok(json!({ "cells": flatten(&state.mapping, workbook, &index) }))
}

fn export_inputs(state: &AppState) -> Result<(&WorkbookState, SchemaIndex)> {
    let workbook = state
        .workbook
        .as_deref()
        .ok_or(XlmapError::MissingState("workbook"))?;
    let schema = state
        .schema
        .as_deref()
        .ok_or(XlmapError::MissingState("schema"))?;
    Ok((workbook, SchemaIndex::from_schema(schema)?))
}

/// Flatten one mapping against the schema's fields, in schema order.
/// Fields the schema does not declare are ignored.
pub fn flatten(mapping: &Mapping, workbook: &WorkbookState, index: &SchemaIndex) -> Map<String, Value> {
    let mut out = Map::new();
    for name in index.properties.keys() {
        let addrs = mapping.get(name).map(Vec::as_slice).unwrap_or_default();
        if index.is_array_field(name) {
            if addrs.is_empty() && !index.is_required(name) {
                continue;
            }
            let pairs = addrs.iter().map(|a| cell_pair(a, workbook)).collect();
            out.insert(name.clone(), Value::Array(pairs));
        } else if let Some(addr) = addrs.first() {
            out.insert(name.clone(), cell_pair(addr, workbook));
        }
    }
    out
}

fn cell_pair(addr: &CellAddress, workbook: &WorkbookState) -> Value {
    let value = workbook
        .resolved_value(&addr.sheet, addr.row, addr.col)
        .map(ToString::to_string)
        .unwrap_or_default();
    json!({
        "cell": format_a1_cell(addr.row, addr.col),
        "value": value,
    })
}

/// Required scalar fields with no mapped address. Required array fields are
/// never reported; an empty list is a valid export for them.
pub fn find_missing_required_fields(schema: &Value, mapping: &Mapping) -> Result<Vec<String>> {
    let index = SchemaIndex::from_schema(schema)?;
    Ok(index
        .required
        .iter()
        .filter(|name| !index.is_array_field(name))
        .filter(|name| mapping.get(*name).map_or(true, Vec::is_empty))
        .cloned()
        .collect())
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
    use crate::types::{CellValue, MergeCorner, MergeRange};
    use std::rc::Rc;

    fn workbook() -> WorkbookState {
        WorkbookState::single_sheet(
            "Sheet1",
            vec![
                vec![CellValue::Text("Alice".into()), CellValue::Number(42.0)],
                vec![CellValue::Empty, CellValue::Boolean(true)],
            ],
        )
        .with_merges(
            "Sheet1",
            vec![MergeRange {
                s: MergeCorner { r: 0, c: 0 },
                e: MergeCorner { r: 1, c: 0 },
            }],
        )
    }

    fn mapping(entries: &[(&str, u32, u32)]) -> Mapping {
        let mut m = Mapping::new();
        for (field, row, col) in entries {
            m.entry((*field).to_string())
                .or_default()
                .push(CellAddress::new("Sheet1", *row, *col));
        }
        m
    }

    #[test]
    fn test_flatten_values_and_shadow_cells() {
        let index = SchemaIndex::from_schema(&json!({
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "number"},
                "flags": {"type": "array"}
            }
        }))
        .unwrap();
        let m = mapping(&[("name", 1, 0), ("age", 0, 1), ("flags", 1, 1), ("flags", 0, 0)]);
        let out = Value::Object(flatten(&m, &workbook(), &index));
        assert_eq!(
            out,
            json!({
                "name": {"cell": "A2", "value": "Alice"},
                "age": {"cell": "B1", "value": "42"},
                "flags": [
                    {"cell": "B2", "value": "true"},
                    {"cell": "A1", "value": "Alice"}
                ]
            })
        );
    }

    #[test]
    fn test_unmapped_fields() {
        let index = SchemaIndex::from_schema(&json!({
            "properties": {
                "title": {"type": "string"},
                "tags": {"type": "array"},
                "notes": {"type": "array"}
            },
            "required": ["tags"]
        }))
        .unwrap();
        let out = Value::Object(flatten(&Mapping::new(), &workbook(), &index));
        assert_eq!(out, json!({"tags": []}));
    }

    #[test]
    fn test_plain_object_needs_records() {
        let state = AppState {
            workbook: Some(Rc::new(workbook())),
            schema: Some(Rc::new(json!({"properties": {"title": {}}}))),
            ..AppState::default()
        };
        assert!(matches!(build_json(&state), Err(XlmapError::NoConfirmedRecords)));
        assert_eq!(build_preview_json(&state).unwrap(), json!({"cells": {}}));
    }

    #[test]
    fn test_missing_inputs() {
        let state = AppState::default();
        assert!(matches!(
            build_json(&state),
            Err(XlmapError::MissingState("workbook"))
        ));
        let state = AppState {
            workbook: Some(Rc::new(workbook())),
            ..AppState::default()
        };
        assert!(matches!(
            build_json(&state),
            Err(XlmapError::MissingState("schema"))
        ));
    }

    #[test]
    fn test_missing_required_skips_arrays() {
        let schema = json!({
            "properties": {"title": {"type": "string"}, "rows": {"type": "array"}},
            "required": ["title", "rows"]
        });
        assert_eq!(
            find_missing_required_fields(&schema, &Mapping::new()).unwrap(),
            vec!["title".to_string()]
        );
        let m = mapping(&[("title", 0, 0)]);
        assert!(find_missing_required_fields(&schema, &m).unwrap().is_empty());
    }
}
