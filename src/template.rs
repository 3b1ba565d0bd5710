//! Saved mapping templates.
//!
//! A template is the working mapping plus the sheet it was made on:
//!
//! ```json
//! { "sheetName": "Sheet1", "fields": { "title": [{ "sheet": "Sheet1", "row": 0, "col": 0 }] } }
//! ```
//!
//! Loading re-validates every address against the current workbook. Addresses
//! that no longer fit are reported, not fatal.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, XlmapError};
use crate::store::AppState;
use crate::types::{CellAddress, Mapping, WorkbookState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingTemplate {
    pub sheet_name: Option<String>,
    pub fields: Mapping,
}

/// An address from the template that could not be placed.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingAddress {
    pub field: String,
    pub address: CellAddress,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplateLoad {
    pub mapping: Mapping,
    pub missing: Vec<MissingAddress>,
}

impl TemplateLoad {
    /// One `Missing cell for field <f>` line per unplaced address.
    pub fn warnings(&self) -> Vec<String> {
        self.missing
            .iter()
            .map(|m| format!("Missing cell for field {}", m.field))
            .collect()
    }
}

/// Serialize the working mapping as pretty-printed template JSON.
pub fn save_template(state: &AppState) -> Result<String> {
    if state.mapping.is_empty() {
        return Err(XlmapError::InvalidTemplate("No mapping to save".into()));
    }
    let template = MappingTemplate {
        sheet_name: state.workbook.as_ref().map(|wb| wb.active_sheet.clone()),
        fields: Mapping::clone(&state.mapping),
    };
    Ok(serde_json::to_string_pretty(&template)?)
}

/// Parse template text and keep the addresses that exist in `workbook`.
///
/// An address survives when its sheet is the active sheet and the cell lies
/// inside that sheet's grid. Fields with no surviving address are dropped.
pub fn load_template(text: &str, workbook: &WorkbookState) -> Result<TemplateLoad> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| XlmapError::InvalidTemplate(format!("Invalid template JSON: {e}")))?;
    let fields = value
        .get("fields")
        .filter(|f| !f.is_null())
        .cloned()
        .ok_or_else(|| XlmapError::InvalidTemplate("Template missing \"fields\"".into()))?;
    let fields: Mapping = serde_json::from_value(fields)
        .map_err(|e| XlmapError::InvalidTemplate(format!("Invalid template fields: {e}")))?;

    let mut load = TemplateLoad::default();
    for (field, addrs) in fields {
        let mut kept = Vec::with_capacity(addrs.len());
        for addr in addrs {
            if addr.sheet == workbook.active_sheet
                && workbook.contains(&addr.sheet, addr.row, addr.col)
            {
                kept.push(addr);
            } else {
                load.missing.push(MissingAddress {
                    field: field.clone(),
                    address: addr,
                });
            }
        }
        if !kept.is_empty() {
            load.mapping.insert(field, kept);
        }
    }
    if !load.missing.is_empty() {
        tracing::warn!(missing = load.missing.len(), "template addresses outside the workbook");
    }
    Ok(load)
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
    use crate::types::{CellValue, Movement};
    use std::rc::Rc;

    fn workbook() -> WorkbookState {
        WorkbookState::single_sheet("Sheet1", vec![vec![CellValue::Text("a".into()); 2]; 2])
    }

    #[test]
    fn test_save_then_load_keeps_movement() {
        let mut mapping = Mapping::new();
        mapping.insert(
            "title".into(),
            vec![CellAddress::new("Sheet1", 1, 1).with_movement(Movement::Script("2".into()))],
        );
        let state = AppState {
            workbook: Some(Rc::new(workbook())),
            mapping: Rc::new(mapping.clone()),
            ..AppState::default()
        };
        let text = save_template(&state).unwrap();
        assert!(text.contains("\"sheetName\": \"Sheet1\""));
        let load = load_template(&text, &workbook()).unwrap();
        assert_eq!(load.mapping, mapping);
        assert!(load.missing.is_empty());
    }

    #[test]
    fn test_empty_mapping_cannot_be_saved() {
        assert!(matches!(
            save_template(&AppState::default()),
            Err(XlmapError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn test_unplaceable_addresses_are_reported() {
        let text = r#"{
            "sheetName": "Sheet1",
            "fields": {
                "title": [{"sheet": "Sheet1", "row": 9, "col": 0}],
                "notes": [
                    {"sheet": "Other", "row": 0, "col": 0},
                    {"sheet": "Sheet1", "row": 0, "col": 1}
                ]
            }
        }"#;
        let load = load_template(text, &workbook()).unwrap();
        assert_eq!(load.mapping.keys().collect::<Vec<_>>(), vec!["notes"]);
        assert_eq!(
            load.warnings(),
            vec![
                "Missing cell for field title".to_string(),
                "Missing cell for field notes".to_string()
            ]
        );
    }

    #[test]
    fn test_malformed_templates() {
        for text in ["not json", r#"{"sheetName": "x"}"#, r#"{"fields": {"a": 3}}"#] {
            assert!(matches!(
                load_template(text, &workbook()),
                Err(XlmapError::InvalidTemplate(_))
            ));
        }
    }
}
