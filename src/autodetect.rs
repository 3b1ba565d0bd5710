//! Heuristic first guess at a mapping for a freshly loaded workbook.

use indexmap::IndexMap;

use crate::cell_ref::parse_a1_cell;
use crate::types::{CellAddress, Mapping, Movement, WorkbookState};

/// Map each field whose lowercase name has a rule to the rule's A1 cell on
/// the active sheet. Unparseable rules and cells outside the grid are skipped.
pub fn detect_mapping(
    fields: &[String],
    workbook: &WorkbookState,
    rules: &IndexMap<String, String>,
) -> Mapping {
    let sheet = workbook.active_sheet.as_str();
    let mut mapping = Mapping::new();
    for field in fields {
        let Some(a1) = rules.get(&field.to_lowercase()) else {
            continue;
        };
        let Some(pos) = parse_a1_cell(a1) else {
            tracing::debug!(field = %field, rule = %a1, "auto-detect rule is not an A1 cell");
            continue;
        };
        if !workbook.contains(sheet, pos.row, pos.col) {
            continue;
        }
        let addr = CellAddress::new(sheet, pos.row, pos.col).with_movement(Movement::drop_default());
        mapping.insert(field.clone(), vec![addr]);
    }
    mapping
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
    use crate::config::MapperConfig;
    use crate::types::CellValue;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_default_rules() {
        let wb = WorkbookState::single_sheet("S", vec![vec![CellValue::Text("x".into()); 2]]);
        let rules = MapperConfig::default().auto_detect_rules;
        let m = detect_mapping(&fields(&["Title", "description", "other"]), &wb, &rules);
        assert_eq!(m.len(), 2);
        assert_eq!(
            m["Title"],
            vec![CellAddress::new("S", 0, 0).with_movement(Movement::drop_default())]
        );
        assert_eq!((m["description"][0].row, m["description"][0].col), (0, 1));
    }

    #[test]
    fn test_out_of_grid_rule_is_skipped() {
        let wb = WorkbookState::single_sheet("S", vec![vec![CellValue::Text("x".into())]]);
        let rules = MapperConfig::default().auto_detect_rules;
        let m = detect_mapping(&fields(&["title", "description"]), &wb, &rules);
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["title"]);
    }
}
