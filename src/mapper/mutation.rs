//! Mapping mutations driven by UI events.
//!
//! Each function takes the current mapping and returns the replacement, or
//! `None` when the change is rejected (out of grid, duplicate cell, unknown
//! field or index). Rejections are silent to the caller and only logged.

use crate::events::{FieldDropped, OverlayMoved};
use crate::schema::SchemaIndex;
use crate::types::{CellAddress, FollowTarget, Mapping, Movement, WorkbookState};

/// Drop `drop.field` onto a cell.
///
/// Array fields append. Scalar fields replace their single entry, keeping
/// that entry's movement config. The same cell twice in one field is rejected.
pub(crate) fn apply_drop(
    mapping: &Mapping,
    workbook: &WorkbookState,
    schema: Option<&SchemaIndex>,
    drop: &FieldDropped,
) -> Option<Mapping> {
    if schema.is_some_and(|s| s.field(&drop.field).is_none()) {
        tracing::debug!(field = %drop.field, "drop rejected: field not in schema");
        return None;
    }
    let sheet = drop.sheet.as_deref().unwrap_or(&workbook.active_sheet);
    if !workbook.contains(sheet, drop.row, drop.col) {
        tracing::debug!(field = %drop.field, row = drop.row, col = drop.col, "drop rejected: outside grid");
        return None;
    }

    let existing = mapping.get(&drop.field).map(Vec::as_slice).unwrap_or_default();
    let target = CellAddress::new(sheet, drop.row, drop.col).with_movement(Movement::drop_default());
    if existing.iter().any(|a| a.same_cell(&target)) {
        tracing::debug!(field = %drop.field, "drop rejected: cell already mapped");
        return None;
    }

    let is_array = schema.is_some_and(|s| s.is_array_field(&drop.field));
    let entries = if is_array {
        let mut entries = existing.to_vec();
        entries.push(target);
        entries
    } else {
        let movement = existing
            .first()
            .map_or_else(Movement::drop_default, |a| a.movement.clone());
        vec![target.with_movement(movement)]
    };

    let mut next = mapping.clone();
    next.insert(drop.field.clone(), entries);
    Some(next)
}

/// Move `mapping[field][index]` to a new cell, keeping its movement config.
///
/// When the moved entry belongs to an array field, entries that follow it are
/// shifted by the same delta. A follower that would leave the grid or land on
/// a cell its field already maps stays where it is.
pub(crate) fn apply_move(
    mapping: &Mapping,
    workbook: &WorkbookState,
    schema: Option<&SchemaIndex>,
    moved: &OverlayMoved,
) -> Option<Mapping> {
    let entries = mapping.get(&moved.field)?;
    let old = entries.get(moved.index)?;
    let sheet = moved.sheet.as_deref().unwrap_or(&workbook.active_sheet);
    if !workbook.contains(sheet, moved.row, moved.col) {
        tracing::debug!(field = %moved.field, index = moved.index, "move rejected: outside grid");
        return None;
    }

    let relocated = old.relocated(sheet, moved.row, moved.col);
    let duplicate = entries
        .iter()
        .enumerate()
        .any(|(i, a)| i != moved.index && a.same_cell(&relocated));
    if duplicate || old.same_cell(&relocated) {
        return None;
    }

    let mut next = mapping.clone();
    if let Some(slot) = next.get_mut(&moved.field).and_then(|e| e.get_mut(moved.index)) {
        *slot = relocated;
    }

    let is_array = schema.is_some_and(|s| s.is_array_field(&moved.field));
    if is_array && old.sheet == sheet {
        let dr = i64::from(moved.row) - i64::from(old.row);
        let dc = i64::from(moved.col) - i64::from(old.col);
        let leader = FollowTarget {
            field: moved.field.clone(),
            index: moved.index,
        };
        shift_followers(&mut next, workbook, &leader, dr, dc);
    }
    Some(next)
}

fn shift_followers(
    mapping: &mut Mapping,
    workbook: &WorkbookState,
    leader: &FollowTarget,
    dr: i64,
    dc: i64,
) {
    let followers: Vec<(String, usize)> = mapping
        .iter()
        .flat_map(|(field, entries)| {
            entries
                .iter()
                .enumerate()
                .filter(|(_, a)| a.movement.follow_target() == Some(leader))
                .map(move |(i, _)| (field.clone(), i))
        })
        .collect();

    for (field, index) in followers {
        let Some(entries) = mapping.get_mut(&field) else {
            continue;
        };
        let Some(current) = entries.get(index) else {
            continue;
        };
        let Some((row, col)) = workbook.checked_cell(
            &current.sheet,
            i64::from(current.row) + dr,
            i64::from(current.col) + dc,
        ) else {
            tracing::debug!(field = %field, index, "follower not moved: outside grid");
            continue;
        };
        let shifted = current.relocated(&current.sheet, row, col);
        let duplicate = entries
            .iter()
            .enumerate()
            .any(|(i, a)| i != index && a.same_cell(&shifted));
        if duplicate {
            tracing::debug!(field = %field, index, "follower not moved: cell already mapped");
            continue;
        }
        if let Some(slot) = entries.get_mut(index) {
            *slot = shifted;
        }
    }
}

/// Replace the movement config of one entry.
pub(crate) fn set_movement(
    mapping: &Mapping,
    field: &str,
    index: usize,
    movement: Movement,
) -> Option<Mapping> {
    let mut next = mapping.clone();
    let slot = next.get_mut(field)?.get_mut(index)?;
    slot.movement = movement;
    Some(next)
}

/// Remove one entry; the field goes away with its last entry.
pub(crate) fn remove_address(mapping: &Mapping, field: &str, index: usize) -> Option<Mapping> {
    let mut next = mapping.clone();
    let entries = next.get_mut(field)?;
    if index >= entries.len() {
        return None;
    }
    entries.remove(index);
    if entries.is_empty() {
        next.shift_remove(field);
    }
    Some(next)
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
    use crate::types::CellValue;
    use serde_json::json;

    fn workbook() -> WorkbookState {
        WorkbookState::single_sheet("S", vec![vec![CellValue::Text("v".into()); 4]; 4])
    }

    fn schema() -> SchemaIndex {
        SchemaIndex::from_schema(&json!({
            "properties": {"title": {"type": "string"}, "items": {"type": "array"}}
        }))
        .unwrap()
    }

    fn drop(field: &str, row: u32, col: u32) -> FieldDropped {
        FieldDropped {
            field: field.into(),
            row,
            col,
            sheet: None,
        }
    }

    #[test]
    fn test_scalar_drop_replaces_and_keeps_movement() {
        let wb = workbook();
        let idx = schema();
        let mut m = apply_drop(&Mapping::new(), &wb, Some(&idx), &drop("title", 0, 0)).unwrap();
        m = set_movement(&m, "title", 0, Movement::Script("1".into())).unwrap();
        let m = apply_drop(&m, &wb, Some(&idx), &drop("title", 2, 1)).unwrap();
        assert_eq!(
            m["title"],
            vec![CellAddress::new("S", 2, 1).with_movement(Movement::Script("1".into()))]
        );
    }

    #[test]
    fn test_array_drop_appends_and_rejects_duplicates() {
        let wb = workbook();
        let idx = schema();
        let m = apply_drop(&Mapping::new(), &wb, Some(&idx), &drop("items", 0, 0)).unwrap();
        let m = apply_drop(&m, &wb, Some(&idx), &drop("items", 1, 0)).unwrap();
        assert_eq!(m["items"].len(), 2);
        assert!(apply_drop(&m, &wb, Some(&idx), &drop("items", 1, 0)).is_none());
    }

    #[test]
    fn test_drop_rejects_unknown_field_and_outside_grid() {
        let wb = workbook();
        let idx = schema();
        assert!(apply_drop(&Mapping::new(), &wb, Some(&idx), &drop("nope", 0, 0)).is_none());
        assert!(apply_drop(&Mapping::new(), &wb, Some(&idx), &drop("title", 9, 0)).is_none());
        // no schema loaded: unknown fields are accepted as scalars
        assert!(apply_drop(&Mapping::new(), &wb, None, &drop("nope", 0, 0)).is_some());
    }

    #[test]
    fn test_move_shifts_followers_of_array_leader() {
        let wb = workbook();
        let idx = schema();
        let mut m = Mapping::new();
        m.insert(
            "items".into(),
            vec![
                CellAddress::new("S", 0, 0),
                CellAddress::new("S", 0, 1).with_movement(Movement::follow("items", 0)),
            ],
        );
        m.insert(
            "title".into(),
            vec![CellAddress::new("S", 0, 3).with_movement(Movement::follow("items", 0))],
        );
        let moved = OverlayMoved {
            field: "items".into(),
            index: 0,
            row: 2,
            col: 0,
            sheet: None,
        };
        let next = apply_move(&m, &wb, Some(&idx), &moved).unwrap();
        assert_eq!((next["items"][0].row, next["items"][0].col), (2, 0));
        assert_eq!((next["items"][1].row, next["items"][1].col), (2, 1));
        assert_eq!((next["title"][0].row, next["title"][0].col), (2, 3));
    }

    #[test]
    fn test_follower_move_skipped_when_it_would_duplicate() {
        let wb = workbook();
        let idx = schema();
        let mut m = Mapping::new();
        m.insert(
            "items".into(),
            vec![
                CellAddress::new("S", 0, 0),
                CellAddress::new("S", 0, 1).with_movement(Movement::follow("items", 0)),
                CellAddress::new("S", 1, 1),
            ],
        );
        let moved = OverlayMoved {
            field: "items".into(),
            index: 0,
            row: 1,
            col: 0,
            sheet: None,
        };
        let next = apply_move(&m, &wb, Some(&idx), &moved).unwrap();
        assert_eq!((next["items"][0].row, next["items"][0].col), (1, 0));
        assert_eq!((next["items"][1].row, next["items"][1].col), (0, 1));
    }

    #[test]
    fn test_scalar_leader_move_leaves_followers() {
        let wb = workbook();
        let idx = schema();
        let mut m = Mapping::new();
        m.insert("title".into(), vec![CellAddress::new("S", 0, 0)]);
        m.insert(
            "items".into(),
            vec![CellAddress::new("S", 0, 1).with_movement(Movement::follow("title", 0))],
        );
        let moved = OverlayMoved {
            field: "title".into(),
            index: 0,
            row: 3,
            col: 0,
            sheet: None,
        };
        let next = apply_move(&m, &wb, Some(&idx), &moved).unwrap();
        assert_eq!(next["items"][0].row, 0);
    }

    #[test]
    fn test_move_rejects_bad_index_and_duplicates() {
        let wb = workbook();
        let mut m = Mapping::new();
        m.insert(
            "items".into(),
            vec![CellAddress::new("S", 0, 0), CellAddress::new("S", 1, 0)],
        );
        let mut moved = OverlayMoved {
            field: "items".into(),
            index: 5,
            row: 2,
            col: 0,
            sheet: None,
        };
        assert!(apply_move(&m, &wb, None, &moved).is_none());
        moved.index = 0;
        moved.row = 1;
        assert!(apply_move(&m, &wb, None, &moved).is_none());
    }

    #[test]
    fn test_remove_last_entry_removes_field() {
        let mut m = Mapping::new();
        m.insert("title".into(), vec![CellAddress::new("S", 0, 0)]);
        let next = remove_address(&m, "title", 0).unwrap();
        assert!(next.is_empty());
        assert!(remove_address(&m, "title", 3).is_none());
    }
}
