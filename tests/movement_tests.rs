//! Tests for address movement on confirm.
//!
//! Each strategy is exercised through `MovementEngine` with the real Rhai
//! evaluator: fixed offset, jump-next over empty and merged cells, follow
//! (including chains and cycles) and scripts.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

mod common;
mod fixtures;

use test_case::test_case;
use xlmap::movement::{advance_mapping, MovementEngine};
use xlmap::script::RhaiEvaluator;
use xlmap::{Mapping, Movement, WorkbookState};

use common::{addr, cells_of, offset};
use fixtures::{SheetBuilder, WorkbookBuilder};

fn advance(mapping: &Mapping, workbook: &WorkbookState) -> Mapping {
    advance_mapping(mapping, workbook, &RhaiEvaluator::default())
}

fn single(field: &str, address: xlmap::CellAddress) -> Mapping {
    let mut mapping = Mapping::new();
    mapping.insert(field.to_string(), vec![address]);
    mapping
}

fn grid(rows: usize, cols: usize) -> WorkbookState {
    WorkbookBuilder::new()
        .sheet(SheetBuilder::new("S").filled(rows, cols))
        .build()
}

// ============================================================================
// FIXED OFFSET
// ============================================================================

#[test_case(1, 0, "A2" ; "down one")]
#[test_case(0, 1, "B1" ; "right one")]
#[test_case(2, 2, "C3" ; "diagonal")]
#[test_case(0, 0, "A1" ; "stay")]
fn test_offset_moves(dy: i32, dx: i32, expected: &str) {
    let m = single("f", addr("S", "A1", offset(dy, dx, false)));
    assert_eq!(cells_of(&advance(&m, &grid(4, 4)), "f"), vec![expected]);
}

#[test]
fn test_offset_out_of_bounds_drops_field() {
    // one-row sheet: A1 stepping down leaves the grid
    let m = single("f", addr("S", "A1", offset(1, 0, false)));
    let next = advance(&m, &grid(1, 3));
    assert!(!next.contains_key("f"));
}

#[test_case(-1, 0 ; "above first row")]
#[test_case(0, -1 ; "left of first column")]
fn test_negative_targets_are_dropped(dy: i32, dx: i32) {
    let m = single("f", addr("S", "A1", offset(dy, dx, false)));
    assert!(advance(&m, &grid(3, 3)).is_empty());
}

#[test]
fn test_ragged_rows_use_their_own_width() {
    let wb = WorkbookBuilder::new()
        .sheet(
            SheetBuilder::new("S")
                .row(&["a", "b", "c"])
                .row(&["d"])
                .ragged(),
        )
        .build();
    let m = single("f", addr("S", "C1", offset(1, 0, false)));
    assert!(advance(&m, &wb).is_empty());
    let m = single("f", addr("S", "A1", offset(1, 0, false)));
    assert_eq!(cells_of(&advance(&m, &wb), "f"), vec!["A2"]);
}

// ============================================================================
// JUMP NEXT
// ============================================================================

#[test]
fn test_jump_next_skips_empty_cells() {
    let wb = WorkbookBuilder::new()
        .sheet(SheetBuilder::new("S").row(&["X", "", "Y"]))
        .build();
    let m = single("f", addr("S", "A1", offset(0, 1, true)));
    assert_eq!(cells_of(&advance(&m, &wb), "f"), vec!["C1"]);
}

#[test]
fn test_jump_next_skips_merge_shadows() {
    // A2:A3 merged with a duplicated value in the shadow cell A3
    let wb = WorkbookBuilder::new()
        .sheet(
            SheetBuilder::new("S")
                .row(&["head"])
                .row(&["group"])
                .row(&["group"])
                .row(&["next"])
                .merge("A2:A3"),
        )
        .build();
    let m = single("f", addr("S", "A2", Movement::drop_default()));
    assert_eq!(cells_of(&advance(&m, &wb), "f"), vec!["A4"]);
}

#[test]
fn test_jump_next_fails_when_nothing_follows() {
    let wb = WorkbookBuilder::new()
        .sheet(SheetBuilder::new("S").row(&["X"]).row(&[""]).row(&[""]))
        .build();
    let m = single("f", addr("S", "A1", Movement::drop_default()));
    assert!(advance(&m, &wb).is_empty());
}

#[test]
fn test_jump_search_budget() {
    // 2 rows x factor 1 = 2 steps; the only value sits 3 columns away
    let wb = WorkbookBuilder::new()
        .sheet(SheetBuilder::new("S").row(&["X", "", "", "Y"]).row(&[]))
        .build();
    let m = single("f", addr("S", "A1", offset(0, 1, true)));
    let evaluator = RhaiEvaluator::default();
    let narrow = MovementEngine::new(&wb, &evaluator).with_jump_search_factor(1);
    assert!(narrow.advance(&m).is_empty());
    let wide = MovementEngine::new(&wb, &evaluator).with_jump_search_factor(2);
    assert_eq!(cells_of(&wide.advance(&m), "f"), vec!["D1"]);
}

// ============================================================================
// FOLLOW
// ============================================================================

#[test]
fn test_follow_copies_leader_delta() {
    let mut m = Mapping::new();
    m.insert("leader".into(), vec![addr("S", "A1", offset(1, 0, false))]);
    m.insert("follower".into(), vec![addr("S", "B1", Movement::follow("leader", 0))]);
    let next = advance(&m, &grid(3, 3));
    assert_eq!(cells_of(&next, "leader"), vec!["A2"]);
    assert_eq!(cells_of(&next, "follower"), vec!["B2"]);
}

#[test]
fn test_follow_uses_realized_jump_delta() {
    let wb = WorkbookBuilder::new()
        .sheet(
            SheetBuilder::new("S")
                .row(&["k1", "v1"])
                .row(&["", ""])
                .row(&["k2", "v2"]),
        )
        .build();
    let mut m = Mapping::new();
    m.insert("key".into(), vec![addr("S", "A1", Movement::drop_default())]);
    m.insert("value".into(), vec![addr("S", "B1", Movement::follow("key", 0))]);
    let next = advance(&m, &wb);
    assert_eq!(cells_of(&next, "key"), vec!["A3"]);
    assert_eq!(cells_of(&next, "value"), vec!["B3"]);
}

#[test]
fn test_follower_of_dropped_leader_is_dropped() {
    let mut m = Mapping::new();
    m.insert("leader".into(), vec![addr("S", "A2", offset(1, 0, false))]);
    m.insert("follower".into(), vec![addr("S", "B1", Movement::follow("leader", 0))]);
    assert!(advance(&m, &grid(2, 2)).is_empty());
}

#[test]
fn test_follow_chains_and_cycles_degrade_to_no_entry() {
    let mut m = Mapping::new();
    m.insert("a".into(), vec![addr("S", "A1", offset(1, 0, false))]);
    m.insert("b".into(), vec![addr("S", "B1", Movement::follow("a", 0))]);
    m.insert("c".into(), vec![addr("S", "C1", Movement::follow("b", 0))]);
    m.insert("x".into(), vec![addr("S", "A3", Movement::follow("y", 0))]);
    m.insert("y".into(), vec![addr("S", "B3", Movement::follow("x", 0))]);
    let next = advance(&m, &grid(4, 4));
    assert_eq!(next.keys().collect::<Vec<_>>(), vec!["a", "b"]);
}

#[test]
fn test_follow_within_array_field() {
    let mut m = Mapping::new();
    m.insert(
        "items".into(),
        vec![
            addr("S", "A1", offset(2, 0, false)),
            addr("S", "C1", Movement::follow("items", 0)),
        ],
    );
    assert_eq!(cells_of(&advance(&m, &grid(4, 4)), "items"), vec!["A3", "C3"]);
}

// ============================================================================
// SCRIPTS
// ============================================================================

#[test_case("2", "A4" ; "row delta")]
#[test_case("#{ row: 0, col: 3 }", "D1" ; "absolute")]
#[test_case("#{ col: col + 1 }", "B2" ; "column only")]
#[test_case("if index == 0 { 1 } else { 0 }", "A3" ; "reads index")]
#[test_case("mapping.anchor[0].row", "A3" ; "reads mapping")]
#[test_case("this is not rhai", "A2" ; "syntax error stays put")]
#[test_case(r#""text""#, "A2" ; "malformed result stays put")]
fn test_script_moves(script: &str, expected: &str) {
    let mut m = Mapping::new();
    m.insert("f".into(), vec![addr("S", "A2", Movement::Script(script.into()))]);
    m.insert("anchor".into(), vec![addr("S", "B2", offset(0, 0, false))]);
    assert_eq!(cells_of(&advance(&m, &grid(4, 4)), "f"), vec![expected]);
}

#[test]
fn test_failing_script_does_not_stop_other_fields() {
    let mut m = Mapping::new();
    m.insert("bad".into(), vec![addr("S", "A1", Movement::Script("throw 1".into()))]);
    m.insert("good".into(), vec![addr("S", "B1", offset(1, 0, false))]);
    let next = advance(&m, &grid(3, 3));
    assert_eq!(cells_of(&next, "bad"), vec!["A1"]);
    assert_eq!(cells_of(&next, "good"), vec!["B2"]);
}

#[test]
fn test_script_leader_drives_follower() {
    let mut m = Mapping::new();
    m.insert("lead".into(), vec![addr("S", "A1", Movement::Script("#{ row: 3 }".into()))]);
    m.insert("tail".into(), vec![addr("S", "B1", Movement::follow("lead", 0))]);
    let next = advance(&m, &grid(4, 4));
    assert_eq!(cells_of(&next, "tail"), vec!["B4"]);
}

// ============================================================================
// OUTPUT SHAPE
// ============================================================================

#[test]
fn test_input_mapping_is_not_modified() {
    let m = single("f", addr("S", "A1", offset(1, 0, false)));
    let copy = m.clone();
    let _ = advance(&m, &grid(3, 3));
    assert_eq!(m, copy);
}

#[test]
fn test_partial_survival_keeps_order() {
    let mut m = Mapping::new();
    m.insert(
        "rows".into(),
        vec![
            addr("S", "A1", offset(1, 0, false)),
            addr("S", "A3", offset(1, 0, false)),
            addr("S", "B2", offset(1, 0, false)),
        ],
    );
    assert_eq!(cells_of(&advance(&m, &grid(3, 3)), "rows"), vec!["A2", "B3"]);
}
