//! Per-address movement applied when a record is confirmed.
//!
//! [`MovementEngine::advance`] maps every entry of a mapping to its next
//! address, or drops it when the move leaves the grid. Two passes:
//!
//! 1. every non-follow entry is moved by its own strategy (offset, jump-next,
//!    script) and, if it survives, its realized `(Δrow, Δcol)` is recorded
//!    under `(field, index)`;
//! 2. every follow entry applies the delta recorded for its leader. A leader
//!    that produced no delta (dropped, or itself a follower) drops the
//!    follower too, so follow chains and cycles degrade to "no entry".
//!
//! Fields left without entries are removed from the result.

use std::collections::HashMap;

use crate::types::{CellAddress, Mapping, Movement, WorkbookState};

const DEFAULT_JUMP_SEARCH_FACTOR: usize = 4;

/// Inputs visible to a movement script: exactly `row, col, sheet, field,
/// index, mapping`.
#[derive(Debug, Clone, Copy)]
pub struct ScriptContext<'a> {
    pub row: u32,
    pub col: u32,
    pub sheet: &'a str,
    pub field: &'a str,
    pub index: usize,
    pub mapping: &'a Mapping,
}

/// What a script asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// Added to the current row.
    RowDelta(i64),
    /// Absolute coordinates; a missing axis keeps its current value.
    Absolute { row: Option<i64>, col: Option<i64> },
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("script failed: {0}")]
    Eval(String),
    #[error("script returned {0}, expected a number or {{row, col}}")]
    Malformed(String),
}

/// Sandboxed evaluation of user movement scripts.
pub trait ScriptEvaluator {
    fn evaluate(
        &self,
        script: &str,
        ctx: &ScriptContext<'_>,
    ) -> Result<ScriptOutcome, ScriptError>;
}

pub struct MovementEngine<'a> {
    workbook: &'a WorkbookState,
    evaluator: &'a dyn ScriptEvaluator,
    jump_search_factor: usize,
}

impl<'a> MovementEngine<'a> {
    pub fn new(workbook: &'a WorkbookState, evaluator: &'a dyn ScriptEvaluator) -> Self {
        Self {
            workbook,
            evaluator,
            jump_search_factor: DEFAULT_JUMP_SEARCH_FACTOR,
        }
    }

    #[must_use]
    pub fn with_jump_search_factor(mut self, factor: usize) -> Self {
        self.jump_search_factor = factor;
        self
    }

    /// Next mapping after one confirm.
    pub fn advance(&self, mapping: &Mapping) -> Mapping {
        let mut deltas: HashMap<(&str, usize), (i64, i64)> = HashMap::new();

        let mut moved: Vec<Vec<Option<CellAddress>>> = mapping
            .iter()
            .map(|(field, addresses)| {
                addresses
                    .iter()
                    .enumerate()
                    .map(|(index, addr)| {
                        if matches!(addr.movement, Movement::Follow(_)) {
                            return None;
                        }
                        let (row, col) = self.next_position(field, index, addr, mapping)?;
                        deltas.insert(
                            (field.as_str(), index),
                            (
                                i64::from(row) - i64::from(addr.row),
                                i64::from(col) - i64::from(addr.col),
                            ),
                        );
                        Some(addr.relocated(&addr.sheet, row, col))
                    })
                    .collect()
            })
            .collect();

        for ((field, addresses), slots) in mapping.iter().zip(moved.iter_mut()) {
            for ((index, addr), slot) in addresses.iter().enumerate().zip(slots.iter_mut()) {
                let Movement::Follow(target) = &addr.movement else {
                    continue;
                };
                let Some(&(dr, dc)) = deltas.get(&(target.field.as_str(), target.index)) else {
                    tracing::debug!(
                        field = %field,
                        index,
                        leader = %target.field,
                        leader_index = target.index,
                        "follower dropped: leader produced no movement"
                    );
                    continue;
                };
                *slot = self
                    .workbook
                    .checked_cell(
                        &addr.sheet,
                        i64::from(addr.row) + dr,
                        i64::from(addr.col) + dc,
                    )
                    .map(|(row, col)| addr.relocated(&addr.sheet, row, col));
            }
        }

        mapping
            .keys()
            .zip(moved)
            .filter_map(|(field, slots)| {
                let kept: Vec<CellAddress> = slots.into_iter().flatten().collect();
                if kept.is_empty() {
                    tracing::debug!(field = %field, "field has no addresses left after move");
                    None
                } else {
                    Some((field.clone(), kept))
                }
            })
            .collect()
    }

    /// Bounds-checked next position of a non-follow entry.
    fn next_position(
        &self,
        field: &str,
        index: usize,
        addr: &CellAddress,
        mapping: &Mapping,
    ) -> Option<(u32, u32)> {
        let row = i64::from(addr.row);
        let col = i64::from(addr.col);
        let (next_row, next_col) = match &addr.movement {
            Movement::Offset {
                dy,
                dx,
                jump_next: true,
            } => self.jump_next(addr, i64::from(*dy), i64::from(*dx))?,
            Movement::Offset { dy, dx, .. } => (row + i64::from(*dy), col + i64::from(*dx)),
            Movement::Script(script) => {
                let ctx = ScriptContext {
                    row: addr.row,
                    col: addr.col,
                    sheet: &addr.sheet,
                    field,
                    index,
                    mapping,
                };
                match self.evaluator.evaluate(script, &ctx) {
                    Ok(ScriptOutcome::RowDelta(delta)) => (row.saturating_add(delta), col),
                    Ok(ScriptOutcome::Absolute { row: r, col: c }) => {
                        (r.unwrap_or(row), c.unwrap_or(col))
                    }
                    Err(err) => {
                        tracing::warn!(
                            field = %field,
                            index,
                            error = %err,
                            "movement script failed; address left in place"
                        );
                        (row, col)
                    }
                }
            }
            Movement::Follow(_) => return None,
        };
        let next = self.workbook.checked_cell(&addr.sheet, next_row, next_col);
        if next.is_none() {
            tracing::debug!(
                field = %field,
                index,
                row = next_row,
                col = next_col,
                "address moved out of the grid"
            );
        }
        next
    }

    /// Step by `(dy, dx)` until a cell that is neither empty nor a merge
    /// shadow is found. Leaving the grid or exhausting the step budget fails.
    fn jump_next(&self, addr: &CellAddress, dy: i64, dx: i64) -> Option<(i64, i64)> {
        let rows = self.workbook.row_count(&addr.sheet);
        let limit = rows.saturating_mul(self.jump_search_factor).max(1);
        let (mut row, mut col) = (i64::from(addr.row), i64::from(addr.col));
        for _ in 0..limit {
            row += dy;
            col += dx;
            let (r, c) = self.workbook.checked_cell(&addr.sheet, row, col)?;
            if self.workbook.is_shadow(&addr.sheet, r, c)
                || self.workbook.is_empty_cell(&addr.sheet, r, c)
            {
                continue;
            }
            return Some((row, col));
        }
        None
    }
}

/// Advance `mapping` with the default jump search budget.
pub fn advance_mapping(
    mapping: &Mapping,
    workbook: &WorkbookState,
    evaluator: &dyn ScriptEvaluator,
) -> Mapping {
    MovementEngine::new(workbook, evaluator).advance(mapping)
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

    /// Evaluator that interprets the script text as a fixed outcome.
    struct FixedEvaluator;

    impl ScriptEvaluator for FixedEvaluator {
        fn evaluate(
            &self,
            script: &str,
            _ctx: &ScriptContext<'_>,
        ) -> Result<ScriptOutcome, ScriptError> {
            match script {
                "fail" => Err(ScriptError::Eval("boom".into())),
                "abs" => Ok(ScriptOutcome::Absolute {
                    row: Some(2),
                    col: None,
                }),
                other => other
                    .parse()
                    .map(ScriptOutcome::RowDelta)
                    .map_err(|_| ScriptError::Malformed(other.into())),
            }
        }
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.into())
    }

    fn grid(rows: usize, cols: usize) -> WorkbookState {
        WorkbookState::single_sheet("S", vec![vec![text("v"); cols]; rows])
    }

    fn mapping_of(entries: Vec<(&str, Vec<CellAddress>)>) -> Mapping {
        entries
            .into_iter()
            .map(|(f, a)| (f.to_string(), a))
            .collect()
    }

    fn offset(dy: i32, dx: i32, jump_next: bool) -> Movement {
        Movement::Offset { dy, dx, jump_next }
    }

    #[test]
    fn test_fixed_offset_moves_unconditionally() {
        let wb = WorkbookState::single_sheet("S", vec![vec![CellValue::Empty; 2]; 3]);
        let m = mapping_of(vec![(
            "a",
            vec![CellAddress::new("S", 0, 0).with_movement(offset(2, 1, false))],
        )]);
        let next = advance_mapping(&m, &wb, &FixedEvaluator);
        assert_eq!(next["a"][0], CellAddress::new("S", 2, 1).with_movement(offset(2, 1, false)));
    }

    #[test]
    fn test_negative_result_is_dropped() {
        let wb = grid(3, 3);
        let m = mapping_of(vec![(
            "a",
            vec![CellAddress::new("S", 0, 0).with_movement(offset(-1, 0, false))],
        )]);
        assert!(advance_mapping(&m, &wb, &FixedEvaluator).is_empty());
    }

    #[test]
    fn test_jump_next_skips_shadow_cells() {
        let wb = grid(4, 1).with_merges(
            "S",
            vec![crate::types::MergeRange {
                s: crate::types::MergeCorner { r: 1, c: 0 },
                e: crate::types::MergeCorner { r: 2, c: 0 },
            }],
        );
        let m = mapping_of(vec![(
            "a",
            vec![CellAddress::new("S", 1, 0).with_movement(offset(1, 0, true))],
        )]);
        let next = advance_mapping(&m, &wb, &FixedEvaluator);
        assert_eq!(next["a"][0].row, 3);
    }

    #[test]
    fn test_jump_next_exhausting_budget_drops() {
        let m = mapping_of(vec![(
            "a",
            vec![CellAddress::new("S", 0, 0).with_movement(offset(0, 0, true))],
        )]);
        // dy = dx = 0 on an empty cell never finds a target
        let empty = WorkbookState::single_sheet("S", vec![vec![CellValue::Empty]]);
        assert!(advance_mapping(&m, &empty, &FixedEvaluator).is_empty());
        // ... but stays put on a non-empty one
        let filled = WorkbookState::single_sheet("S", vec![vec![text("x")]]);
        assert_eq!(advance_mapping(&m, &filled, &FixedEvaluator)["a"][0].row, 0);
    }

    #[test]
    fn test_script_outcomes() {
        let wb = grid(5, 3);
        let m = mapping_of(vec![(
            "a",
            vec![
                CellAddress::new("S", 0, 1).with_movement(Movement::Script("3".into())),
                CellAddress::new("S", 0, 2).with_movement(Movement::Script("abs".into())),
                CellAddress::new("S", 1, 0).with_movement(Movement::Script("fail".into())),
            ],
        )]);
        let next = advance_mapping(&m, &wb, &FixedEvaluator);
        let cells: Vec<(u32, u32)> = next["a"].iter().map(|a| (a.row, a.col)).collect();
        assert_eq!(cells, vec![(3, 1), (2, 2), (1, 0)]);
    }

    #[test]
    fn test_follower_of_dropped_leader_is_dropped() {
        let wb = grid(1, 2);
        let m = mapping_of(vec![
            (
                "leader",
                vec![CellAddress::new("S", 0, 0).with_movement(offset(1, 0, false))],
            ),
            (
                "follower",
                vec![CellAddress::new("S", 0, 1).with_movement(Movement::follow("leader", 0))],
            ),
        ]);
        assert!(advance_mapping(&m, &wb, &FixedEvaluator).is_empty());
    }

    #[test]
    fn test_follow_chain_degrades_to_drop() {
        let wb = grid(3, 3);
        let m = mapping_of(vec![
            (
                "leader",
                vec![CellAddress::new("S", 0, 0).with_movement(offset(1, 0, false))],
            ),
            (
                "middle",
                vec![CellAddress::new("S", 0, 1).with_movement(Movement::follow("leader", 0))],
            ),
            (
                "tail",
                vec![CellAddress::new("S", 0, 2).with_movement(Movement::follow("middle", 0))],
            ),
            (
                "self",
                vec![CellAddress::new("S", 1, 2).with_movement(Movement::follow("self", 0))],
            ),
        ]);
        let next = advance_mapping(&m, &wb, &FixedEvaluator);
        assert_eq!(next.keys().collect::<Vec<_>>(), vec!["leader", "middle"]);
        assert_eq!((next["middle"][0].row, next["middle"][0].col), (1, 1));
    }

    #[test]
    fn test_jump_search_factor_limits_steps() {
        let mut rows = vec![vec![CellValue::Empty]; 10];
        rows[9][0] = text("end");
        let wb = WorkbookState::single_sheet("S", rows);
        let m = mapping_of(vec![(
            "a",
            vec![CellAddress::new("S", 0, 0).with_movement(offset(1, 0, true))],
        )]);
        assert_eq!(advance_mapping(&m, &wb, &FixedEvaluator)["a"][0].row, 9);

        // budget is max(1, 10 * 0) = 1 step
        let engine = MovementEngine::new(&wb, &FixedEvaluator).with_jump_search_factor(0);
        assert!(engine.advance(&m).is_empty());
    }
}
