use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{Result, XlmapError};

/// A single parsed cell value.
///
/// Workbook parsing happens upstream; cells arrive as plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    #[default]
    Empty,
}

impl CellValue {
    /// Empty cells are `null` or the empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Number(_) | Self::Boolean(_) => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Empty => Ok(()),
        }
    }
}

/// Corner of a merge range, 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCorner {
    pub r: u32,
    pub c: u32,
}

/// Merged range `s..=e` (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRange {
    pub s: MergeCorner,
    pub e: MergeCorner,
}

impl MergeRange {
    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.s.r && row <= self.e.r && col >= self.s.c && col <= self.e.c
    }

    /// Every covered cell inside `grid` except the top-left. The range is
    /// clipped to the grid first, so oversized merges cost no more than the
    /// cells that exist.
    fn shadow_cells<'a>(&'a self, grid: &'a Grid) -> impl Iterator<Item = (u32, u32)> + 'a {
        let rows = u32::try_from(grid.len()).unwrap_or(u32::MAX);
        (self.s.r..self.e.r.saturating_add(1).min(rows)).flat_map(move |r| {
            let width = usize::try_from(r)
                .ok()
                .and_then(|r| grid.get(r))
                .map_or(0, |cells| u32::try_from(cells.len()).unwrap_or(u32::MAX));
            (self.s.c..self.e.c.saturating_add(1).min(width))
                .map(move |c| (r, c))
                .filter(move |&(r, c)| r != self.s.r || c != self.s.c)
        })
    }
}

/// Worksheet rows of cells.
pub type Grid = Vec<Vec<CellValue>>;

/// A parsed workbook as handed over by the file loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookState {
    pub sheets: Vec<String>,
    pub active_sheet: String,
    data: HashMap<String, Grid>,
    #[serde(default)]
    merges: HashMap<String, Vec<MergeRange>>,
    /// Shadow cells per sheet, built on first use (not serialized).
    #[serde(skip)]
    shadow_index: OnceCell<HashMap<String, HashSet<(u32, u32)>>>,
}

impl PartialEq for WorkbookState {
    fn eq(&self, other: &Self) -> bool {
        self.sheets == other.sheets
            && self.active_sheet == other.active_sheet
            && self.data == other.data
            && self.merges == other.merges
    }
}

impl WorkbookState {
    /// Build a workbook, checking that the active sheet exists.
    pub fn new(
        sheets: Vec<String>,
        active_sheet: impl Into<String>,
        data: HashMap<String, Grid>,
        merges: HashMap<String, Vec<MergeRange>>,
    ) -> Result<Self> {
        let workbook = Self {
            sheets,
            active_sheet: active_sheet.into(),
            data,
            merges,
            shadow_index: OnceCell::new(),
        };
        workbook.validate()?;
        Ok(workbook)
    }

    /// Single-sheet workbook without merges.
    pub fn single_sheet(name: impl Into<String>, grid: Grid) -> Self {
        let name = name.into();
        let mut data = HashMap::new();
        data.insert(name.clone(), grid);
        Self {
            sheets: vec![name.clone()],
            active_sheet: name,
            data,
            merges: HashMap::new(),
            shadow_index: OnceCell::new(),
        }
    }

    /// Replace the merge ranges of one sheet.
    pub fn with_merges(mut self, sheet: impl Into<String>, ranges: Vec<MergeRange>) -> Self {
        self.merges.insert(sheet.into(), ranges);
        self.shadow_index = OnceCell::new();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sheets.iter().any(|s| s == &self.active_sheet) {
            return Err(XlmapError::InvalidWorkbook(format!(
                "active sheet {:?} is not one of the workbook sheets",
                self.active_sheet
            )));
        }
        Ok(())
    }

    pub fn grid(&self, sheet: &str) -> Option<&Grid> {
        self.data.get(sheet)
    }

    /// Merge ranges of `sheet`; change them only through [`Self::with_merges`].
    pub fn merges(&self, sheet: &str) -> &[MergeRange] {
        self.merges.get(sheet).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of rows in `sheet` (0 for unknown sheets).
    pub fn row_count(&self, sheet: &str) -> usize {
        self.grid(sheet).map_or(0, Vec::len)
    }

    /// Number of columns in one row (rows may be ragged).
    pub fn col_count(&self, sheet: &str, row: u32) -> usize {
        self.grid(sheet)
            .and_then(|g| g.get(usize::try_from(row).ok()?))
            .map_or(0, Vec::len)
    }

    pub fn contains(&self, sheet: &str, row: u32, col: u32) -> bool {
        usize::try_from(col).is_ok_and(|c| c < self.col_count(sheet, row))
    }

    /// Bounds-check a signed candidate position, returning it unsigned when it
    /// lies inside the grid.
    pub fn checked_cell(&self, sheet: &str, row: i64, col: i64) -> Option<(u32, u32)> {
        let row = u32::try_from(row).ok()?;
        let col = u32::try_from(col).ok()?;
        self.contains(sheet, row, col).then_some((row, col))
    }

    pub fn value(&self, sheet: &str, row: u32, col: u32) -> Option<&CellValue> {
        self.grid(sheet)?
            .get(usize::try_from(row).ok()?)?
            .get(usize::try_from(col).ok()?)
    }

    /// Value at a cell, reading through to the top-left of its merge range
    /// when the cell itself is an empty shadow cell.
    pub fn resolved_value(&self, sheet: &str, row: u32, col: u32) -> Option<&CellValue> {
        let value = self.value(sheet, row, col);
        if value.is_some_and(|v| !v.is_empty()) || !self.is_shadow(sheet, row, col) {
            return value;
        }
        self.merges(sheet)
            .iter()
            .find(|m| m.contains(row, col))
            .and_then(|m| self.value(sheet, m.s.r, m.s.c))
            .or(value)
    }

    pub fn is_empty_cell(&self, sheet: &str, row: u32, col: u32) -> bool {
        self.value(sheet, row, col).map_or(true, CellValue::is_empty)
    }

    /// Whether `(row, col)` is covered by a merge range but is not its top-left.
    pub fn is_shadow(&self, sheet: &str, row: u32, col: u32) -> bool {
        self.shadow_index()
            .get(sheet)
            .is_some_and(|cells| cells.contains(&(row, col)))
    }

    fn shadow_index(&self) -> &HashMap<String, HashSet<(u32, u32)>> {
        self.shadow_index.get_or_init(|| {
            self.merges
                .iter()
                .filter_map(|(sheet, ranges)| {
                    let grid = self.data.get(sheet)?;
                    let cells = ranges.iter().flat_map(|m| m.shadow_cells(grid)).collect();
                    Some((sheet.clone(), cells))
                })
                .collect()
        })
    }
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
    use serde_json::json;

    fn merged_workbook() -> WorkbookState {
        serde_json::from_value(json!({
            "sheets": ["S"],
            "activeSheet": "S",
            "data": {"S": [["Head", "Head", "x"], ["Head", "Head", ""], [null, 3, true]]},
            "merges": {"S": [{"s": {"r": 0, "c": 0}, "e": {"r": 1, "c": 1}}]}
        }))
        .unwrap()
    }

    #[test]
    fn test_shadow_cells_exclude_top_left() {
        let wb = merged_workbook();
        assert!(!wb.is_shadow("S", 0, 0));
        assert!(wb.is_shadow("S", 0, 1));
        assert!(wb.is_shadow("S", 1, 0));
        assert!(wb.is_shadow("S", 1, 1));
        assert!(!wb.is_shadow("S", 0, 2));
        assert!(!wb.is_shadow("Other", 0, 1));
    }

    #[test]
    fn test_bounds_follow_ragged_rows() {
        let mut wb = merged_workbook();
        wb.data.insert("S".into(), vec![vec![CellValue::Empty; 3], vec![CellValue::Empty]]);
        assert!(wb.contains("S", 0, 2));
        assert!(!wb.contains("S", 1, 1));
        assert!(!wb.contains("S", 2, 0));
        assert_eq!(wb.checked_cell("S", -1, 0), None);
        assert_eq!(wb.checked_cell("S", 0, 2), Some((0, 2)));
    }

    #[test]
    fn test_cell_values_and_display() {
        let wb = merged_workbook();
        assert!(wb.is_empty_cell("S", 2, 0));
        assert!(wb.is_empty_cell("S", 1, 2));
        assert_eq!(wb.value("S", 2, 1).unwrap().to_string(), "3");
        assert_eq!(wb.value("S", 2, 2).unwrap().to_string(), "true");
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
    }

    #[test]
    fn test_resolved_value_reads_through_empty_shadow() {
        let mut wb = merged_workbook();
        wb.data.get_mut("S").unwrap()[1][1] = CellValue::Empty;
        assert_eq!(
            wb.resolved_value("S", 1, 1),
            Some(&CellValue::Text("Head".into()))
        );
    }

    #[test]
    fn test_oversized_merge_is_clipped_to_grid() {
        let wb = WorkbookState::single_sheet("S", vec![vec![CellValue::Empty; 2]; 3]).with_merges(
            "S",
            vec![MergeRange {
                s: MergeCorner { r: 0, c: 0 },
                e: MergeCorner { r: 1_048_575, c: 16_383 },
            }],
        );
        assert!(wb.is_shadow("S", 2, 1));
        assert!(!wb.is_shadow("S", 0, 0));
        assert_eq!(wb.shadow_index()["S"].len(), 5);
        assert_eq!(wb.merges("S").len(), 1);
        assert!(wb.merges("Other").is_empty());
    }

    #[test]
    fn test_with_merges_rebuilds_shadow_index() {
        let wb = merged_workbook();
        assert!(wb.is_shadow("S", 1, 1));
        let wb = wb.with_merges(
            "S",
            vec![MergeRange {
                s: MergeCorner { r: 1, c: 1 },
                e: MergeCorner { r: 2, c: 2 },
            }],
        );
        assert!(!wb.is_shadow("S", 0, 1));
        assert!(!wb.is_shadow("S", 1, 1));
        assert!(wb.is_shadow("S", 2, 2));
    }

    #[test]
    fn test_new_rejects_unknown_active_sheet() {
        let err = WorkbookState::new(vec!["A".into()], "B", HashMap::new(), HashMap::new());
        assert!(err.is_err());
    }
}
