//! Utilities for converting between A1-style references and 0-based indices.

use serde::{Deserialize, Serialize};

/// A 0-based `(row, col)` position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub row: u32,
    pub col: u32,
}

/// A normalized rectangular range (`start` is the top-left corner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellPos,
    pub end: CellPos,
}

/// Convert a 0-based column index to letters: 0 → "A", 25 → "Z", 26 → "AA".
pub fn col_to_letters(col: u32) -> String {
    let mut letters = Vec::new();
    let mut c = u64::from(col) + 1;
    while c > 0 {
        let rem = (c - 1) % 26;
        // rem < 26 so this always fits in a byte
        letters.push(b'A' + u8::try_from(rem).unwrap_or(0));
        c = (c - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert column letters (case-insensitive) to a 0-based index.
///
/// Returns `None` for empty input, non-letters, or overflow.
pub fn letters_to_col(letters: &str) -> Option<u32> {
    let s = letters.trim();
    if s.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for b in s.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(b.to_ascii_uppercase() - b'A') + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col - 1)
}

/// Parse a cell reference like "B10" into a 0-based position.
///
/// `$` anchors are ignored. Row 0 ("A0") is rejected.
pub fn parse_a1_cell(a1: &str) -> Option<CellPos> {
    let s = a1.trim();
    let split = s
        .bytes()
        .position(|b| b.is_ascii_digit())
        .filter(|&idx| idx > 0)?;
    let (letters, digits) = s.split_at(split);
    let letters = letters.trim_start_matches('$').trim_end_matches('$');
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let col = letters_to_col(letters)?;
    let row = digits.parse::<u32>().ok()?.checked_sub(1)?;
    Some(CellPos { row, col })
}

/// Format a 0-based position as "A1".
pub fn format_a1_cell(row: u32, col: u32) -> String {
    format!("{}{}", col_to_letters(col), u64::from(row) + 1)
}

/// Parse "A1:B10" (or a single "A1") into a normalized range.
pub fn parse_a1_range(range: &str) -> Option<CellRange> {
    let (start, end) = match range.split_once(':') {
        Some((start, end)) => (parse_a1_cell(start)?, parse_a1_cell(end)?),
        None => {
            let pos = parse_a1_cell(range)?;
            (pos, pos)
        }
    };
    Some(CellRange {
        start: CellPos {
            row: start.row.min(end.row),
            col: start.col.min(end.col),
        },
        end: CellPos {
            row: start.row.max(end.row),
            col: start.col.max(end.col),
        },
    })
}

/// Format a range as "A1:B10".
pub fn format_a1_range(range: &CellRange) -> String {
    format!(
        "{}:{}",
        format_a1_cell(range.start.row, range.start.col),
        format_a1_cell(range.end.row, range.end.col)
    )
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
    use test_case::test_case;

    #[test_case(0, "A")]
    #[test_case(25, "Z")]
    #[test_case(26, "AA")]
    #[test_case(51, "AZ")]
    #[test_case(52, "BA")]
    #[test_case(701, "ZZ")]
    #[test_case(702, "AAA")]
    fn test_col_to_letters(col: u32, expected: &str) {
        assert_eq!(col_to_letters(col), expected);
        assert_eq!(letters_to_col(expected), Some(col));
    }

    #[test]
    fn test_letters_to_col_rejects_garbage() {
        assert_eq!(letters_to_col(""), None);
        assert_eq!(letters_to_col("A1"), None);
        assert_eq!(letters_to_col("a"), Some(0));
    }

    #[test]
    fn test_parse_a1_cell() {
        assert_eq!(parse_a1_cell("A1"), Some(CellPos { row: 0, col: 0 }));
        assert_eq!(parse_a1_cell(" b10 "), Some(CellPos { row: 9, col: 1 }));
        assert_eq!(parse_a1_cell("$C$3"), Some(CellPos { row: 2, col: 2 }));
        assert_eq!(parse_a1_cell("A0"), None);
        assert_eq!(parse_a1_cell("10"), None);
        assert_eq!(parse_a1_cell("A1B"), None);
    }

    #[test]
    fn test_format_a1_cell() {
        assert_eq!(format_a1_cell(0, 0), "A1");
        assert_eq!(format_a1_cell(9, 27), "AB10");
    }

    #[test]
    fn test_range_is_normalized() {
        let range = parse_a1_range("C5:A1").unwrap();
        assert_eq!(range.start, CellPos { row: 0, col: 0 });
        assert_eq!(range.end, CellPos { row: 4, col: 2 });
        assert_eq!(format_a1_range(&range), "A1:C5");

        let single = parse_a1_range("B2").unwrap();
        assert_eq!(single.start, single.end);
    }
}
