//! Sheet-scoped coordinate types shared across the parser and engine
//! (spec §3, "Addresses").

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable sheet identifier assigned by `SheetMapping`.
pub type SheetId = u32;

/// `(sheetId, row, col)`, zero-based, per spec §3.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub sheet: SheetId,
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub const fn new(sheet: SheetId, row: u32, col: u32) -> Self {
        Self { sheet, row, col }
    }

    pub fn shifted(self, row_delta: i64, col_delta: i64) -> Option<Self> {
        let row = apply_delta(self.row, row_delta)?;
        let col = apply_delta(self.col, col_delta)?;
        Some(Self::new(self.sheet, row, col))
    }
}

fn apply_delta(v: u32, delta: i64) -> Option<u32> {
    let result = v as i64 + delta;
    if result < 0 {
        None
    } else {
        u32::try_from(result).ok()
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sheet{}!R{}C{}", self.sheet, self.row, self.col)
    }
}

/// A rectangular, inclusive range on a single sheet. `None` bounds model
/// open ranges (`A:A`, `1:1`); the caller substitutes a configured
/// `maxRows`/`maxColumns` fallback when it needs a concrete rectangle.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub sheet: SheetId,
    pub start_row: Option<u32>,
    pub start_col: Option<u32>,
    pub end_row: Option<u32>,
    pub end_col: Option<u32>,
}

impl CellRange {
    pub fn bounded(sheet: SheetId, start: CellAddress, end: CellAddress) -> Self {
        debug_assert_eq!(start.sheet, sheet);
        debug_assert_eq!(end.sheet, sheet);
        let (start_row, end_row) = order(start.row, end.row);
        let (start_col, end_col) = order(start.col, end.col);
        Self {
            sheet,
            start_row: Some(start_row),
            start_col: Some(start_col),
            end_row: Some(end_row),
            end_col: Some(end_col),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_row.is_none() || self.end_col.is_none()
    }

    /// Resolve open bounds against configured sheet limits, producing a
    /// concrete rectangle usable for materialization.
    pub fn resolved(&self, max_rows: u32, max_cols: u32) -> (u32, u32, u32, u32) {
        (
            self.start_row.unwrap_or(0),
            self.start_col.unwrap_or(0),
            self.end_row.unwrap_or(max_rows.saturating_sub(1)),
            self.end_col.unwrap_or(max_cols.saturating_sub(1)),
        )
    }

    /// Does this range's (possibly open) rectangle contain `addr`?
    pub fn contains(&self, addr: CellAddress) -> bool {
        if addr.sheet != self.sheet {
            return false;
        }
        let row_ok = self.start_row.map(|s| addr.row >= s).unwrap_or(true)
            && self.end_row.map(|e| addr.row <= e).unwrap_or(true);
        let col_ok = self.start_col.map(|s| addr.col >= s).unwrap_or(true)
            && self.end_col.map(|e| addr.col <= e).unwrap_or(true);
        row_ok && col_ok
    }

    /// Does `self` fully contain `other` (used for sub-range chaining)?
    pub fn contains_range(&self, other: &CellRange) -> bool {
        if self.sheet != other.sheet {
            return false;
        }
        let row_ok = bound_contains(self.start_row, other.start_row, false)
            && bound_contains(self.end_row, other.end_row, true);
        let col_ok = bound_contains(self.start_col, other.start_col, false)
            && bound_contains(self.end_col, other.end_col, true);
        row_ok && col_ok
    }

    /// Canonical rectangle area, used to pick the *smallest* containing
    /// range when chaining sub-ranges (spec §3, "Sub-range reuse").
    pub fn area(&self, max_rows: u32, max_cols: u32) -> u64 {
        let (sr, sc, er, ec) = self.resolved(max_rows, max_cols);
        (er - sr + 1) as u64 * (ec - sc + 1) as u64
    }
}

fn order(a: u32, b: u32) -> (u32, u32) {
    if a <= b { (a, b) } else { (b, a) }
}

fn bound_contains(outer: Option<u32>, inner: Option<u32>, is_upper: bool) -> bool {
    match (outer, inner) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(o), Some(i)) => {
            if is_upper {
                i <= o
            } else {
                i >= o
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_chaining_containment() {
        let outer = CellRange::bounded(0, CellAddress::new(0, 0, 0), CellAddress::new(0, 9, 0));
        let inner = CellRange::bounded(0, CellAddress::new(0, 0, 0), CellAddress::new(0, 4, 0));
        assert!(outer.contains_range(&inner));
        assert!(!inner.contains_range(&outer));
    }

    #[test]
    fn open_range_contains_any_row() {
        let col_a = CellRange {
            sheet: 0,
            start_row: None,
            start_col: Some(0),
            end_row: None,
            end_col: Some(0),
        };
        assert!(col_a.contains(CellAddress::new(0, 999_999, 0)));
        assert!(!col_a.contains(CellAddress::new(0, 0, 1)));
    }
}
