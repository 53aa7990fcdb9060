//! Per-sheet address-to-vertex mapping (spec §4, L1). A sheet picks dense
//! or sparse storage once, at creation time, based on its declared extent:
//! small/bounded sheets get a flat row-major `Vec`, everything else gets a
//! hash map keyed by `(row, col)`. The choice never changes afterward,
//! since `rebuild_with_config` is the only supported way to alter it.

use rustc_hash::FxHashMap;

use crate::engine::vertex::VertexId;

/// Above this many addressable cells a sheet defaults to sparse storage;
/// a fully dense `Vec<Option<VertexId>>` for a million-row sheet would
/// burn memory on cells that are overwhelmingly empty in practice.
const DENSE_CELL_LIMIT: u64 = 4_000_000;

pub enum AddressMapping {
    Dense {
        rows: u32,
        cols: u32,
        cells: Vec<Option<VertexId>>,
    },
    Sparse {
        cells: FxHashMap<(u32, u32), VertexId>,
    },
}

impl AddressMapping {
    pub fn choose(rows: u32, cols: u32) -> Self {
        let area = rows as u64 * cols as u64;
        if area <= DENSE_CELL_LIMIT {
            AddressMapping::Dense {
                rows,
                cols,
                cells: vec![None; area as usize],
            }
        } else {
            AddressMapping::Sparse {
                cells: FxHashMap::default(),
            }
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, AddressMapping::Dense { .. })
    }

    pub fn get(&self, row: u32, col: u32) -> Option<VertexId> {
        match self {
            AddressMapping::Dense { rows, cols, cells } => {
                if row >= *rows || col >= *cols {
                    return None;
                }
                cells[(row as u64 * *cols as u64 + col as u64) as usize]
            }
            AddressMapping::Sparse { cells } => cells.get(&(row, col)).copied(),
        }
    }

    pub fn set(&mut self, row: u32, col: u32, id: VertexId) {
        match self {
            AddressMapping::Dense { rows, cols, cells } => {
                if row >= *rows || col >= *cols {
                    return;
                }
                cells[(row as u64 * *cols as u64 + col as u64) as usize] = Some(id);
            }
            AddressMapping::Sparse { cells } => {
                cells.insert((row, col), id);
            }
        }
    }

    pub fn remove(&mut self, row: u32, col: u32) {
        match self {
            AddressMapping::Dense { rows, cols, cells } => {
                if row >= *rows || col >= *cols {
                    return;
                }
                cells[(row as u64 * *cols as u64 + col as u64) as usize] = None;
            }
            AddressMapping::Sparse { cells } => {
                cells.remove(&(row, col));
            }
        }
    }

    /// Rows in `col` whose occupying vertex satisfies `predicate`, in row
    /// order. A thin secondary index rather than a real interval tree:
    /// sparse sheets scan their hash map, dense sheets scan the column's
    /// stride directly, but neither keeps a standing structure to maintain.
    pub fn find_in_column(&self, col: u32, mut predicate: impl FnMut(VertexId) -> bool) -> Vec<u32> {
        match self {
            AddressMapping::Dense { rows, cols, cells } => {
                if col >= *cols {
                    return Vec::new();
                }
                (0..*rows)
                    .filter(|&row| {
                        cells[(row as u64 * *cols as u64 + col as u64) as usize]
                            .map(&mut predicate)
                            .unwrap_or(false)
                    })
                    .collect()
            }
            AddressMapping::Sparse { cells } => {
                let mut rows: Vec<u32> = cells
                    .iter()
                    .filter(|(&(_, c), _)| c == col)
                    .filter(|(_, &id)| predicate(id))
                    .map(|(&(r, _), _)| r)
                    .collect();
                rows.sort_unstable();
                rows
            }
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = (u32, u32, VertexId)> + '_> {
        match self {
            AddressMapping::Dense { cols, cells, .. } => {
                let cols = *cols;
                Box::new(cells.iter().enumerate().filter_map(move |(i, slot)| {
                    slot.map(|id| ((i as u32) / cols, (i as u32) % cols, id))
                }))
            }
            AddressMapping::Sparse { cells } => {
                Box::new(cells.iter().map(|(&(r, c), &id)| (r, c, id)))
            }
        }
    }

    /// Shifts every occupied address at or beyond `at` by `count` rows.
    /// Used by `insert_rows`/`remove_rows`; entries that land outside the
    /// sheet's configured extent (or, on removal, fall inside the deleted
    /// band) are dropped by the caller before this is invoked.
    pub fn shift_rows(&mut self, at: u32, delta: i64) {
        match self {
            AddressMapping::Dense { rows, cols, cells } => {
                let mut next = vec![None; *rows as usize * *cols as usize];
                for (i, slot) in cells.iter().enumerate() {
                    if let Some(id) = slot {
                        let row = (i as u32) / *cols;
                        let col = (i as u32) % *cols;
                        if let Some(new_row) = shifted_index(row, at, delta, *rows) {
                            next[(new_row as u64 * *cols as u64 + col as u64) as usize] = Some(*id);
                        }
                    }
                }
                *cells = next;
            }
            AddressMapping::Sparse { cells } => {
                let old = std::mem::take(cells);
                for ((row, col), id) in old {
                    if let Some(new_row) = shifted_index(row, at, delta, u32::MAX) {
                        cells.insert((new_row, col), id);
                    }
                }
            }
        }
    }

    pub fn shift_cols(&mut self, at: u32, delta: i64) {
        match self {
            AddressMapping::Dense { rows, cols, cells } => {
                let mut next = vec![None; *rows as usize * *cols as usize];
                for (i, slot) in cells.iter().enumerate() {
                    if let Some(id) = slot {
                        let row = (i as u32) / *cols;
                        let col = (i as u32) % *cols;
                        if let Some(new_col) = shifted_index(col, at, delta, *cols) {
                            next[(row as u64 * *cols as u64 + new_col as u64) as usize] = Some(*id);
                        }
                    }
                }
                *cells = next;
            }
            AddressMapping::Sparse { cells } => {
                let old = std::mem::take(cells);
                for ((row, col), id) in old {
                    if let Some(new_col) = shifted_index(col, at, delta, u32::MAX) {
                        cells.insert((row, new_col), id);
                    }
                }
            }
        }
    }
}

fn shifted_index(index: u32, at: u32, delta: i64, limit: u32) -> Option<u32> {
    if delta >= 0 {
        if index >= at {
            let shifted = index as i64 + delta;
            if shifted >= limit as i64 {
                return None;
            }
            Some(shifted as u32)
        } else {
            Some(index)
        }
    } else {
        let count = (-delta) as u32;
        if index >= at && index < at + count {
            None
        } else if index >= at + count {
            Some(index - count)
        } else {
            Some(index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_roundtrip() {
        let mut m = AddressMapping::choose(10, 10);
        assert!(m.is_dense());
        let id = VertexId { index: 3, generation: 0 };
        m.set(2, 4, id);
        assert_eq!(m.get(2, 4), Some(id));
        m.remove(2, 4);
        assert_eq!(m.get(2, 4), None);
    }

    #[test]
    fn large_sheet_chooses_sparse() {
        let m = AddressMapping::choose(1_048_576, 16_384);
        assert!(!m.is_dense());
    }

    #[test]
    fn find_in_column_scans_dense_and_sparse() {
        let mut dense = AddressMapping::choose(10, 10);
        let wanted = VertexId { index: 1, generation: 0 };
        let other = VertexId { index: 2, generation: 0 };
        dense.set(1, 3, wanted);
        dense.set(4, 3, other);
        dense.set(1, 5, wanted);
        assert_eq!(dense.find_in_column(3, |id| id == wanted), vec![1]);

        let mut sparse = AddressMapping::Sparse { cells: FxHashMap::default() };
        sparse.set(7, 2, wanted);
        sparse.set(1, 2, wanted);
        sparse.set(1, 9, wanted);
        assert_eq!(sparse.find_in_column(2, |id| id == wanted), vec![1, 7]);
    }

    #[test]
    fn shift_rows_moves_survivor_down_past_deleted_band() {
        let mut m = AddressMapping::choose(10, 1);
        let id = VertexId { index: 0, generation: 0 };
        m.set(5, 0, id);
        m.shift_rows(2, -3);
        assert_eq!(m.get(5, 0), None);
        assert_eq!(m.get(2, 0), Some(id));
    }

    #[test]
    fn shift_rows_drops_entry_inside_deleted_band() {
        let mut m = AddressMapping::choose(10, 1);
        let id = VertexId { index: 0, generation: 0 };
        m.set(3, 0, id);
        m.shift_rows(2, -3);
        assert_eq!(m.get(3, 0), None);
    }
}
