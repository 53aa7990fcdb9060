//! Range vertex registry (spec §4, L3). Keeps one `Range` vertex per
//! distinct `CellRange` a formula actually references, and chains a new
//! range onto the largest already-materialized sub-range it fully
//! contains so growing a range (`SUM(A1:A5)` then `SUM(A1:A10)`) adds
//! edges proportional to the delta, not to the whole new span.

use rustc_hash::FxHashMap;

use gridcore_common::{CellAddress, CellRange};

use crate::engine::graph::DependencyGraph;
use crate::engine::vertex::{VertexId, VertexKind};

#[derive(Default)]
pub struct RangeMapping {
    ranges: FxHashMap<CellRange, VertexId>,
}

impl RangeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn existing(&self, range: &CellRange) -> Option<VertexId> {
        self.ranges.get(range).copied()
    }

    /// Returns the vertex for `range`, creating it (and wiring its
    /// dependency edges) if this is the first time it has been requested.
    /// `cell_at` resolves an individual address to its vertex id,
    /// materializing an `EmptyCell` if nothing has been written there yet.
    pub fn get_or_create(
        &mut self,
        range: CellRange,
        max_rows: u32,
        max_cols: u32,
        graph: &mut DependencyGraph,
        mut cell_at: impl FnMut(&mut DependencyGraph, CellAddress) -> VertexId,
    ) -> VertexId {
        if let Some(&id) = self.ranges.get(&range) {
            return id;
        }

        let chained = self.find_chainable_subrange(&range);
        let vertex = graph.insert(None, VertexKind::Range { range });

        let (sr, sc, er, ec) = range.resolved(max_rows, max_cols);
        if let Some((sub_id, sub_range)) = chained {
            graph.add_edge(vertex, sub_id);
            let (ssr, ssc, ser, sec) = sub_range.resolved(max_rows, max_cols);
            for row in sr..=er {
                for col in sc..=ec {
                    if row >= ssr && row <= ser && col >= ssc && col <= sec {
                        continue;
                    }
                    let cell_id = cell_at(graph, CellAddress::new(range.sheet, row, col));
                    graph.add_edge(vertex, cell_id);
                }
            }
        } else {
            for row in sr..=er {
                for col in sc..=ec {
                    let cell_id = cell_at(graph, CellAddress::new(range.sheet, row, col));
                    graph.add_edge(vertex, cell_id);
                }
            }
        }

        self.ranges.insert(range, vertex);
        vertex
    }

    /// Finds the largest already-materialized range strictly contained in
    /// `range`, restricted to the common "grow in one direction" shape: a
    /// shared start point with the same column span (row growth) or the
    /// same row span (column growth). General rectangle subtraction for
    /// arbitrary overlaps is not attempted.
    fn find_chainable_subrange(&self, range: &CellRange) -> Option<(VertexId, CellRange)> {
        let mut best: Option<(VertexId, CellRange, u64)> = None;
        for (existing, &id) in &self.ranges {
            if existing.sheet != range.sheet || existing == range {
                continue;
            }
            if !range.contains_range(existing) {
                continue;
            }
            let same_cols = existing.start_col == range.start_col && existing.end_col == range.end_col;
            let same_rows = existing.start_row == range.start_row && existing.end_row == range.end_row;
            if !same_cols && !same_rows {
                continue;
            }
            let area = existing.area(u32::MAX / 2, u32::MAX / 2);
            if best.as_ref().map(|(_, _, a)| area > *a).unwrap_or(true) {
                best = Some((id, *existing, area));
            }
        }
        best.map(|(id, r, _)| (id, r))
    }

    pub fn remove(&mut self, range: &CellRange) -> Option<VertexId> {
        self.ranges.remove(range)
    }
}
