//! The engine core: owns every L-series component and the glue between
//! them. `gridcore-engine` exposes this module's `Engine` as its main
//! type; the `gridcore` facade crate wraps it with the friendlier
//! `EngineState` surface callers actually construct.

pub mod address_mapping;
pub mod cycle_detector;
pub mod evaluator;
pub mod graph;
pub mod graph_builder;
pub mod lazy_ast;
pub mod named_expression_store;
pub mod operations;
pub mod range_mapping;
pub mod sheet_mapping;
pub mod vertex;

use gridcore_common::{CellAddress, CellRange, ErrorKind, SheetId};
use gridcore_parse::ReferenceType;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::interpreter::functions::FunctionRegistry;
use crate::stats::StatsRecorder;

use self::graph::DependencyGraph;
use self::lazy_ast::LazyAstTransformService;
use self::named_expression_store::NamedExpressionStore;
use self::range_mapping::RangeMapping;
use self::sheet_mapping::SheetMapping;
use self::vertex::{VertexId, VertexKind};

pub struct Engine {
    pub config: EngineConfig,
    pub sheets: SheetMapping,
    pub graph: DependencyGraph,
    pub ranges: RangeMapping,
    pub names: NamedExpressionStore,
    pub lazy_ast: LazyAstTransformService,
    pub functions: FunctionRegistry,
    pub stats: StatsRecorder,
    pub rng: SmallRng,
    /// Fixed instant `NOW()`/`TODAY()` resolve to; days since `EngineConfig::null_date`.
    /// Deterministic by default so evaluation passes are reproducible;
    /// `set_clock` overrides it for callers that want wall-clock behavior.
    clock: f64,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let stats = StatsRecorder::new(config.use_stats);
        Engine {
            sheets: SheetMapping::new(),
            graph: DependencyGraph::new(),
            ranges: RangeMapping::new(),
            names: NamedExpressionStore::new(),
            lazy_ast: LazyAstTransformService::new(),
            functions: FunctionRegistry::with_builtins(),
            stats,
            rng: SmallRng::seed_from_u64(0x67_72_69_64), // "grid" — fixed for reproducible RAND()
            clock: 0.0,
            config,
        }
    }

    pub fn set_clock(&mut self, days_since_null_date: f64) {
        self.clock = days_since_null_date;
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn resolve_sheet(&self, name: &str) -> Option<SheetId> {
        self.sheets.id_of(name)
    }

    pub fn require_sheet(&self, name: &str) -> EngineResult<SheetId> {
        self.resolve_sheet(name)
            .ok_or_else(|| EngineError::InvalidSheet(name.to_string()))
    }

    /// Returns the vertex at `addr`, materializing an `EmptyCell` there if
    /// nothing has been written yet (spec §3: every addressable cell has a
    /// vertex once referenced, even if never assigned).
    pub fn cell_vertex(&mut self, addr: CellAddress) -> VertexId {
        let existing = self
            .sheets
            .entry(addr.sheet)
            .and_then(|e| e.mapping.get(addr.row, addr.col));
        if let Some(id) = existing {
            return id;
        }
        let id = self.graph.insert(Some(addr), VertexKind::EmptyCell);
        if let Some(entry) = self.sheets.entry_mut(addr.sheet) {
            entry.mapping.set(addr.row, addr.col, id);
        }
        id
    }

    /// Tears down `id`'s outgoing dependency edges and collects any Range
    /// vertex among them that's left with no remaining dependents (spec §4,
    /// "Range vertices are garbage-collected when their last consuming
    /// edge is removed"). Used wherever a formula's references are rebuilt.
    pub fn clear_dependencies_gc(&mut self, id: VertexId) {
        let deps = self.graph.get(id).map(|v| v.dependencies.clone()).unwrap_or_default();
        self.graph.clear_dependencies(id);
        for d in deps {
            self.gc_range_if_orphaned(d);
        }
    }

    fn gc_range_if_orphaned(&mut self, id: VertexId) {
        let range = match self.graph.get(id) {
            Some(v) => match v.kind {
                VertexKind::Range { range } if v.dependents.is_empty() => range,
                _ => return,
            },
            None => return,
        };
        self.ranges.remove(&range);
        let sub_deps = self.graph.get(id).map(|v| v.dependencies.clone()).unwrap_or_default();
        self.graph.remove(id);
        for d in sub_deps {
            self.gc_range_if_orphaned(d);
        }
    }

    pub fn range_vertex(&mut self, range: CellRange) -> VertexId {
        let (max_rows, max_cols) = self
            .sheets
            .entry(range.sheet)
            .map(|e| (e.max_rows, e.max_cols))
            .unwrap_or((self.config.max_rows, self.config.max_columns));
        let mut graph = std::mem::replace(&mut self.graph, DependencyGraph::new());
        let mut sheets = std::mem::take(&mut self.sheets);
        let id = self.ranges.get_or_create(range, max_rows, max_cols, &mut graph, |g, addr| {
            let existing = sheets.entry(addr.sheet).and_then(|e| e.mapping.get(addr.row, addr.col));
            if let Some(id) = existing {
                return id;
            }
            let id = g.insert(Some(addr), VertexKind::EmptyCell);
            if let Some(entry) = sheets.entry_mut(addr.sheet) {
                entry.mapping.set(addr.row, addr.col, id);
            }
            id
        });
        self.graph = graph;
        self.sheets = sheets;
        id
    }

    /// Resolves every reference collected off a parsed AST to a vertex and
    /// wires `dependent -> resolved` edges. Used both when a formula is
    /// first built and when it is replaced in place.
    /// Wires `dependent -> target` edges for every reference in `refs`.
    /// A reference to a sheet that does not exist is skipped rather than
    /// treated as a build error: the interpreter re-resolves sheet names
    /// independently at evaluation time and reports `#REF!`/`#NAME?`
    /// there, so an edge is only ever a scheduling hint, never the source
    /// of truth for a formula's value.
    pub fn link_references(&mut self, dependent: VertexId, current_sheet: SheetId, refs: &[&ReferenceType]) {
        for r in refs {
            match r {
                ReferenceType::Cell { sheet, row, col } => {
                    let sheet_id = match sheet {
                        Some(name) => match self.resolve_sheet(name) {
                            Some(id) => id,
                            None => continue,
                        },
                        None => current_sheet,
                    };
                    let target = self.cell_vertex(CellAddress::new(sheet_id, *row, *col));
                    self.graph.add_edge(dependent, target);
                }
                ReferenceType::Range {
                    sheet,
                    start_row,
                    start_col,
                    end_row,
                    end_col,
                } => {
                    let sheet_id = match sheet {
                        Some(name) => match self.resolve_sheet(name) {
                            Some(id) => id,
                            None => continue,
                        },
                        None => current_sheet,
                    };
                    let target = self.range_vertex(CellRange {
                        sheet: sheet_id,
                        start_row: *start_row,
                        start_col: *start_col,
                        end_row: *end_row,
                        end_col: *end_col,
                    });
                    self.graph.add_edge(dependent, target);
                }
                ReferenceType::Named(name) => {
                    if let Some(target) = self.names.resolve(name, Some(current_sheet)) {
                        self.graph.add_edge(dependent, target);
                    }
                    // An undefined name is not a build-time error: it
                    // resolves to #NAME? when the formula actually runs.
                }
            }
        }
    }

    pub fn cell_value(&self, addr: CellAddress) -> gridcore_common::CellValue {
        self.sheets
            .entry(addr.sheet)
            .and_then(|e| e.mapping.get(addr.row, addr.col))
            .and_then(|id| self.graph.get(id))
            .map(|v| v.kind.value())
            .unwrap_or(gridcore_common::CellValue::Empty)
    }

    pub fn cell_error(&self, addr: CellAddress) -> Option<ErrorKind> {
        match self.cell_value(addr) {
            gridcore_common::CellValue::Error(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Rows in `col` whose cell currently evaluates to an error, used by
    /// embedders that want to surface a "jump to next error" navigation
    /// without scanning the whole column from the outside.
    pub fn rows_with_errors_in_column(&self, sheet: SheetId, col: u32) -> Vec<u32> {
        let Some(entry) = self.sheets.entry(sheet) else { return Vec::new() };
        entry.mapping.find_in_column(col, |id| {
            self.graph
                .get(id)
                .map(|v| v.kind.value().is_error())
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::graph_builder::{GraphBuilder, SheetInput};
    use crate::engine::operations::{Operations, UndoLog};
    use crate::engine::vertex::VertexKind;

    #[test]
    fn removing_last_consumer_of_a_range_collects_it() {
        let rows = vec![
            vec!["1".to_string(), "=SUM(A1:A1)".to_string()],
        ];
        let sheets = [SheetInput { name: "Sheet1", rows: &rows }];
        let mut engine = GraphBuilder::build(&sheets, EngineConfig::default()).unwrap();
        let sheet = engine.resolve_sheet("Sheet1").unwrap();
        let range = CellRange { sheet, start_row: Some(0), start_col: Some(0), end_row: Some(0), end_col: Some(0) };
        assert!(engine.ranges.existing(&range).is_some());

        let mut undo = UndoLog::default();
        Operations::set_cell_contents(&mut engine, &mut undo, CellAddress::new(sheet, 0, 1), "42").unwrap();
        assert!(engine.ranges.existing(&range).is_none());
    }

    #[test]
    fn array_cell_is_collected_with_its_sheet() {
        let rows = vec![vec!["=A1:A1".to_string()]];
        let sheets = [SheetInput { name: "Sheet1", rows: &rows }];
        let mut engine = GraphBuilder::build(&sheets, EngineConfig::default()).unwrap();
        let sheet = engine.resolve_sheet("Sheet1").unwrap();
        assert!(matches!(
            engine.sheets.entry(sheet).and_then(|e| e.mapping.get(0, 0)).and_then(|id| engine.graph.get(id)).map(|v| &v.kind),
            Some(VertexKind::ArrayCell { .. }) | Some(VertexKind::FormulaCell { .. })
        ));
    }
}
