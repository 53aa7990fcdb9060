//! Evaluation pass driver (spec §4, L9). A pass walks the dirty/volatile
//! frontier forward to its closure, condenses the closure into SCCs,
//! orders them topologically, and evaluates each SCC under the acyclic
//! fast path or one of the two cycle policies (spec §5).

use std::time::Instant;

use rand::Rng;

use gridcore_common::{CellAddress, CellRange, CellValue, SheetId};

use crate::engine::cycle_detector;
use crate::engine::graph::DependencyGraph;
use crate::engine::named_expression_store::NamedExpressionStore;
use crate::engine::sheet_mapping::SheetMapping;
use crate::engine::vertex::{VertexId, VertexKind};
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::interpreter::{EvaluationContext, Interpreter};
use crate::stats::PassStats;

pub struct Evaluator;

impl Evaluator {
    /// Runs one evaluation pass to fixpoint over the current dirty and
    /// volatile frontier. Safe to call with an empty frontier (a no-op).
    pub fn run_pass(engine: &mut Engine) -> EngineResult<PassStats> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("evaluator_run_pass").entered();
        let start = Instant::now();
        let seeds: Vec<VertexId> = engine
            .graph
            .dirty_vertices()
            .chain(engine.graph.volatile_vertices())
            .collect();
        let frontier_size = seeds.len();
        let closure = engine.graph.forward_reachable(seeds);
        let closure_size = closure.len();

        let sccs = cycle_detector::strongly_connected_components(&engine.graph, &closure);
        let scc_count = sccs.len();
        let largest_scc = sccs.iter().map(|s| s.members.len()).max().unwrap_or(0);
        let ordered = cycle_detector::topological_order(&engine.graph, sccs);

        let mut cells_evaluated = 0usize;
        for scc in &ordered {
            if scc.is_cycle(&engine.graph) {
                if engine.config.allow_circular_references {
                    cells_evaluated += evaluate_cycle_tolerant(engine, &scc.members);
                } else {
                    evaluate_cycle_strict(engine, &scc.members);
                }
            } else {
                let id = scc.members[0];
                if evaluate_single(engine, id) {
                    cells_evaluated += 1;
                }
            }
        }

        let stats = PassStats {
            frontier_size,
            closure_size,
            scc_count,
            largest_scc,
            cells_evaluated,
            elapsed: start.elapsed(),
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(
            frontier_size,
            closure_size,
            scc_count,
            largest_scc,
            cells_evaluated,
            "evaluation pass complete"
        );
        engine.stats.record(stats);
        Ok(stats)
    }
}

/// Every member becomes `#CYCLE!`; this is the default policy (spec §5,
/// "strict mode") so a cycle never silently reports a stale or partial
/// value.
fn evaluate_cycle_strict(engine: &mut Engine, members: &[VertexId]) {
    for &id in members {
        let error = CellValue::Error(gridcore_common::CellError::new(gridcore_common::ErrorKind::Cycle));
        if let Some(v) = engine.graph.get_mut(id) {
            set_cached(&mut v.kind, error);
        }
        engine.graph.clear_dirty(id);
    }
}

/// Seeds every member from `initialComputedValues` (falling back to its
/// current cached value), then evaluates each once in creation order using
/// whatever sibling values are available at that point (spec §5, "tolerant
/// mode": seeded, single-pass, insertion-order — no iterative convergence).
fn evaluate_cycle_tolerant(engine: &mut Engine, members: &[VertexId]) -> usize {
    let mut ordered = members.to_vec();
    ordered.sort_by_key(|id| engine.graph.get(*id).map(|v| v.created_seq).unwrap_or(u64::MAX));

    for &id in &ordered {
        let seed = seed_value(engine, id);
        if let Some(v) = engine.graph.get_mut(id) {
            set_cached(&mut v.kind, seed);
        }
    }

    let mut evaluated = 0;
    for &id in &ordered {
        if evaluate_single(engine, id) {
            evaluated += 1;
        }
    }
    evaluated
}

/// A seed named in `initialComputedValues` for this vertex's address wins;
/// otherwise it keeps whatever it already had cached, defaulting to `0` for
/// a formula that has never evaluated and `Empty` for anything else.
fn seed_value(engine: &Engine, id: VertexId) -> CellValue {
    let Some(vertex) = engine.graph.get(id) else { return CellValue::Empty };
    if let Some(addr) = vertex.address {
        if let Some(name) = engine.sheets.name_of(addr.sheet) {
            if let Some(matrix) = engine.config.initial_computed_values.get(name) {
                if let Some(v) = matrix.get(addr.row as usize).and_then(|r| r.get(addr.col as usize)) {
                    return v.clone();
                }
            }
        }
    }
    let current = vertex.kind.value();
    if current == CellValue::Empty && vertex.kind.ast_id().is_some() {
        CellValue::Number(0.0)
    } else {
        current
    }
}

fn set_cached(kind: &mut VertexKind, value: CellValue) {
    match kind {
        VertexKind::FormulaCell { cached_value, .. } => *cached_value = value,
        VertexKind::ArrayCell { cached_values, .. } => *cached_values = vec![vec![value]],
        VertexKind::NamedExpression { cached_value, .. } => *cached_value = value,
        _ => {}
    }
}

/// Evaluates one non-cyclic vertex. Returns `false` for vertex kinds with
/// nothing to compute (plain values, ranges, empty cells) so pass stats
/// only count formulas actually run.
fn evaluate_single(engine: &mut Engine, id: VertexId) -> bool {
    let Some(vertex) = engine.graph.get(id) else { return false };
    let sheet = vertex.address.map(|a| a.sheet).unwrap_or(0);
    let Some(ast_id) = vertex.kind.ast_id() else {
        engine.graph.clear_dirty(id);
        return false;
    };
    let ast = engine.lazy_ast.materialize(ast_id, &engine.sheets).clone();

    // The AST may have just picked up rewritten references (a structural
    // transform since the last time this vertex was evaluated); rebuild
    // its dependency edges from the current tree before computing so
    // scheduling stays correct for later passes. Cheap: bounded by this
    // formula's own reference count, not the size of the workbook.
    engine.clear_dependencies_gc(id);
    let mut refs = Vec::new();
    ast.collect_references(&mut refs);
    engine.link_references(id, sheet, &refs);

    let (max_rows, max_cols) = engine
        .sheets
        .entry(sheet)
        .map(|e| (e.max_rows, e.max_cols))
        .unwrap_or((engine.config.max_rows, engine.config.max_columns));

    let result = {
        let mut ctx = GraphEvalContext {
            graph: &engine.graph,
            sheets: &engine.sheets,
            names: &engine.names,
            current_sheet: sheet,
            rng: &mut engine.rng,
            clock: engine.clock,
            max_rows,
            max_cols,
        };
        let interpreter = Interpreter::new(&engine.functions);
        interpreter.evaluate(&ast, &mut ctx)
    };

    if let Some(v) = engine.graph.get_mut(id) {
        set_cached(&mut v.kind, result);
    }
    engine.graph.clear_dirty(id);
    true
}

struct GraphEvalContext<'a> {
    graph: &'a DependencyGraph,
    sheets: &'a SheetMapping,
    names: &'a NamedExpressionStore,
    current_sheet: SheetId,
    rng: &'a mut rand::rngs::SmallRng,
    clock: f64,
    max_rows: u32,
    max_cols: u32,
}

impl<'a> GraphEvalContext<'a> {
    fn vertex_value(&self, sheet: SheetId, row: u32, col: u32) -> CellValue {
        self.sheets
            .entry(sheet)
            .and_then(|e| e.mapping.get(row, col))
            .and_then(|id| self.graph.get(id))
            .map(|v| v.kind.value())
            .unwrap_or(CellValue::Empty)
    }
}

impl<'a> EvaluationContext for GraphEvalContext<'a> {
    fn get_cell(&self, addr: CellAddress) -> CellValue {
        self.vertex_value(addr.sheet, addr.row, addr.col)
    }

    fn get_range(&self, range: CellRange) -> Vec<Vec<CellValue>> {
        let (max_rows, max_cols) = self
            .sheets
            .entry(range.sheet)
            .map(|e| (e.max_rows, e.max_cols))
            .unwrap_or((self.max_rows, self.max_cols));
        let (sr, sc, er, ec) = range.resolved(max_rows, max_cols);
        (sr..=er)
            .map(|row| (sc..=ec).map(|col| self.vertex_value(range.sheet, row, col)).collect())
            .collect()
    }

    fn get_named(&self, name: &str) -> Option<CellValue> {
        self.names
            .resolve(name, Some(self.current_sheet))
            .and_then(|id| self.graph.get(id))
            .map(|v| v.kind.value())
    }

    fn resolve_sheet(&self, name: &str) -> Option<SheetId> {
        self.sheets.id_of(name)
    }

    fn current_sheet(&self) -> SheetId {
        self.current_sheet
    }

    fn now(&mut self) -> f64 {
        self.clock
    }

    fn random(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::vertex::VertexKind;
    use gridcore_parse::parse;

    fn formula_vertex(engine: &mut Engine, sheet: SheetId, row: u32, col: u32, formula: &str) -> VertexId {
        let ast = parse(formula).unwrap();
        let ast_id = engine.lazy_ast.park(ast, sheet);
        let id = engine.graph.insert(
            Some(CellAddress::new(sheet, row, col)),
            VertexKind::FormulaCell {
                ast_id,
                cached_value: CellValue::Empty,
                dirty: true,
                volatile: false,
            },
        );
        if let Some(entry) = engine.sheets.entry_mut(sheet) {
            entry.mapping.set(row, col, id);
        }
        id
    }

    #[test]
    fn simple_arithmetic_chain_evaluates_in_one_pass() {
        let mut engine = Engine::new(EngineConfig::default());
        let sheet = engine.sheets.add_sheet("Sheet1", 100, 100).unwrap();
        let a1 = engine.graph.insert(
            Some(CellAddress::new(sheet, 0, 0)),
            VertexKind::ValueCell { value: CellValue::Number(2.0) },
        );
        engine.sheets.entry_mut(sheet).unwrap().mapping.set(0, 0, a1);
        let b1 = formula_vertex(&mut engine, sheet, 0, 1, "=A1*3");
        engine.graph.add_edge(b1, a1);
        Evaluator::run_pass(&mut engine).unwrap();
        assert_eq!(engine.cell_value(CellAddress::new(sheet, 0, 1)), CellValue::Number(6.0));
    }

    #[test]
    fn strict_self_reference_becomes_cycle_error() {
        let mut config = EngineConfig::default();
        config.allow_circular_references = false;
        let mut engine = Engine::new(config);
        let sheet = engine.sheets.add_sheet("Sheet1", 100, 100).unwrap();
        let a1 = formula_vertex(&mut engine, sheet, 0, 0, "=A1+1");
        engine.graph.add_edge(a1, a1);
        Evaluator::run_pass(&mut engine).unwrap();
        assert_eq!(
            engine.cell_error(CellAddress::new(sheet, 0, 0)),
            Some(gridcore_common::ErrorKind::Cycle)
        );
    }

    #[test]
    fn tolerant_self_reference_with_no_seed_defaults_to_zero() {
        let mut config = EngineConfig::default();
        config.allow_circular_references = true;
        let mut engine = Engine::new(config);
        let sheet = engine.sheets.add_sheet("Sheet1", 100, 100).unwrap();
        let a1 = formula_vertex(&mut engine, sheet, 0, 0, "=A1+1");
        engine.graph.add_edge(a1, a1);
        Evaluator::run_pass(&mut engine).unwrap();
        assert_eq!(engine.cell_value(CellAddress::new(sheet, 0, 0)), CellValue::Number(1.0));
    }

    /// SCC members evaluate sequentially in creation order, so the second
    /// member sees the first member's freshly computed value, not its seed.
    #[test]
    fn tolerant_two_cell_cycle_seeded_from_matrix() {
        let mut config = EngineConfig::default();
        config.allow_circular_references = true;
        config.initial_computed_values.insert(
            "Sheet1".to_string(),
            vec![vec![CellValue::Number(200.0), CellValue::Number(199.0)]],
        );
        let mut engine = Engine::new(config);
        let sheet = engine.sheets.add_sheet("Sheet1", 100, 100).unwrap();
        let a1 = formula_vertex(&mut engine, sheet, 0, 0, "=B1+1");
        let b1 = formula_vertex(&mut engine, sheet, 0, 1, "=A1+1");
        engine.graph.add_edge(a1, b1);
        engine.graph.add_edge(b1, a1);
        Evaluator::run_pass(&mut engine).unwrap();
        assert_eq!(engine.cell_value(CellAddress::new(sheet, 0, 0)), CellValue::Number(200.0));
        assert_eq!(engine.cell_value(CellAddress::new(sheet, 0, 1)), CellValue::Number(201.0));
    }
}
