//! CRUD operations (spec §4, L10): the mutating surface callers actually
//! drive. Every operation here either succeeds completely or leaves the
//! engine untouched (spec §7, "all-or-nothing"); each push an inverse
//! onto the undo log before committing so `undo_last` can unwind it.

use gridcore_common::{CellAddress, CellValue};
use gridcore_parse::parse;

use crate::content::{ArraySizePredictor, CellContentParser, ParsedContent};
use crate::engine::evaluator::Evaluator;
use crate::engine::lazy_ast::{Transform, TransformKind};
use crate::engine::vertex::{NameScope, VertexId, VertexKind};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};

/// A previously-applied operation's reverse, recorded so `undo_last` can
/// replay it. Structural inverses restore reference integrity via the
/// lazy transform log but do not resurrect the literal contents of cells
/// that were inside a removed band — that would require snapshotting
/// every removed vertex, which this core does not do.
pub enum InverseCommand {
    SetCellContents {
        sheet: gridcore_common::SheetId,
        row: u32,
        col: u32,
        previous_raw: String,
    },
    StructuralTransform(Transform),
    RemoveSheet {
        name: String,
    },
    RenameSheet {
        sheet: gridcore_common::SheetId,
        previous_name: String,
    },
    RemoveNamedExpression {
        name: String,
        scope: NameScope,
    },
}

#[derive(Default)]
pub struct UndoLog {
    stack: Vec<InverseCommand>,
}

impl UndoLog {
    pub fn push(&mut self, cmd: InverseCommand) {
        self.stack.push(cmd);
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

pub struct Operations;

impl Operations {
    pub fn set_cell_contents(
        engine: &mut Engine,
        undo: &mut UndoLog,
        addr: CellAddress,
        raw: &str,
    ) -> EngineResult<()> {
        #[cfg(feature = "tracing")]
        tracing::trace!(sheet = ?addr.sheet, row = addr.row, col = addr.col, "set_cell_contents");
        let id = engine.cell_vertex(addr);
        let previous_raw = render_raw(engine, id);

        engine.clear_dependencies_gc(id);
        if let Some(ast_id) = engine.graph.get(id).and_then(|v| v.kind.ast_id()) {
            engine.lazy_ast.remove(ast_id);
        }

        match CellContentParser::classify(raw) {
            ParsedContent::Empty => {
                if let Some(v) = engine.graph.get_mut(id) {
                    v.kind = VertexKind::EmptyCell;
                }
                engine.graph.set_volatile(id, false);
            }
            ParsedContent::Value(value) => {
                if let Some(v) = engine.graph.get_mut(id) {
                    v.kind = VertexKind::ValueCell { value };
                }
                engine.graph.set_volatile(id, false);
            }
            ParsedContent::Formula(text) => {
                let ast = parse(&format!("={text}")).map_err(|e| EngineError::ParseError(e.to_string()))?;
                let volatile = ast.contains_volatile;
                let extent = ArraySizePredictor::predict(&ast, engine.config.max_rows, engine.config.max_columns);
                let mut refs = Vec::new();
                ast.collect_references(&mut refs);
                engine.link_references(id, addr.sheet, &refs);
                let ast_id = engine.lazy_ast.park(ast, addr.sheet);
                let kind = if extent == (1, 1) {
                    VertexKind::FormulaCell {
                        ast_id,
                        cached_value: CellValue::Empty,
                        dirty: true,
                        volatile,
                    }
                } else {
                    VertexKind::ArrayCell {
                        ast_id,
                        extent,
                        cached_values: Vec::new(),
                        dirty: true,
                        volatile,
                    }
                };
                if let Some(v) = engine.graph.get_mut(id) {
                    v.kind = kind;
                }
                engine.graph.set_volatile(id, volatile);
            }
        }

        engine.graph.mark_dirty(id);
        undo.push(InverseCommand::SetCellContents {
            sheet: addr.sheet,
            row: addr.row,
            col: addr.col,
            previous_raw,
        });
        Evaluator::run_pass(engine)?;
        Ok(())
    }

    pub fn insert_rows(
        engine: &mut Engine,
        undo: &mut UndoLog,
        sheet: gridcore_common::SheetId,
        at: u32,
        count: u32,
    ) -> EngineResult<()> {
        Self::apply_transform(engine, undo, Transform { sheet, kind: TransformKind::InsertRows { at, count } })
    }

    pub fn remove_rows(
        engine: &mut Engine,
        undo: &mut UndoLog,
        sheet: gridcore_common::SheetId,
        at: u32,
        count: u32,
    ) -> EngineResult<()> {
        Self::apply_transform(engine, undo, Transform { sheet, kind: TransformKind::RemoveRows { at, count } })
    }

    pub fn insert_columns(
        engine: &mut Engine,
        undo: &mut UndoLog,
        sheet: gridcore_common::SheetId,
        at: u32,
        count: u32,
    ) -> EngineResult<()> {
        Self::apply_transform(engine, undo, Transform { sheet, kind: TransformKind::InsertColumns { at, count } })
    }

    pub fn remove_columns(
        engine: &mut Engine,
        undo: &mut UndoLog,
        sheet: gridcore_common::SheetId,
        at: u32,
        count: u32,
    ) -> EngineResult<()> {
        Self::apply_transform(engine, undo, Transform { sheet, kind: TransformKind::RemoveColumns { at, count } })
    }

    fn apply_transform(engine: &mut Engine, undo: &mut UndoLog, t: Transform) -> EngineResult<()> {
        let entry = engine
            .sheets
            .entry_mut(t.sheet)
            .ok_or_else(|| EngineError::InvalidSheet(t.sheet.to_string()))?;
        match t.kind {
            TransformKind::InsertRows { at, count } => entry.mapping.shift_rows(at, count as i64),
            TransformKind::RemoveRows { at, count } => entry.mapping.shift_rows(at, -(count as i64)),
            TransformKind::InsertColumns { at, count } => entry.mapping.shift_cols(at, count as i64),
            TransformKind::RemoveColumns { at, count } => entry.mapping.shift_cols(at, -(count as i64)),
        }

        shift_vertex_addresses(engine, t);
        engine.lazy_ast.record_transform(t);

        // Conservative invalidation: mark every formula dirty. The
        // expensive part (walking and rewriting each AST) stays lazy,
        // deferred to `materialize` the next time evaluation actually
        // reaches that vertex; this pass only flips a bool per formula.
        let ids: Vec<VertexId> = engine
            .graph
            .iter()
            .filter(|v| v.kind.ast_id().is_some())
            .map(|v| v.id)
            .collect();
        for id in ids {
            engine.graph.mark_dirty(id);
        }

        undo.push(InverseCommand::StructuralTransform(t.inverse()));
        Evaluator::run_pass(engine)?;
        Ok(())
    }

    pub fn add_sheet(engine: &mut Engine, name: &str) -> EngineResult<gridcore_common::SheetId> {
        engine
            .sheets
            .add_sheet(name, engine.config.max_rows, engine.config.max_columns)
            .ok_or_else(|| EngineError::DuplicateSheet(name.to_string()))
    }

    pub fn remove_sheet(engine: &mut Engine, undo: &mut UndoLog, sheet: gridcore_common::SheetId) -> EngineResult<()> {
        let entry = engine
            .sheets
            .remove_sheet(sheet)
            .ok_or_else(|| EngineError::InvalidSheet(sheet.to_string()))?;
        let ids: Vec<VertexId> = entry.mapping.iter().map(|(_, _, id)| id).collect();
        for id in ids {
            engine.graph.remove(id);
        }
        undo.push(InverseCommand::RemoveSheet { name: entry.name });
        Evaluator::run_pass(engine)?;
        Ok(())
    }

    pub fn rename_sheet(engine: &mut Engine, undo: &mut UndoLog, sheet: gridcore_common::SheetId, new_name: &str) -> EngineResult<()> {
        let previous_name = engine
            .sheets
            .name_of(sheet)
            .ok_or_else(|| EngineError::InvalidSheet(sheet.to_string()))?
            .to_string();
        engine
            .sheets
            .rename_sheet(sheet, new_name)
            .map_err(|e| EngineError::ConfigType { option: "sheetName".into(), detail: e.into() })?;
        undo.push(InverseCommand::RenameSheet { sheet, previous_name });
        Ok(())
    }

    pub fn add_named_expression(
        engine: &mut Engine,
        name: &str,
        scope: NameScope,
        formula: &str,
    ) -> EngineResult<()> {
        if !crate::engine::named_expression_store::NamedExpressionStore::is_valid_name(name) {
            return Err(EngineError::NamedExpressionNameInvalid(
                name.to_string(),
                "must start with a letter or underscore and not look like a cell reference".to_string(),
            ));
        }
        let ast = parse(&format!("={formula}")).map_err(|e| EngineError::ParseError(e.to_string()))?;
        let mut refs = Vec::new();
        ast.collect_references(&mut refs);
        let fallback_sheet = match scope {
            NameScope::Sheet(s) => s,
            NameScope::Workbook => engine.sheets.sheet_ids().next().unwrap_or(0),
        };
        let ast_id = engine.lazy_ast.park(ast.clone(), fallback_sheet);
        let vertex = engine.graph.insert(
            None,
            VertexKind::NamedExpression {
                name: name.to_string(),
                scope,
                ast_id,
                cached_value: CellValue::Empty,
                dirty: true,
            },
        );
        engine.link_references(vertex, fallback_sheet, &refs);
        engine
            .names
            .define(name, scope, vertex)
            .map_err(|_| EngineError::DuplicateNamedExpression(name.to_string()))?;
        Evaluator::run_pass(engine)?;
        Ok(())
    }

    pub fn remove_named_expression(engine: &mut Engine, undo: &mut UndoLog, name: &str, scope: NameScope) -> EngineResult<()> {
        let vertex = engine
            .names
            .remove(name, scope)
            .ok_or_else(|| EngineError::UnknownNamedExpression(name.to_string()))?;
        engine.graph.remove(vertex);
        undo.push(InverseCommand::RemoveNamedExpression { name: name.to_string(), scope });
        Evaluator::run_pass(engine)?;
        Ok(())
    }

    /// Pops and re-applies the most recent inverse command. No-op return
    /// of `NothingToUndo` on an empty log rather than a panic, since
    /// callers typically drive this from a keystroke they don't want to
    /// special-case.
    pub fn undo_last(engine: &mut Engine, undo: &mut UndoLog) -> EngineResult<()> {
        let cmd = undo.stack.pop().ok_or(EngineError::NothingToUndo)?;
        match cmd {
            InverseCommand::SetCellContents { sheet, row, col, previous_raw } => {
                let mut scratch = UndoLog::default();
                Self::set_cell_contents(engine, &mut scratch, CellAddress::new(sheet, row, col), &previous_raw)?;
            }
            InverseCommand::StructuralTransform(t) => {
                let mut scratch = UndoLog::default();
                Self::apply_transform(engine, &mut scratch, t)?;
            }
            InverseCommand::RemoveSheet { name } => {
                Self::add_sheet(engine, &name)?;
            }
            InverseCommand::RenameSheet { sheet, previous_name } => {
                let mut scratch = UndoLog::default();
                Self::rename_sheet(engine, &mut scratch, sheet, &previous_name)?;
            }
            InverseCommand::RemoveNamedExpression { name, scope } => {
                let mut scratch = UndoLog::default();
                Self::remove_named_expression(engine, &mut scratch, &name, scope)?;
            }
        }
        Ok(())
    }
}

fn shift_vertex_addresses(engine: &mut Engine, t: Transform) {
    for v in engine.graph.iter_mut() {
        let Some(addr) = v.address.as_mut() else { continue };
        if addr.sheet != t.sheet {
            continue;
        }
        match t.kind {
            TransformKind::InsertRows { at, count } if addr.row >= at => addr.row += count,
            TransformKind::RemoveRows { at, count } if addr.row >= at + count => addr.row -= count,
            TransformKind::InsertColumns { at, count } if addr.col >= at => addr.col += count,
            TransformKind::RemoveColumns { at, count } if addr.col >= at + count => addr.col -= count,
            _ => {}
        }
    }
}

/// Reconstructs a raw-text form of a vertex's current content, good
/// enough to feed back into `set_cell_contents` for undo. Formula vertices
/// round-trip through the unparser; literal values use their canonical
/// text form.
fn render_raw(engine: &Engine, id: VertexId) -> String {
    let Some(v) = engine.graph.get(id) else { return String::new() };
    match &v.kind {
        VertexKind::EmptyCell => String::new(),
        VertexKind::ValueCell { value } => raw_for_value(value),
        VertexKind::FormulaCell { ast_id, .. } | VertexKind::ArrayCell { ast_id, .. } => {
            gridcore_parse::unparse(engine.lazy_ast.peek(*ast_id))
        }
        VertexKind::NamedExpression { .. } | VertexKind::Range { .. } => String::new(),
    }
}

fn raw_for_value(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Error(e) => e.kind.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::graph_builder::{GraphBuilder, SheetInput};

    fn engine_with_sheet() -> Engine {
        let rows = vec![vec!["1".to_string()], vec!["=A1+1".to_string()]];
        let sheets = [SheetInput { name: "Sheet1", rows: &rows }];
        GraphBuilder::build(&sheets, EngineConfig::default()).unwrap()
    }

    #[test]
    fn set_cell_contents_propagates_to_dependents() {
        let mut engine = engine_with_sheet();
        let sheet = engine.resolve_sheet("Sheet1").unwrap();
        let mut undo = UndoLog::default();
        Operations::set_cell_contents(&mut engine, &mut undo, CellAddress::new(sheet, 0, 0), "5").unwrap();
        assert_eq!(engine.cell_value(CellAddress::new(sheet, 1, 0)), CellValue::Number(6.0));
    }

    #[test]
    fn undo_restores_previous_cell_contents() {
        let mut engine = engine_with_sheet();
        let sheet = engine.resolve_sheet("Sheet1").unwrap();
        let mut undo = UndoLog::default();
        Operations::set_cell_contents(&mut engine, &mut undo, CellAddress::new(sheet, 0, 0), "5").unwrap();
        Operations::undo_last(&mut engine, &mut undo).unwrap();
        assert_eq!(engine.cell_value(CellAddress::new(sheet, 0, 0)), CellValue::Number(1.0));
        assert_eq!(engine.cell_value(CellAddress::new(sheet, 1, 0)), CellValue::Number(2.0));
    }

    #[test]
    fn insert_rows_shifts_existing_content_down() {
        let mut engine = engine_with_sheet();
        let sheet = engine.resolve_sheet("Sheet1").unwrap();
        let mut undo = UndoLog::default();
        Operations::insert_rows(&mut engine, &mut undo, sheet, 0, 2).unwrap();
        assert_eq!(engine.cell_value(CellAddress::new(sheet, 2, 0)), CellValue::Number(1.0));
        assert_eq!(engine.cell_value(CellAddress::new(sheet, 3, 0)), CellValue::Number(2.0));
    }

    #[test]
    fn remove_rows_covering_a_reference_yields_ref_error() {
        let rows = vec![vec!["=A2".to_string()], vec!["9".to_string()]];
        let sheets = [SheetInput { name: "Sheet1", rows: &rows }];
        let mut engine = GraphBuilder::build(&sheets, EngineConfig::default()).unwrap();
        let sheet = engine.resolve_sheet("Sheet1").unwrap();
        let mut undo = UndoLog::default();
        Operations::remove_rows(&mut engine, &mut undo, sheet, 1, 1).unwrap();
        assert_eq!(
            engine.cell_error(CellAddress::new(sheet, 0, 0)),
            Some(gridcore_common::ErrorKind::Ref)
        );
    }

    #[test]
    fn duplicate_named_expression_is_rejected() {
        let mut engine = engine_with_sheet();
        Operations::add_named_expression(&mut engine, "TaxRate", NameScope::Workbook, "0.2").unwrap();
        assert!(Operations::add_named_expression(&mut engine, "TaxRate", NameScope::Workbook, "0.3").is_err());
    }
}
