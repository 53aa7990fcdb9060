//! The friendly surface on top of `gridcore-engine`'s `Engine`: an
//! `EngineState` that bundles the engine with its undo log and exposes
//! cells by sheet name instead of raw `SheetId`, plus the factory entry
//! points embedders actually call to stand one up (spec §6).

pub use gridcore_common::{CellAddress, CellError, CellRange, CellValue, ErrorKind, SheetId};
pub use gridcore_engine::{
    ArrayArithmeticMode, EngineConfig, EngineError, EngineResult, NameScope, PassStats,
    StatsRecorder, VertexId,
};
use gridcore_engine::{Engine, GraphBuilder, Operations, SheetInput, UndoLog};
pub use gridcore_parse::{ASTNode, ASTNodeType, ReferenceType};

/// Name a single-sheet workbook gets when the caller doesn't supply one
/// (spec §6's i18n `NEW_SHEET_PREFIX`).
pub const NEW_SHEET_PREFIX: &str = "Sheet";

/// One sheet's raw cell text, row-major, handed to the builder.
pub struct SheetSeed {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// `(name, scope, formula)` triples applied after the sheets are built.
pub type NamedExpressionSeed = (String, NameScope, String);

pub struct EngineState {
    engine: Engine,
    undo: UndoLog,
}

impl EngineState {
    pub fn build_from_sheets(
        sheets: &[SheetSeed],
        config: Option<EngineConfig>,
        named_expressions: &[NamedExpressionSeed],
    ) -> EngineResult<Self> {
        let inputs: Vec<SheetInput> = sheets.iter().map(|s| SheetInput { name: &s.name, rows: &s.rows }).collect();
        let engine = GraphBuilder::build(&inputs, config.unwrap_or_default())?;
        let mut state = EngineState { engine, undo: UndoLog::default() };
        for (name, scope, formula) in named_expressions {
            Operations::add_named_expression(&mut state.engine, name, *scope, formula)?;
        }
        Ok(state)
    }

    /// Builds a workbook with exactly one sheet, named by `NEW_SHEET_PREFIX`
    /// rather than whatever the caller calls it; any `initialComputedValues`
    /// seed keyed under `caller_name` is remapped onto the generated name
    /// so tolerant-mode seeds still line up with the sheet they target.
    pub fn build_from_sheet(
        caller_name: &str,
        rows: Vec<Vec<String>>,
        config: Option<EngineConfig>,
        named_expressions: &[NamedExpressionSeed],
    ) -> EngineResult<Self> {
        let generated_name = format!("{NEW_SHEET_PREFIX}1");
        let mut config = config.unwrap_or_default();
        if let Some(seed) = config.initial_computed_values.remove(caller_name) {
            config.initial_computed_values.insert(generated_name.clone(), seed);
        }
        let seed = SheetSeed { name: generated_name, rows };
        Self::build_from_sheets(std::slice::from_ref(&seed), Some(config), named_expressions)
    }

    pub fn build_empty(config: Option<EngineConfig>) -> Self {
        EngineState { engine: Engine::new(config.unwrap_or_default()), undo: UndoLog::default() }
    }

    /// Rebuilds from scratch under a new configuration — required any time
    /// an option baked into sheet storage at creation time changes — while
    /// carrying forward `previous_stats` so instrumentation survives a
    /// rebuild that a live engine's state otherwise wouldn't.
    pub fn rebuild_with_config(
        config: EngineConfig,
        sheets: &[SheetSeed],
        named_expressions: &[NamedExpressionSeed],
        previous_stats: &[PassStats],
    ) -> EngineResult<Self> {
        let mut state = Self::build_from_sheets(sheets, Some(config), named_expressions)?;
        for &stats in previous_stats {
            state.engine.stats.record(stats);
        }
        Ok(state)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn resolve_sheet(&self, name: &str) -> Option<SheetId> {
        self.engine.resolve_sheet(name)
    }

    fn require_sheet(&self, name: &str) -> EngineResult<SheetId> {
        self.engine.require_sheet(name)
    }

    pub fn cell_value(&self, sheet: &str, row: u32, col: u32) -> EngineResult<CellValue> {
        let sheet = self.require_sheet(sheet)?;
        Ok(self.engine.cell_value(CellAddress::new(sheet, row, col)))
    }

    pub fn cell_error(&self, sheet: &str, row: u32, col: u32) -> EngineResult<Option<ErrorKind>> {
        let sheet = self.require_sheet(sheet)?;
        Ok(self.engine.cell_error(CellAddress::new(sheet, row, col)))
    }

    /// Rows in `col` whose cell currently evaluates to an error.
    pub fn rows_with_errors_in_column(&self, sheet: &str, col: u32) -> EngineResult<Vec<u32>> {
        let sheet = self.require_sheet(sheet)?;
        Ok(self.engine.rows_with_errors_in_column(sheet, col))
    }

    pub fn set_cell_contents(&mut self, sheet: &str, row: u32, col: u32, raw: &str) -> EngineResult<()> {
        let sheet = self.require_sheet(sheet)?;
        let addr = CellAddress::new(sheet, row, col);
        Operations::set_cell_contents(&mut self.engine, &mut self.undo, addr, raw)
    }

    pub fn insert_rows(&mut self, sheet: &str, at: u32, count: u32) -> EngineResult<()> {
        let sheet = self.require_sheet(sheet)?;
        Operations::insert_rows(&mut self.engine, &mut self.undo, sheet, at, count)
    }

    pub fn remove_rows(&mut self, sheet: &str, at: u32, count: u32) -> EngineResult<()> {
        let sheet = self.require_sheet(sheet)?;
        Operations::remove_rows(&mut self.engine, &mut self.undo, sheet, at, count)
    }

    pub fn insert_columns(&mut self, sheet: &str, at: u32, count: u32) -> EngineResult<()> {
        let sheet = self.require_sheet(sheet)?;
        Operations::insert_columns(&mut self.engine, &mut self.undo, sheet, at, count)
    }

    pub fn remove_columns(&mut self, sheet: &str, at: u32, count: u32) -> EngineResult<()> {
        let sheet = self.require_sheet(sheet)?;
        Operations::remove_columns(&mut self.engine, &mut self.undo, sheet, at, count)
    }

    pub fn add_sheet(&mut self, name: &str) -> EngineResult<SheetId> {
        Operations::add_sheet(&mut self.engine, name)
    }

    pub fn remove_sheet(&mut self, name: &str) -> EngineResult<()> {
        let sheet = self.require_sheet(name)?;
        Operations::remove_sheet(&mut self.engine, &mut self.undo, sheet)
    }

    pub fn rename_sheet(&mut self, name: &str, new_name: &str) -> EngineResult<()> {
        let sheet = self.require_sheet(name)?;
        Operations::rename_sheet(&mut self.engine, &mut self.undo, sheet, new_name)
    }

    pub fn add_named_expression(&mut self, name: &str, scope: NameScope, formula: &str) -> EngineResult<()> {
        Operations::add_named_expression(&mut self.engine, name, scope, formula)
    }

    pub fn remove_named_expression(&mut self, name: &str, scope: NameScope) -> EngineResult<()> {
        Operations::remove_named_expression(&mut self.engine, &mut self.undo, name, scope)
    }

    pub fn undo(&mut self) -> EngineResult<()> {
        Operations::undo_last(&mut self.engine, &mut self.undo)
    }

    pub fn has_undo_history(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn stats(&self) -> &[PassStats] {
        self.engine.stats.passes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn build_from_sheet_remaps_seed_to_generated_name() {
        let mut config = EngineConfig::default();
        config.allow_circular_references = true;
        config
            .initial_computed_values
            .insert("MySheet".to_string(), vec![vec![CellValue::Number(51.0), CellValue::Number(50.0)]]);
        let rows = vec![row(&["=B1+1", "=A1+1"])];
        let state = EngineState::build_from_sheet("MySheet", rows, Some(config), &[]).unwrap();
        assert_eq!(state.cell_value(&format!("{NEW_SHEET_PREFIX}1"), 0, 0).unwrap(), CellValue::Number(51.0));
    }

    #[test]
    fn undo_round_trips_through_engine_state() {
        let rows = vec![row(&["1"])];
        let sheets = [SheetSeed { name: "Sheet1".to_string(), rows }];
        let mut state = EngineState::build_from_sheets(&sheets, None, &[]).unwrap();
        state.set_cell_contents("Sheet1", 0, 0, "99").unwrap();
        assert_eq!(state.cell_value("Sheet1", 0, 0).unwrap(), CellValue::Number(99.0));
        state.undo().unwrap();
        assert_eq!(state.cell_value("Sheet1", 0, 0).unwrap(), CellValue::Number(1.0));
    }

    #[test]
    fn unknown_sheet_name_is_rejected() {
        let state = EngineState::build_empty(None);
        assert!(state.cell_value("Nope", 0, 0).is_err());
    }
}
