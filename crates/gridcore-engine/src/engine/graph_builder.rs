//! Bulk graph construction (spec §4, L7). Builds a whole workbook in three
//! phases: materialize every raw cell into a vertex, link formula
//! references into edges, then run the first evaluation pass. Phases are
//! kept separate (rather than linking while classifying) because a
//! forward reference — a formula on row 3 referencing row 9 before row 9
//! has been classified — is perfectly legal and must resolve to whatever
//! vertex row 9 eventually gets.

use gridcore_common::CellAddress;
use gridcore_parse::parse;

use crate::config::EngineConfig;
use crate::content::{ArraySizePredictor, CellContentParser, ParsedContent};
use crate::engine::evaluator::Evaluator;
use crate::engine::vertex::{VertexId, VertexKind};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};

pub struct GraphBuilder;

pub struct SheetInput<'a> {
    pub name: &'a str,
    pub rows: &'a [Vec<String>],
}

impl GraphBuilder {
    pub fn build(sheets: &[SheetInput], config: EngineConfig) -> EngineResult<Engine> {
        let mut engine = Engine::new(config);
        let mut pending_formulas: Vec<VertexId> = Vec::new();

        for sheet in sheets {
            let declared_rows = sheet.rows.len() as u32;
            let declared_cols = sheet.rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
            if declared_rows > engine.config.max_rows || declared_cols > engine.config.max_columns {
                return Err(EngineError::SheetSizeLimitExceeded {
                    sheet: sheet.name.to_string(),
                    rows: declared_rows,
                    cols: declared_cols,
                    max_rows: engine.config.max_rows,
                    max_cols: engine.config.max_columns,
                });
            }
            let sheet_id = engine
                .sheets
                .add_sheet(sheet.name, engine.config.max_rows, engine.config.max_columns)
                .ok_or_else(|| EngineError::DuplicateSheet(sheet.name.to_string()))?;

            for (row, cells) in sheet.rows.iter().enumerate() {
                for (col, raw) in cells.iter().enumerate() {
                    let addr = CellAddress::new(sheet_id, row as u32, col as u32);
                    match CellContentParser::classify(raw) {
                        ParsedContent::Empty => {}
                        ParsedContent::Value(value) => {
                            let id = engine.graph.insert(Some(addr), VertexKind::ValueCell { value });
                            engine.sheets.entry_mut(sheet_id).unwrap().mapping.set(addr.row, addr.col, id);
                        }
                        ParsedContent::Formula(text) => {
                            let ast = parse(&format!("={text}")).map_err(|e| EngineError::ParseError(e.to_string()))?;
                            let volatile = ast.contains_volatile;
                            let extent = ArraySizePredictor::predict(&ast, engine.config.max_rows, engine.config.max_columns);
                            let ast_id = engine.lazy_ast.park(ast, sheet_id);
                            let kind = if extent == (1, 1) {
                                VertexKind::FormulaCell {
                                    ast_id,
                                    cached_value: gridcore_common::CellValue::Empty,
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
                            let id = engine.graph.insert(Some(addr), kind);
                            engine.sheets.entry_mut(sheet_id).unwrap().mapping.set(addr.row, addr.col, id);
                            pending_formulas.push(id);
                        }
                    }
                }
            }
        }

        for id in pending_formulas {
            let (ast_id, sheet_id) = {
                let v = engine.graph.get(id).expect("just inserted");
                (v.kind.ast_id().expect("formula vertex"), v.address.expect("formula vertex has an address").sheet)
            };
            let ast = engine.lazy_ast.peek(ast_id).clone();
            let mut refs = Vec::new();
            ast.collect_references(&mut refs);
            engine.link_references(id, sheet_id, &refs);
        }

        Evaluator::run_pass(&mut engine)?;
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builds_and_evaluates_a_simple_sheet() {
        let rows = vec![row(&["2", "=A1*3"]), row(&["4", "=SUM(A1:A2)"])];
        let sheets = [SheetInput { name: "Sheet1", rows: &rows }];
        let engine = GraphBuilder::build(&sheets, EngineConfig::default()).unwrap();
        let sheet_id = engine.resolve_sheet("Sheet1").unwrap();
        assert_eq!(
            engine.cell_value(CellAddress::new(sheet_id, 0, 1)),
            gridcore_common::CellValue::Number(6.0)
        );
        assert_eq!(
            engine.cell_value(CellAddress::new(sheet_id, 1, 1)),
            gridcore_common::CellValue::Number(6.0)
        );
    }

    #[test]
    fn forward_reference_resolves_correctly() {
        let rows = vec![row(&["=A2+1"]), row(&["10"])];
        let sheets = [SheetInput { name: "Sheet1", rows: &rows }];
        let engine = GraphBuilder::build(&sheets, EngineConfig::default()).unwrap();
        let sheet_id = engine.resolve_sheet("Sheet1").unwrap();
        assert_eq!(
            engine.cell_value(CellAddress::new(sheet_id, 0, 0)),
            gridcore_common::CellValue::Number(11.0)
        );
    }

    #[test]
    fn oversized_sheet_is_rejected() {
        let mut config = EngineConfig::default();
        config.max_rows = 2;
        let rows = vec![row(&["1"]), row(&["2"]), row(&["3"])];
        let sheets = [SheetInput { name: "Sheet1", rows: &rows }];
        assert!(GraphBuilder::build(&sheets, config).is_err());
    }
}
