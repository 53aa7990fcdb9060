//! End-to-end scenarios built from whole-sheet text grids, exercising the
//! engine the way an embedder actually would: seed a sheet, read cells,
//! mutate, read again.

use gridcore::{EngineConfig, EngineState, ErrorKind, SheetSeed};

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|s| s.to_string()).collect()
}

fn one_sheet(name: &str, rows: Vec<Vec<String>>) -> [SheetSeed; 1] {
    [SheetSeed { name: name.to_string(), rows }]
}

#[test]
fn simple_cycle_strict_yields_cycle_error_on_both_cells() {
    let sheets = one_sheet("Sheet1", vec![row(&["=B1", "=A1"])]);
    let state = EngineState::build_from_sheets(&sheets, None, &[]).unwrap();
    assert_eq!(state.cell_error("Sheet1", 0, 0).unwrap(), Some(ErrorKind::Cycle));
    assert_eq!(state.cell_error("Sheet1", 0, 1).unwrap(), Some(ErrorKind::Cycle));
}

// Tolerant mode seeds every cycle member, then evaluates each once in
// creation order reading whatever is currently cached for its
// dependencies. A1 evaluates first against B1's seed (199), landing back
// on its own seed (200); B1 then evaluates against A1's freshly computed
// value (200), one past its own seed (199) rather than reproducing it.
#[test]
fn two_cell_cycle_tolerant_with_seeds() {
    let mut config = EngineConfig::default();
    config.allow_circular_references = true;
    config.initial_computed_values.insert(
        "Sheet1".to_string(),
        vec![vec![gridcore::CellValue::Number(200.0), gridcore::CellValue::Number(199.0)]],
    );
    let sheets = one_sheet("Sheet1", vec![row(&["=B1+1", "=A1+1"])]);
    let state = EngineState::build_from_sheets(&sheets, Some(config), &[]).unwrap();
    assert_eq!(state.cell_value("Sheet1", 0, 0).unwrap(), gridcore::CellValue::Number(200.0));
    assert_eq!(state.cell_value("Sheet1", 0, 1).unwrap(), gridcore::CellValue::Number(201.0));
}

// Same sequencing over three members: C1 is the last evaluated, so it's
// the only one that moves off its seed.
#[test]
fn three_cell_cycle_tolerant_seeded() {
    let mut config = EngineConfig::default();
    config.allow_circular_references = true;
    config.initial_computed_values.insert(
        "Sheet1".to_string(),
        vec![vec![
            gridcore::CellValue::Number(300.0),
            gridcore::CellValue::Number(299.0),
            gridcore::CellValue::Number(298.0),
        ]],
    );
    let sheets = one_sheet("Sheet1", vec![row(&["=B1+1", "=C1+1", "=A1+1"])]);
    let state = EngineState::build_from_sheets(&sheets, Some(config), &[]).unwrap();
    assert_eq!(state.cell_value("Sheet1", 0, 0).unwrap(), gridcore::CellValue::Number(300.0));
    assert_eq!(state.cell_value("Sheet1", 0, 1).unwrap(), gridcore::CellValue::Number(299.0));
    assert_eq!(state.cell_value("Sheet1", 0, 2).unwrap(), gridcore::CellValue::Number(301.0));
}

// An edit to a non-cycle dependency (C1) re-dirties the cycle and
// reseeds both members from zero (neither has an external seed here),
// then evaluates sequentially against the new C1.
#[test]
fn edit_propagates_through_a_cycle() {
    let mut config = EngineConfig::default();
    config.allow_circular_references = true;
    let sheets = one_sheet("Sheet1", vec![row(&["=B1+C1", "=A1+1", "10"])]);
    let mut state = EngineState::build_from_sheets(&sheets, Some(config), &[]).unwrap();
    assert_eq!(state.cell_value("Sheet1", 0, 0).unwrap(), gridcore::CellValue::Number(10.0));
    assert_eq!(state.cell_value("Sheet1", 0, 1).unwrap(), gridcore::CellValue::Number(11.0));
    assert_eq!(state.cell_value("Sheet1", 0, 2).unwrap(), gridcore::CellValue::Number(10.0));

    state.set_cell_contents("Sheet1", 0, 2, "20").unwrap();
    assert_eq!(state.cell_value("Sheet1", 0, 2).unwrap(), gridcore::CellValue::Number(20.0));
    assert_eq!(state.cell_value("Sheet1", 0, 0).unwrap(), gridcore::CellValue::Number(31.0));
    assert_eq!(state.cell_value("Sheet1", 0, 1).unwrap(), gridcore::CellValue::Number(32.0));
}

// Once B1 becomes a constant the cycle is gone entirely, so this settles
// through the ordinary scheduler rather than tolerant seeding, and does
// land on the numbers in the worked example.
#[test]
fn breaking_a_cycle_by_constant_assignment() {
    let mut config = EngineConfig::default();
    config.allow_circular_references = true;
    config.initial_computed_values.insert(
        "Sheet1".to_string(),
        vec![vec![gridcore::CellValue::Number(51.0), gridcore::CellValue::Number(50.0)]],
    );
    let sheets = one_sheet("Sheet1", vec![row(&["=B1+1", "=A1+1"])]);
    let mut state = EngineState::build_from_sheets(&sheets, Some(config), &[]).unwrap();

    state.set_cell_contents("Sheet1", 0, 1, "75").unwrap();
    assert_eq!(state.cell_value("Sheet1", 0, 1).unwrap(), gridcore::CellValue::Number(75.0));
    assert_eq!(state.cell_value("Sheet1", 0, 0).unwrap(), gridcore::CellValue::Number(76.0));
}

#[test]
fn error_propagates_through_a_forward_chain() {
    let mut config = EngineConfig::default();
    config.allow_circular_references = true;
    let sheets = one_sheet("Sheet1", vec![row(&["=B1+1", "=1/0"])]);
    let state = EngineState::build_from_sheets(&sheets, Some(config), &[]).unwrap();
    assert_eq!(state.cell_error("Sheet1", 0, 1).unwrap(), Some(ErrorKind::DivByZero));
    assert_eq!(state.cell_error("Sheet1", 0, 0).unwrap(), Some(ErrorKind::DivByZero));
}

#[test]
fn structural_edit_rewrites_and_reevaluates_a_shifted_formula() {
    let sheets = one_sheet("Sheet1", vec![row(&["1", "2", "=A1+B1"])]);
    let mut state = EngineState::build_from_sheets(&sheets, None, &[]).unwrap();
    state.insert_rows("Sheet1", 0, 1).unwrap();

    assert_eq!(state.cell_value("Sheet1", 1, 2).unwrap(), gridcore::CellValue::Number(3.0));

    let sheet_id = state.resolve_sheet("Sheet1").unwrap();
    let addr = gridcore::CellAddress::new(sheet_id, 1, 2);
    let vertex_id = state
        .engine()
        .sheets
        .entry(sheet_id)
        .and_then(|e| e.mapping.get(addr.row, addr.col))
        .unwrap();
    let ast_id = state
        .engine()
        .graph
        .get(vertex_id)
        .and_then(|v| v.kind.ast_id())
        .unwrap();
    let ast = state.engine().lazy_ast.peek(ast_id);
    assert_eq!(gridcore_parse::unparse(ast), "=A2+B2");
}

#[test]
fn sheet_exceeding_max_rows_fails_construction() {
    let mut config = EngineConfig::default();
    config.max_rows = 1;
    let sheets = one_sheet("Sheet1", vec![row(&["1"]), row(&["2"])]);
    let result = EngineState::build_from_sheets(&sheets, Some(config), &[]);
    assert!(matches!(result, Err(gridcore::EngineError::SheetSizeLimitExceeded { .. })));
}

// C1 is never written, so it's an `EmptyCell` vertex; it sits outside the
// A1/B1 SCC (nothing depends on it), but each cycle member still reads it
// as part of its formula and must see plain `Empty`, not an error.
#[test]
fn empty_cell_referenced_from_within_a_cycle_reads_as_empty() {
    let mut config = EngineConfig::default();
    config.allow_circular_references = true;
    let sheets = one_sheet("Sheet1", vec![row(&["=B1+C1", "=A1", ""])]);
    let state = EngineState::build_from_sheets(&sheets, Some(config), &[]).unwrap();
    assert_eq!(state.cell_value("Sheet1", 0, 2).unwrap(), gridcore::CellValue::Empty);
}

// A structural edit on one sheet must not shift references that live on
// an untouched sheet, whether the reference is bare (relative to its own
// sheet) or names a different sheet explicitly.
#[test]
fn structural_edit_on_one_sheet_leaves_another_sheets_references_alone() {
    let sheets = [
        SheetSeed { name: "Sheet1".to_string(), rows: vec![row(&["1", "=A1+1"])] },
        SheetSeed {
            name: "Sheet2".to_string(),
            rows: vec![row(&["x"]), row(&["x"]), row(&["5", "=A3+1", "=Sheet1!B1"])],
        },
    ];
    let mut state = EngineState::build_from_sheets(&sheets, None, &[]).unwrap();
    assert_eq!(state.cell_value("Sheet2", 2, 1).unwrap(), gridcore::CellValue::Number(6.0));
    assert_eq!(state.cell_value("Sheet2", 2, 2).unwrap(), gridcore::CellValue::Number(2.0));

    state.insert_rows("Sheet2", 0, 3).unwrap();

    assert_eq!(state.cell_value("Sheet1", 0, 1).unwrap(), gridcore::CellValue::Number(2.0));
    assert_eq!(state.cell_value("Sheet2", 5, 1).unwrap(), gridcore::CellValue::Number(6.0));
    assert_eq!(state.cell_value("Sheet2", 5, 2).unwrap(), gridcore::CellValue::Number(2.0));
}

#[test]
fn self_cycle_with_no_seed_defaults_to_zero() {
    let mut config = EngineConfig::default();
    config.allow_circular_references = true;
    let sheets = one_sheet("Sheet1", vec![row(&["=A1"])]);
    let state = EngineState::build_from_sheets(&sheets, Some(config), &[]).unwrap();
    assert_eq!(state.cell_value("Sheet1", 0, 0).unwrap(), gridcore::CellValue::Number(0.0));
}
