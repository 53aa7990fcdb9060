//! Lazy AST transform service (spec §4, L6). Structural edits (row/column
//! insert or delete) do not eagerly rewrite every formula's AST; instead
//! they append a `Transform` to a log and let each AST catch up to the
//! current log length the next time it is actually read, amortizing the
//! cost of a structural edit over however many formulas are re-evaluated
//! rather than charging it to every formula in the workbook up front.

use gridcore_common::SheetId;
use gridcore_parse::{ASTNode, ASTNodeType, ReferenceType};

use crate::engine::sheet_mapping::SheetMapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AstId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    InsertRows { at: u32, count: u32 },
    RemoveRows { at: u32, count: u32 },
    InsertColumns { at: u32, count: u32 },
    RemoveColumns { at: u32, count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transform {
    pub sheet: SheetId,
    pub kind: TransformKind,
}

impl Transform {
    /// The transform that, appended after `self`, undoes its effect on
    /// references. Used by the undo log in `operations.rs`.
    pub fn inverse(&self) -> Transform {
        let kind = match self.kind {
            TransformKind::InsertRows { at, count } => TransformKind::RemoveRows { at, count },
            TransformKind::RemoveRows { at, count } => TransformKind::InsertRows { at, count },
            TransformKind::InsertColumns { at, count } => TransformKind::RemoveColumns { at, count },
            TransformKind::RemoveColumns { at, count } => TransformKind::InsertColumns { at, count },
        };
        Transform { sheet: self.sheet, kind }
    }
}

struct AstSlot {
    ast: ASTNode,
    version: usize,
    home_sheet: SheetId,
}

/// Append-only log of structural transforms plus the parked ASTs that
/// lazily replay against it.
pub struct LazyAstTransformService {
    transforms: Vec<Transform>,
    slots: Vec<Option<AstSlot>>,
}

impl LazyAstTransformService {
    pub fn new() -> Self {
        LazyAstTransformService {
            transforms: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// `home_sheet` is the sheet this AST's own cell (or named expression's
    /// fallback sheet) lives on — a bare, unqualified reference inside the
    /// AST is relative to it, which is what lets `rewrite` tell whether an
    /// unqualified reference falls inside a transform's sheet.
    pub fn park(&mut self, ast: ASTNode, home_sheet: SheetId) -> AstId {
        let id = AstId(self.slots.len() as u32);
        self.slots.push(Some(AstSlot {
            ast,
            version: self.transforms.len(),
            home_sheet,
        }));
        id
    }

    pub fn remove(&mut self, id: AstId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            *slot = None;
        }
    }

    pub fn record_transform(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    pub fn transform_count(&self) -> usize {
        self.transforms.len()
    }

    /// Advances `id`'s AST to the current log length, rewriting any
    /// references shifted or invalidated along the way, and returns the
    /// up-to-date node. Idempotent: calling this again with no new
    /// transforms recorded is a no-op (spec I5).
    ///
    /// `sheets` resolves an explicit `Sheet!A1`-style reference's sheet
    /// name to a `SheetId`, so a transform recorded against one sheet
    /// (`Transform::sheet`) only ever shifts references that actually point
    /// at that sheet — bare references resolve against `home_sheet`
    /// instead, since they have no name of their own to look up.
    pub fn materialize(&mut self, id: AstId, sheets: &SheetMapping) -> &ASTNode {
        let slot = self.slots[id.0 as usize]
            .as_mut()
            .expect("materialize called on a removed AstId");
        let behind = self.transforms.len() - slot.version;
        if behind > 0 {
            #[cfg(feature = "tracing")]
            tracing::trace!(ast_id = id.0, transforms_applied = behind, "materializing parked ast");
        }
        while slot.version < self.transforms.len() {
            let t = self.transforms[slot.version];
            rewrite(&mut slot.ast, t, slot.home_sheet, sheets);
            slot.version += 1;
        }
        &slot.ast
    }

    pub fn peek(&self, id: AstId) -> &ASTNode {
        &self.slots[id.0 as usize].as_ref().unwrap().ast
    }
}

impl Default for LazyAstTransformService {
    fn default() -> Self {
        Self::new()
    }
}

fn rewrite(node: &mut ASTNode, t: Transform, home_sheet: SheetId, sheets: &SheetMapping) {
    match &mut node.node_type {
        ASTNodeType::Reference { reference, original } => {
            if let Some(rewritten) = rewrite_reference(reference, t, home_sheet, sheets) {
                *reference = rewritten;
                *original = reference.to_string();
            } else {
                *node = ASTNode::new(ASTNodeType::Literal(gridcore_common::CellValue::Error(
                    gridcore_common::CellError::new(gridcore_common::ErrorKind::Ref),
                )));
            }
        }
        ASTNodeType::UnaryOp { expr, .. } => rewrite(expr, t, home_sheet, sheets),
        ASTNodeType::BinaryOp { left, right, .. } => {
            rewrite(left, t, home_sheet, sheets);
            rewrite(right, t, home_sheet, sheets);
        }
        ASTNodeType::Function { args, .. } => {
            for a in args {
                rewrite(a, t, home_sheet, sheets);
            }
        }
        ASTNodeType::Array(rows) => {
            for row in rows {
                for n in row {
                    rewrite(n, t, home_sheet, sheets);
                }
            }
        }
        ASTNodeType::Literal(_) => {}
    }
}

/// Returns `None` when the reference falls inside a deleted region and
/// must collapse to `#REF!`. Returns the reference unchanged (`Some`, no
/// shift applied) when it doesn't target `t.sheet` at all — an explicit
/// `Sheet!A1` reference naming some other sheet, or a bare reference whose
/// `home_sheet` isn't the one the transform was recorded against. A bare
/// reference is relative to `home_sheet`; an explicit reference to a sheet
/// that no longer resolves is left untouched too, the same as any other
/// unresolvable reference, and surfaces as `#REF!`/`#NAME?` at evaluation
/// time instead.
fn rewrite_reference(
    reference: &ReferenceType,
    t: Transform,
    home_sheet: SheetId,
    sheets: &SheetMapping,
) -> Option<ReferenceType> {
    let target_sheet = match reference {
        ReferenceType::Named(_) => None,
        ReferenceType::Cell { sheet, .. } | ReferenceType::Range { sheet, .. } => match sheet {
            Some(name) => sheets.id_of(name),
            None => Some(home_sheet),
        },
    };
    if target_sheet != Some(t.sheet) {
        return Some(reference.clone());
    }

    match reference {
        ReferenceType::Named(_) => Some(reference.clone()),
        ReferenceType::Cell { sheet, row, col } => {
            let (row, col) = shift_point(*row, *col, t)?;
            Some(ReferenceType::Cell {
                sheet: sheet.clone(),
                row,
                col,
            })
        }
        ReferenceType::Range {
            sheet,
            start_row,
            start_col,
            end_row,
            end_col,
        } => {
            let (start_row, start_col) = shift_bound(*start_row, *start_col, t, false)?;
            let (end_row, end_col) = shift_bound(*end_row, *end_col, t, true)?;
            Some(ReferenceType::Range {
                sheet: sheet.clone(),
                start_row,
                start_col,
                end_row,
                end_col,
            })
        }
    }
}

fn shift_point(row: u32, col: u32, t: Transform) -> Option<(u32, u32)> {
    let (r, c) = shift_index_pair(Some(row), Some(col), t)?;
    Some((r.unwrap(), c.unwrap()))
}

fn shift_bound(
    row: Option<u32>,
    col: Option<u32>,
    t: Transform,
    is_upper: bool,
) -> Option<(Option<u32>, Option<u32>)> {
    shift_index_pair_open(row, col, t, is_upper)
}

fn shift_index_pair(row: Option<u32>, col: Option<u32>, t: Transform) -> Option<(Option<u32>, Option<u32>)> {
    shift_index_pair_open(row, col, t, true)
}

fn shift_index_pair_open(
    row: Option<u32>,
    col: Option<u32>,
    t: Transform,
    is_upper: bool,
) -> Option<(Option<u32>, Option<u32>)> {
    match t.kind {
        TransformKind::InsertRows { at, count } => {
            let row = match row {
                Some(r) if r >= at => Some(r + count),
                other => other,
            };
            Some((row, col))
        }
        TransformKind::RemoveRows { at, count } => {
            let row = match row {
                Some(r) if r >= at && r < at + count => return None,
                Some(r) if r >= at + count => Some(r - count),
                other => other,
            };
            let _ = is_upper;
            Some((row, col))
        }
        TransformKind::InsertColumns { at, count } => {
            let col = match col {
                Some(c) if c >= at => Some(c + count),
                other => other,
            };
            Some((row, col))
        }
        TransformKind::RemoveColumns { at, count } => {
            let col = match col {
                Some(c) if c >= at && c < at + count => return None,
                Some(c) if c >= at + count => Some(c - count),
                other => other,
            };
            Some((row, col))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcore_parse::parse;

    fn one_sheet() -> SheetMapping {
        let mut sheets = SheetMapping::new();
        sheets.add_sheet("Sheet1", 1_048_576, 16_384).unwrap();
        sheets
    }

    #[test]
    fn insert_rows_shifts_reference_below_insertion_point() {
        let sheets = one_sheet();
        let mut svc = LazyAstTransformService::new();
        let ast = parse("=A5").unwrap();
        let id = svc.park(ast, 0);
        svc.record_transform(Transform {
            sheet: 0,
            kind: TransformKind::InsertRows { at: 2, count: 3 },
        });
        let materialized = svc.materialize(id, &sheets);
        match &materialized.node_type {
            ASTNodeType::Reference {
                reference: ReferenceType::Cell { row, .. },
                ..
            } => assert_eq!(*row, 7),
            other => panic!("expected a cell reference, got {other:?}"),
        }
    }

    #[test]
    fn remove_rows_covering_reference_yields_ref_error() {
        let sheets = one_sheet();
        let mut svc = LazyAstTransformService::new();
        let ast = parse("=A5").unwrap();
        let id = svc.park(ast, 0);
        svc.record_transform(Transform {
            sheet: 0,
            kind: TransformKind::RemoveRows { at: 3, count: 5 },
        });
        let materialized = svc.materialize(id, &sheets);
        match &materialized.node_type {
            ASTNodeType::Literal(gridcore_common::CellValue::Error(e)) => {
                assert_eq!(e.kind, gridcore_common::ErrorKind::Ref);
            }
            other => panic!("expected a #REF! literal, got {other:?}"),
        }
    }

    #[test]
    fn materialize_twice_with_no_new_transforms_is_a_no_op() {
        let sheets = one_sheet();
        let mut svc = LazyAstTransformService::new();
        let ast = parse("=A1+B2").unwrap();
        let id = svc.park(ast, 0);
        svc.record_transform(Transform {
            sheet: 0,
            kind: TransformKind::InsertRows { at: 0, count: 1 },
        });
        let first = svc.materialize(id, &sheets).clone();
        let second = svc.materialize(id, &sheets).clone();
        assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }

    // A transform recorded against a different sheet than the one this
    // bare reference's formula lives on must leave it untouched.
    #[test]
    fn transform_on_another_sheet_leaves_bare_reference_unshifted() {
        let mut sheets = SheetMapping::new();
        sheets.add_sheet("Sheet1", 1_048_576, 16_384).unwrap();
        sheets.add_sheet("Sheet2", 1_048_576, 16_384).unwrap();
        let mut svc = LazyAstTransformService::new();
        let ast = parse("=A5").unwrap();
        let id = svc.park(ast, 0);
        svc.record_transform(Transform {
            sheet: 1,
            kind: TransformKind::InsertRows { at: 2, count: 3 },
        });
        let materialized = svc.materialize(id, &sheets);
        match &materialized.node_type {
            ASTNodeType::Reference {
                reference: ReferenceType::Cell { row, .. },
                ..
            } => assert_eq!(*row, 4),
            other => panic!("expected an unshifted cell reference, got {other:?}"),
        }
    }

    // An explicit `Sheet2!A5` reference shifts when the transform targets
    // the sheet it names, regardless of which sheet the formula itself
    // lives on.
    #[test]
    fn transform_shifts_an_explicit_cross_sheet_reference() {
        let mut sheets = SheetMapping::new();
        sheets.add_sheet("Sheet1", 1_048_576, 16_384).unwrap();
        sheets.add_sheet("Sheet2", 1_048_576, 16_384).unwrap();
        let mut svc = LazyAstTransformService::new();
        let ast = parse("=Sheet2!A5").unwrap();
        let id = svc.park(ast, 0);
        svc.record_transform(Transform {
            sheet: 1,
            kind: TransformKind::InsertRows { at: 2, count: 3 },
        });
        let materialized = svc.materialize(id, &sheets);
        match &materialized.node_type {
            ASTNodeType::Reference {
                reference: ReferenceType::Cell { row, .. },
                ..
            } => assert_eq!(*row, 7),
            other => panic!("expected a shifted cell reference, got {other:?}"),
        }
    }
}
