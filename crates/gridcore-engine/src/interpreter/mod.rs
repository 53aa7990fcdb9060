//! AST evaluation (spec §4, the interpreter the evaluator drives per
//! vertex). `EvaluationContext` is the seam between "how do I read a cell"
//! (the graph's concern) and "what does this formula compute" (this
//! module's concern) — the evaluator supplies a context backed by the
//! live graph; tests can supply a stub.

pub mod functions;

use gridcore_common::{CellAddress, CellError, CellRange, CellValue, ErrorKind};
use gridcore_parse::{ASTNode, ASTNodeType, ReferenceType};

use functions::FunctionRegistry;

/// What a formula can read while it evaluates. Implemented by the engine
/// for the live graph; vertices it reads from must already hold their
/// settled value for this pass (the evaluator guarantees this by walking
/// SCCs in topological order before calling in here).
pub trait EvaluationContext {
    fn get_cell(&self, addr: CellAddress) -> CellValue;
    fn get_range(&self, range: CellRange) -> Vec<Vec<CellValue>>;
    fn get_named(&self, name: &str) -> Option<CellValue>;
    fn resolve_sheet(&self, name: &str) -> Option<gridcore_common::SheetId>;
    /// The sheet the formula being evaluated lives on, for unqualified
    /// references.
    fn current_sheet(&self) -> gridcore_common::SheetId;
    fn now(&mut self) -> f64;
    fn random(&mut self) -> f64;
}

pub struct Interpreter<'a> {
    registry: &'a FunctionRegistry,
}

impl<'a> Interpreter<'a> {
    pub fn new(registry: &'a FunctionRegistry) -> Self {
        Interpreter { registry }
    }

    pub fn evaluate(&self, ast: &ASTNode, ctx: &mut dyn EvaluationContext) -> CellValue {
        match &ast.node_type {
            ASTNodeType::Literal(v) => v.clone(),
            ASTNodeType::Reference { reference, .. } => self.evaluate_reference(reference, ctx),
            ASTNodeType::UnaryOp { op, expr } => {
                let v = self.evaluate(expr, ctx);
                if let CellValue::Error(_) = v {
                    return v;
                }
                match op.as_str() {
                    "-" => match v.coerce_number() {
                        Ok(n) => CellValue::Number(-n),
                        Err(e) => CellValue::Error(e),
                    },
                    "+" => match v.coerce_number() {
                        Ok(n) => CellValue::Number(n),
                        Err(e) => CellValue::Error(e),
                    },
                    "%" => match v.coerce_number() {
                        Ok(n) => CellValue::Number(n / 100.0),
                        Err(e) => CellValue::Error(e),
                    },
                    other => CellValue::Error(CellError::new(ErrorKind::Error).with_detail(format!("unknown unary operator '{other}'"))),
                }
            }
            ASTNodeType::BinaryOp { op, left, right } => {
                let l = self.evaluate(left, ctx);
                let r = self.evaluate(right, ctx);
                self.apply_binary(op, l, r)
            }
            ASTNodeType::Function { name, args } => {
                let arg_values: Vec<ArgValue> = args
                    .iter()
                    .map(|a| ArgValue::from_ast(self, a, ctx))
                    .collect();
                match self.registry.get(name) {
                    Some(f) => f.call(&arg_values, ctx),
                    None => CellValue::Error(CellError::new(ErrorKind::Name).with_detail(name.clone())),
                }
            }
            ASTNodeType::Array(rows) => {
                let values: Vec<Vec<CellValue>> = rows
                    .iter()
                    .map(|row| row.iter().map(|n| self.evaluate(n, ctx)).collect())
                    .collect();
                values
                    .first()
                    .and_then(|r| r.first())
                    .cloned()
                    .unwrap_or(CellValue::Empty)
            }
        }
    }

    fn evaluate_reference(&self, reference: &ReferenceType, ctx: &mut dyn EvaluationContext) -> CellValue {
        match reference {
            ReferenceType::Cell { sheet, row, col } => {
                let sheet_id = match sheet {
                    Some(name) => match ctx.resolve_sheet(name) {
                        Some(id) => id,
                        None => return CellValue::Error(CellError::new(ErrorKind::Ref)),
                    },
                    None => ctx.current_sheet(),
                };
                ctx.get_cell(CellAddress::new(sheet_id, *row, *col))
            }
            ReferenceType::Range { .. } => {
                // A bare range in scalar position collapses to its
                // top-left cell (Excel's implicit-intersection rule).
                let grid = self.evaluate_range(reference, ctx);
                grid.first().and_then(|r| r.first()).cloned().unwrap_or(CellValue::Empty)
            }
            ReferenceType::Named(name) => ctx
                .get_named(name)
                .unwrap_or_else(|| CellValue::Error(CellError::new(ErrorKind::Name).with_detail(name.clone()))),
        }
    }

    fn evaluate_range(&self, reference: &ReferenceType, ctx: &mut dyn EvaluationContext) -> Vec<Vec<CellValue>> {
        if let ReferenceType::Range {
            sheet,
            start_row,
            start_col,
            end_row,
            end_col,
        } = reference
        {
            let sheet_id = match sheet {
                Some(name) => match ctx.resolve_sheet(name) {
                    Some(id) => id,
                    None => return vec![vec![CellValue::Error(CellError::new(ErrorKind::Ref))]],
                },
                None => ctx.current_sheet(),
            };
            let range = CellRange {
                sheet: sheet_id,
                start_row: *start_row,
                start_col: *start_col,
                end_row: *end_row,
                end_col: *end_col,
            };
            ctx.get_range(range)
        } else {
            Vec::new()
        }
    }

    fn apply_binary(&self, op: &str, l: CellValue, r: CellValue) -> CellValue {
        if let CellValue::Error(_) = l {
            return l;
        }
        if let CellValue::Error(_) = r {
            return r;
        }
        match op {
            "&" => CellValue::Text(format!("{}{}", l.coerce_text(), r.coerce_text())),
            "=" | "<>" | ">" | "<" | ">=" | "<=" => CellValue::Bool(compare(op, &l, &r)),
            "+" | "-" | "*" | "/" | "^" => {
                let (a, b) = match (l.coerce_number(), r.coerce_number()) {
                    (Ok(a), Ok(b)) => (a, b),
                    (Err(e), _) | (_, Err(e)) => return CellValue::Error(e),
                };
                match op {
                    "+" => CellValue::Number(a + b),
                    "-" => CellValue::Number(a - b),
                    "*" => CellValue::Number(a * b),
                    "/" => {
                        if b == 0.0 {
                            CellValue::Error(CellError::new(ErrorKind::DivByZero))
                        } else {
                            CellValue::Number(a / b)
                        }
                    }
                    "^" => CellValue::Number(a.powf(b)),
                    _ => unreachable!(),
                }
            }
            other => CellValue::Error(CellError::new(ErrorKind::Error).with_detail(format!("unknown operator '{other}'"))),
        }
    }
}

fn compare(op: &str, l: &CellValue, r: &CellValue) -> bool {
    use std::cmp::Ordering;
    let ordering = match (l, r) {
        (CellValue::Number(a), CellValue::Number(b)) => a.partial_cmp(b),
        (CellValue::Text(a), CellValue::Text(b)) => Some(a.to_ascii_uppercase().cmp(&b.to_ascii_uppercase())),
        (CellValue::Bool(a), CellValue::Bool(b)) => Some(a.cmp(b)),
        (CellValue::Empty, CellValue::Empty) => Some(Ordering::Equal),
        // Mixed-type comparisons: Excel orders Number < Text < Bool < Empty-is-least.
        (a, b) => Some(type_rank(a).cmp(&type_rank(b))),
    };
    let Some(ordering) = ordering else {
        return matches!(op, "<>");
    };
    match op {
        "=" => ordering == Ordering::Equal,
        "<>" => ordering != Ordering::Equal,
        ">" => ordering == Ordering::Greater,
        "<" => ordering == Ordering::Less,
        ">=" => ordering != Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        _ => false,
    }
}

fn type_rank(v: &CellValue) -> u8 {
    match v {
        CellValue::Empty => 0,
        CellValue::Number(_) => 1,
        CellValue::Text(_) => 2,
        CellValue::Bool(_) => 3,
        CellValue::Error(_) => 4,
        CellValue::Array(_) => 5,
    }
}

/// An evaluated argument: functions that reduce over ranges (`SUM`,
/// `AVERAGE`, `COUNT`) need the grid shape, not just a collapsed scalar.
pub enum ArgValue {
    Scalar(CellValue),
    Grid(Vec<Vec<CellValue>>),
}

impl ArgValue {
    fn from_ast(interp: &Interpreter, ast: &ASTNode, ctx: &mut dyn EvaluationContext) -> Self {
        if let ASTNodeType::Reference {
            reference: reference @ ReferenceType::Range { .. },
            ..
        } = &ast.node_type
        {
            ArgValue::Grid(interp.evaluate_range(reference, ctx))
        } else {
            ArgValue::Scalar(interp.evaluate(ast, ctx))
        }
    }

    pub fn flatten(&self) -> Vec<CellValue> {
        match self {
            ArgValue::Scalar(v) => vec![v.clone()],
            ArgValue::Grid(rows) => rows.iter().flatten().cloned().collect(),
        }
    }

    pub fn scalar(&self) -> CellValue {
        match self {
            ArgValue::Scalar(v) => v.clone(),
            ArgValue::Grid(rows) => rows.first().and_then(|r| r.first()).cloned().unwrap_or(CellValue::Empty),
        }
    }
}
