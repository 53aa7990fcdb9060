//! The stable AST surface handed to the engine core (spec §3 invariant 2:
//! parked ASTs are immutable once produced, replaced atomically on rewrite).

use std::fmt::{self, Display};

use gridcore_common::CellValue;

/// A reference to something outside the current cell.
#[derive(Debug, Clone, PartialEq, Hash, Eq)]
pub enum ReferenceType {
    Cell {
        sheet: Option<String>,
        row: u32,
        col: u32,
    },
    Range {
        sheet: Option<String>,
        start_row: Option<u32>,
        start_col: Option<u32>,
        end_row: Option<u32>,
        end_col: Option<u32>,
    },
    Named(String),
}

impl Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceType::Cell { sheet, row, col } => {
                write_sheet_prefix(f, sheet)?;
                write!(f, "{}", col_letters(*col))?;
                write!(f, "{}", row + 1)
            }
            ReferenceType::Range {
                sheet,
                start_row,
                start_col,
                end_row,
                end_col,
            } => {
                write_sheet_prefix(f, sheet)?;
                write_bound(f, *start_col, *start_row)?;
                write!(f, ":")?;
                write_open_sheet_bound(f, *end_col, *end_row)
            }
            ReferenceType::Named(name) => write!(f, "{name}"),
        }
    }
}

fn write_sheet_prefix(f: &mut fmt::Formatter<'_>, sheet: &Option<String>) -> fmt::Result {
    if let Some(s) = sheet {
        if sheet_needs_quoting(s) {
            write!(f, "'{}'!", s.replace('\'', "''"))
        } else {
            write!(f, "{s}!")
        }
    } else {
        Ok(())
    }
}

fn write_bound(f: &mut fmt::Formatter<'_>, col: Option<u32>, row: Option<u32>) -> fmt::Result {
    match (col, row) {
        (Some(c), Some(r)) => write!(f, "{}{}", col_letters(c), r + 1),
        (Some(c), None) => write!(f, "{}", col_letters(c)),
        (None, Some(r)) => write!(f, "{}", r + 1),
        (None, None) => Ok(()),
    }
}

fn write_open_sheet_bound(f: &mut fmt::Formatter<'_>, col: Option<u32>, row: Option<u32>) -> fmt::Result {
    write_bound(f, col, row)
}

pub fn sheet_needs_quoting(name: &str) -> bool {
    !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
        || name.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
}

pub fn col_letters(mut col: u32) -> String {
    let mut s = Vec::new();
    loop {
        s.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    s.reverse();
    String::from_utf8(s).unwrap()
}

pub fn col_from_letters(letters: &str) -> u32 {
    let mut col: u32 = 0;
    for c in letters.chars() {
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    col - 1
}

#[derive(Debug, Clone, PartialEq)]
pub enum ASTNodeType {
    Literal(CellValue),
    Reference {
        original: String,
        reference: ReferenceType,
    },
    UnaryOp {
        op: String,
        expr: Box<ASTNode>,
    },
    BinaryOp {
        op: String,
        left: Box<ASTNode>,
        right: Box<ASTNode>,
    },
    Function {
        name: String,
        args: Vec<ASTNode>,
    },
    Array(Vec<Vec<ASTNode>>),
}

/// A parsed formula expression node.
///
/// `contains_volatile` is computed once at parse time so the engine can
/// classify a cell as a volatile vertex (spec GLOSSARY) without re-walking
/// the tree on every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ASTNode {
    pub node_type: ASTNodeType,
    pub contains_volatile: bool,
}

const VOLATILE_FUNCTIONS: &[&str] = &["NOW", "TODAY", "RAND", "RANDBETWEEN"];

impl ASTNode {
    pub fn new(node_type: ASTNodeType) -> Self {
        let contains_volatile = Self::compute_volatile(&node_type);
        Self {
            node_type,
            contains_volatile,
        }
    }

    fn compute_volatile(node_type: &ASTNodeType) -> bool {
        match node_type {
            ASTNodeType::Literal(_) | ASTNodeType::Reference { .. } => false,
            ASTNodeType::UnaryOp { expr, .. } => expr.contains_volatile,
            ASTNodeType::BinaryOp { left, right, .. } => {
                left.contains_volatile || right.contains_volatile
            }
            ASTNodeType::Function { name, args } => {
                VOLATILE_FUNCTIONS.contains(&name.to_ascii_uppercase().as_str())
                    || args.iter().any(|a| a.contains_volatile)
            }
            ASTNodeType::Array(rows) => rows
                .iter()
                .flatten()
                .any(|n| n.contains_volatile),
        }
    }

    /// Walk the tree collecting every reference in encounter order
    /// (used by the engine to extract dependency edges, spec §4.6 Phase B).
    pub fn collect_references<'a>(&'a self, out: &mut Vec<&'a ReferenceType>) {
        match &self.node_type {
            ASTNodeType::Literal(_) => {}
            ASTNodeType::Reference { reference, .. } => out.push(reference),
            ASTNodeType::UnaryOp { expr, .. } => expr.collect_references(out),
            ASTNodeType::BinaryOp { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            ASTNodeType::Function { args, .. } => {
                for a in args {
                    a.collect_references(out);
                }
            }
            ASTNodeType::Array(rows) => {
                for row in rows {
                    for n in row {
                        n.collect_references(out);
                    }
                }
            }
        }
    }
}

impl Display for ASTNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ASTNodeType::Literal(v) => write!(f, "Literal({v:?})"),
            ASTNodeType::Reference { reference, .. } => write!(f, "Reference({reference})"),
            ASTNodeType::UnaryOp { op, expr } => write!(f, "UnaryOp({op}, {expr:?})"),
            ASTNodeType::BinaryOp { op, left, right } => {
                write!(f, "BinaryOp({op}, {left:?}, {right:?})")
            }
            ASTNodeType::Function { name, args } => write!(f, "Function({name}, {args:?})"),
            ASTNodeType::Array(rows) => write!(f, "Array({rows:?})"),
        }
    }
}
