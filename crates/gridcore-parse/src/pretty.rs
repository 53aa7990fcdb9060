//! Unparser: renders an `ASTNode` back to canonical formula text.
//!
//! `unparse(parse(s)) == canonical(s)` is the round-trip property (spec
//! §8, I4); canonical form normalizes whitespace and reference casing but
//! preserves operator choice and argument order.

use gridcore_common::CellValue;

use crate::ast::{ASTNode, ASTNodeType};

pub fn unparse(node: &ASTNode) -> String {
    format!("={}", render(node, 0))
}

/// Returns this node's binding precedence: higher binds tighter. Matches
/// the grammar in `parser.rs`.
fn precedence_of(op: &str, is_binary: bool) -> u8 {
    if !is_binary {
        return match op {
            "%" => 6,
            _ => 4, // unary +/-
        };
    }
    match op {
        "=" | "<>" | ">" | "<" | ">=" | "<=" => 0,
        "&" => 1,
        "+" | "-" => 2,
        "*" | "/" => 3,
        "^" => 5,
        _ => 0,
    }
}

fn render(node: &ASTNode, parent_prec: u8) -> String {
    match &node.node_type {
        ASTNodeType::Literal(v) => render_literal(v),
        ASTNodeType::Reference { reference, .. } => reference.to_string(),
        ASTNodeType::UnaryOp { op, expr } => {
            let prec = precedence_of(op, false);
            let inner = render(expr, prec);
            if op == "%" {
                format!("{inner}%")
            } else {
                format!("{op}{inner}")
            }
        }
        ASTNodeType::BinaryOp { op, left, right } => {
            let prec = precedence_of(op, true);
            let right_prec = if op == "^" { prec } else { prec + 1 };
            let l = render(left, prec);
            let r = render(right, right_prec);
            let rendered = format!("{l}{op}{r}");
            if prec < parent_prec {
                format!("({rendered})")
            } else {
                rendered
            }
        }
        ASTNodeType::Function { name, args } => {
            let rendered_args: Vec<String> = args.iter().map(|a| render(a, 0)).collect();
            format!("{}({})", name.to_ascii_uppercase(), rendered_args.join(","))
        }
        ASTNodeType::Array(rows) => {
            let rendered_rows: Vec<String> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|n| render(n, 0))
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .collect();
            format!("{{{}}}", rendered_rows.join(";"))
        }
    }
}

fn render_literal(v: &CellValue) -> String {
    match v {
        CellValue::Number(n) => format!("{n}"),
        CellValue::Text(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        CellValue::Empty => String::new(),
        CellValue::Error(e) => e.kind.to_string(),
        CellValue::Array(_) => String::new(),
    }
}
