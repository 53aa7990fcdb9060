//! Raw cell text classification (spec L-series "content" stage): turns the
//! string a caller hands to `set_cell_contents` into either a literal
//! `CellValue` or a formula string, before the graph builder ever sees it.

use gridcore_common::{CellError, CellValue, ErrorKind};
use gridcore_parse::ASTNode;

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedContent {
    Value(CellValue),
    Formula(String),
    Empty,
}

pub struct CellContentParser;

impl CellContentParser {
    pub fn classify(raw: &str) -> ParsedContent {
        if raw.is_empty() {
            return ParsedContent::Empty;
        }
        if let Some(rest) = raw.strip_prefix('=') {
            if rest.is_empty() {
                return ParsedContent::Value(CellValue::Text(raw.to_string()));
            }
            return ParsedContent::Formula(rest.to_string());
        }
        if let Some(kind) = ErrorKind::from_code(raw) {
            return ParsedContent::Value(CellValue::Error(CellError::new(kind)));
        }
        if raw.eq_ignore_ascii_case("true") {
            return ParsedContent::Value(CellValue::Bool(true));
        }
        if raw.eq_ignore_ascii_case("false") {
            return ParsedContent::Value(CellValue::Bool(false));
        }
        if let Ok(n) = raw.parse::<f64>() {
            return ParsedContent::Value(CellValue::Number(n));
        }
        ParsedContent::Value(CellValue::Text(raw.to_string()))
    }
}

/// Conservative upper bound on a formula's result shape, used by the graph
/// builder to size `ArrayCell` vertices before the formula ever runs.
/// Only reference spans and array literals are known statically; anything
/// else predicts a scalar, and the evaluator may still spill a larger
/// result at eval time (tracked separately, not modeled here).
pub struct ArraySizePredictor;

impl ArraySizePredictor {
    pub fn predict(ast: &ASTNode, max_rows: u32, max_cols: u32) -> (u32, u32) {
        use gridcore_parse::ASTNodeType;
        match &ast.node_type {
            ASTNodeType::Reference { reference, .. } => {
                if let gridcore_parse::ReferenceType::Range {
                    start_row,
                    start_col,
                    end_row,
                    end_col,
                    ..
                } = reference
                {
                    let (sr, sc) = (start_row.unwrap_or(0), start_col.unwrap_or(0));
                    let (er, ec) = (end_row.unwrap_or(max_rows - 1), end_col.unwrap_or(max_cols - 1));
                    (er.saturating_sub(sr) + 1, ec.saturating_sub(sc) + 1)
                } else {
                    (1, 1)
                }
            }
            ASTNodeType::Array(rows) => {
                let r = rows.len() as u32;
                let c = rows.first().map(|row| row.len()).unwrap_or(0) as u32;
                (r.max(1), c.max(1))
            }
            _ => (1, 1),
        }
    }
}
