//! The `CellValue` sum type (spec §3) and Excel-style NaN-vs-Error distinction.

use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::CellError;

/// A computed or literal cell value.
///
/// Numbers use IEEE-754 doubles. Equality and hashing follow spreadsheet
/// semantics rather than IEEE semantics: `Number(f64::NAN)` is a bit
/// pattern a formula can legitimately produce (e.g. via array math) and is
/// distinct from the explicit `Error` variant, which is how error
/// propagation is actually represented (spec §3, "Vertex kinds").
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Empty,
    Error(CellError),
    /// A rectangular array result (formula spill / range broadcast).
    Array(Vec<Vec<CellValue>>),
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            CellValue::Number(n) => n.to_bits().hash(state),
            CellValue::Text(s) => s.hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Empty => state.write_u8(0),
            CellValue::Error(e) => e.hash(state),
            CellValue::Array(rows) => rows.hash(state),
        }
    }
}

impl CellValue {
    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_error(&self) -> Option<&CellError> {
        match self {
            CellValue::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Coerce to a number the way formula arithmetic does: empty cells
    /// contribute zero, booleans contribute 0/1, text fails.
    pub fn coerce_number(&self) -> Result<f64, CellError> {
        match self {
            CellValue::Number(n) => Ok(*n),
            CellValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            CellValue::Empty => Ok(0.0),
            CellValue::Error(e) => Err(e.clone()),
            CellValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| CellError::new(crate::ErrorKind::Value)),
            CellValue::Array(rows) => rows
                .first()
                .and_then(|r| r.first())
                .map(CellValue::coerce_number)
                .unwrap_or(Ok(0.0)),
        }
    }

    pub fn coerce_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format!("{n}"),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Empty => String::new(),
            CellValue::Error(e) => e.kind.to_string(),
            CellValue::Array(rows) => rows
                .first()
                .and_then(|r| r.first())
                .map(CellValue::coerce_text)
                .unwrap_or_default(),
        }
    }

    pub fn coerce_bool(&self) -> Result<bool, CellError> {
        match self {
            CellValue::Bool(b) => Ok(*b),
            CellValue::Number(n) => Ok(*n != 0.0),
            CellValue::Empty => Ok(false),
            CellValue::Error(e) => Err(e.clone()),
            CellValue::Text(s) => match s.to_ascii_uppercase().as_str() {
                "TRUE" => Ok(true),
                "FALSE" => Ok(false),
                _ => Err(CellError::new(crate::ErrorKind::Value)),
            },
            CellValue::Array(rows) => rows
                .first()
                .and_then(|r| r.first())
                .map(CellValue::coerce_bool)
                .unwrap_or(Ok(false)),
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Empty => Ok(()),
            CellValue::Error(e) => write!(f, "{e}"),
            CellValue::Array(rows) => {
                if let Some(first) = rows.first().and_then(|r| r.first()) {
                    write!(f, "{first}")
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}
