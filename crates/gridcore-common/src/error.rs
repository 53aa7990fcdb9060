//! Cell-level error representation.
//!
//! Two error planes exist in gridcore: this module is the *value* plane —
//! `CellError` values flow through formulas, propagate via the
//! interpreter, and participate in cycles. The *operation* plane
//! (`EngineError` in `gridcore-engine`) aborts an API call instead.

use std::fmt;

use crate::CellValue;

/// Canonical cell error codes observable at the boundary (spec §6).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Cycle,
    DivByZero,
    Value,
    Ref,
    Name,
    Num,
    Na,
    Error,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cycle => "#CYCLE!",
            Self::DivByZero => "#DIV/0!",
            Self::Value => "#VALUE!",
            Self::Ref => "#REF!",
            Self::Name => "#NAME?",
            Self::Num => "#NUM!",
            Self::Na => "#N/A",
            Self::Error => "#ERROR!",
        })
    }
}

impl ErrorKind {
    /// Parses a canonical Excel-style error code, e.g. `"#DIV/0!"`.
    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "#CYCLE!" => Self::Cycle,
            "#DIV/0!" => Self::DivByZero,
            "#VALUE!" => Self::Value,
            "#REF!" => Self::Ref,
            "#NAME?" => Self::Name,
            "#NUM!" => Self::Num,
            "#N/A" => Self::Na,
            "#ERROR!" | "#NULL!" => Self::Error,
            _ => return None,
        })
    }
}

/// A cell-level error: a kind plus an optional human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellError {
    pub kind: ErrorKind,
    pub detail: Option<String>,
}

impl CellError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<ErrorKind> for CellError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CellError {}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

impl From<ErrorKind> for CellValue {
    fn from(kind: ErrorKind) -> Self {
        CellValue::Error(CellError::new(kind))
    }
}
