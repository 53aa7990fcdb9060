//! Operation-plane errors (spec §7): these abort the current API call and
//! leave the engine state untouched, as opposed to value-plane `CellError`s
//! which flow through formulas as data.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("sheet '{sheet}' exceeds configured size limit ({rows}x{cols} > {max_rows}x{max_cols})")]
    SheetSizeLimitExceeded {
        sheet: String,
        rows: u32,
        cols: u32,
        max_rows: u32,
        max_cols: u32,
    },

    #[error("invalid sheet '{0}'")]
    InvalidSheet(String),

    #[error("sheet '{0}' already exists")]
    DuplicateSheet(String),

    #[error("configuration option '{option}' has the wrong type: {detail}")]
    ConfigType { option: String, detail: String },

    #[error("named expression '{0}' is invalid: {1}")]
    NamedExpressionNameInvalid(String, String),

    #[error("named expression '{0}' is already defined in this scope")]
    DuplicateNamedExpression(String),

    #[error("named expression '{0}' is not defined")]
    UnknownNamedExpression(String),

    #[error("formula parse error: {0}")]
    ParseError(String),

    #[error("graph integrity violation: {0}")]
    GraphIntegrity(String),

    #[error("row/column index {0} is out of range")]
    IndexOutOfRange(u32),

    #[error("nothing to undo")]
    NothingToUndo,
}

pub type EngineResult<T> = Result<T, EngineError>;
