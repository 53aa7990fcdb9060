//! Engine-wide configuration (spec §6). Construction-time only: changing
//! any field requires `rebuild_with_config`, never a live mutation, since
//! several options (dense/sparse choice, max extents) are baked into the
//! address mapping at sheet-creation time.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use gridcore_common::CellValue;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// When `true`, cycles evaluate under the tolerant (seeded) policy
    /// instead of flooding every cycle member with `#CYCLE!`.
    pub allow_circular_references: bool,
    /// Per-sheet seed matrix tolerant-mode cycles read from on their first
    /// pass, keyed by sheet name rather than `SheetId` since the map is
    /// supplied before sheets are built and ids aren't known yet.
    pub initial_computed_values: HashMap<String, Vec<Vec<CellValue>>>,
    pub max_rows: u32,
    pub max_columns: u32,
    /// Whether to record `StatsRecorder` timings; off by default since the
    /// live recorder allocates a histogram per tracked operation.
    pub use_stats: bool,
    pub date_format: String,
    pub currency_symbol: String,
    pub locale: String,
    pub function_arg_separator: char,
    pub accent_sensitive: bool,
    pub array_arithmetic_mode: ArrayArithmeticMode,
    pub ignore_whitespace: bool,
    pub null_to_zero: bool,
    /// Excel's leap-year-1900 bug, kept as a compatibility toggle since
    /// some imported workbooks depend on it for date arithmetic.
    pub leap_year_1900: bool,
    pub null_date: (i32, u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ArrayArithmeticMode {
    #[default]
    Disabled,
    Enabled,
    AlwaysArray,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            allow_circular_references: false,
            initial_computed_values: HashMap::new(),
            max_rows: 1_048_576,
            max_columns: 16_384,
            use_stats: false,
            date_format: "DD/MM/YYYY".to_string(),
            currency_symbol: "$".to_string(),
            locale: "en-US".to_string(),
            function_arg_separator: ',',
            accent_sensitive: true,
            array_arithmetic_mode: ArrayArithmeticMode::Disabled,
            ignore_whitespace: true,
            null_to_zero: false,
            leap_year_1900: true,
            null_date: (1899, 12, 30),
        }
    }
}
