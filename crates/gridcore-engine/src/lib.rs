//! The CORE: dependency graph, topological scheduler, cycle detection
//! under strict/tolerant policy, and a lazy AST transform service for
//! structural edits (row/column insert and remove).
//!
//! `Engine` (in [`engine`]) owns every piece; [`engine::operations::Operations`]
//! is the mutating surface, [`engine::graph_builder::GraphBuilder`] builds
//! a whole workbook from raw cell text in one call. The parser and
//! per-function interpreter are external collaborators by design (spec
//! §1's Non-goals) but a minimal implementation of both lives in
//! [`interpreter`] so the core is runnable on its own rather than only
//! describable.

pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod stats;

pub use config::{ArrayArithmeticMode, EngineConfig};
pub use content::{ArraySizePredictor, CellContentParser, ParsedContent};
pub use engine::cycle_detector::{self, Scc};
pub use engine::evaluator::Evaluator;
pub use engine::graph::DependencyGraph;
pub use engine::graph_builder::{GraphBuilder, SheetInput};
pub use engine::operations::{InverseCommand, Operations, UndoLog};
pub use engine::vertex::{NameScope, Vertex, VertexId, VertexKind};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use interpreter::functions::{Function, FunctionRegistry};
pub use interpreter::{ArgValue, EvaluationContext, Interpreter};
pub use stats::{LiveStatsRecorder, PassStats, StatsRecorder};

pub use gridcore_common::{CellAddress, CellError, CellRange, CellValue, ErrorKind, SheetId};
pub use gridcore_parse::{ASTNode, ASTNodeType, ReferenceType};
