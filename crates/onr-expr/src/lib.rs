//! The two tiny, total grammars the DSL builds on: string expressions
//! (`literal | var | concat(...)`) and restricted JSONPath (write paths with
//! no indices; read paths with one `[n]`/`[*]` suffix per segment), plus the
//! restricted arithmetic grammar used for custom usage extraction.
//!
//! Every syntactic form here has a defined result, including the error
//! branches, so evaluating one of these expressions can never panic on
//! request data.

pub mod expr;
pub mod path;
pub mod usage_expr;

pub use expr::{EvalCtx, Expr, ExprError, Var};
pub use path::{PathError, PathSeg, ReadPath, WritePath};
pub use usage_expr::{UsageExpr, UsageExprError};
