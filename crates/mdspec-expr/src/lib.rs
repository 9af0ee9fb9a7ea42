//! Embedded boolean expression language for fixture validations.
//!
//! A small CEL-flavoured language evaluated over JSON values:
//! - [`lexer`] - Tokenizer
//! - [`parser`] - Recursive-descent parser producing [`ast::Expr`]
//! - [`eval`] - Tree-walking evaluator
//! - [`engine`] - The [`ExpressionEngine`] / [`Program`] seam used by callers
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        reason = "Allow for tests"
    )
)]

pub mod ast;
pub mod engine;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use engine::{BindingSchema, CelEngine, ExpressionEngine, Program};
pub use error::{ExprError, Result};
pub use eval::{Bindings, type_name};
