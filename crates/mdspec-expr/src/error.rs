//! Error types for expression compilation and evaluation.

use core::result::Result as CoreResult;

use regex::Error as RegexError;
use thiserror::Error;

/// Result type for expression operations.
pub type Result<T> = CoreResult<T, ExprError>;

/// Errors raised while compiling or evaluating an expression.
#[derive(Debug, Error)]
pub enum ExprError {
    /// The source text contains a character sequence that is not a token.
    #[error("Lex error at offset {offset}: {message}")]
    Lex {
        /// Byte offset into the source
        offset: usize,
        /// What went wrong
        message: String,
    },

    /// The token stream does not form a valid expression.
    #[error("Parse error at offset {offset}: {message}")]
    Parse {
        /// Byte offset into the source
        offset: usize,
        /// What went wrong
        message: String,
    },

    /// The expression refers to a variable outside the binding schema.
    #[error("Undeclared variable: {0}")]
    UndeclaredVariable(String),

    /// A variable was declared but no value was bound at evaluation time.
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    /// Member or index access on a missing key.
    #[error("No such key: {0}")]
    NoSuchKey(String),

    /// An operator or function received operands of the wrong type.
    #[error("Type error: {0}")]
    Type(String),

    /// Unknown function or method name.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Arithmetic overflow, division by zero, out-of-range index.
    #[error("Evaluation error: {0}")]
    Eval(String),

    /// A `matches` pattern failed to compile.
    #[error("Invalid regex: {0}")]
    Regex(#[from] RegexError),
}
