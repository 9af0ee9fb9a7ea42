use core::result::Result as CoreResult;
use std::io::Error as IoError;
use std::path::PathBuf;

use glob::{GlobError, PatternError};
use mdspec_expr::ExprError;
use serde_yaml::Error as YamlError;
use thiserror::Error;

/// Result type for fixture loading, parsing and dispatch.
pub type Result<T> = CoreResult<T, FixtureError>;

/// Errors raised while loading, parsing, expanding or dispatching fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// Front-matter or block-local YAML is malformed.
    #[error("YAML error: {0}")]
    Yaml(#[from] YamlError),

    /// The opening `---` has no matching closing delimiter.
    #[error("Unterminated front-matter in {}", .0.display())]
    UnterminatedFrontMatter(PathBuf),

    /// The `files` glob could not be compiled.
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(#[from] PatternError),

    /// A path matched by the glob could not be read.
    #[error("Glob iteration failed: {0}")]
    Glob(#[from] GlobError),

    /// A duration string such as `30s` could not be parsed.
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// An expression failed to compile.
    #[error("Expression error: {0}")]
    Expression(#[from] ExprError),

    /// A fixture type with the same name is already registered.
    #[error("Fixture type already registered: {0}")]
    DuplicateFixtureType(String),

    /// The fixture needs a type that is not registered.
    #[error("Fixture type \"{type_name}\" is not registered (fixture: {fixture})")]
    UnregisteredFixtureType {
        /// Name of the missing type
        type_name: String,
        /// Name of the fixture that needed it
        fixture: String,
    },

    /// Neither a query nor an exec command is present.
    #[error("Unable to determine fixture type for {0}")]
    UnknownFixtureShape(String),

    /// A fixture type rejected the fixture definition.
    #[error("Invalid fixture {fixture}: {message}")]
    InvalidFixture {
        /// Fixture name
        fixture: String,
        /// Reason given by the fixture type
        message: String,
    },
}
