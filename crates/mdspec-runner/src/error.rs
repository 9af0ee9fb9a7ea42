use core::result::Result as CoreResult;
use std::io::Error as IoError;

use mdspec_core::FixtureError;
use thiserror::Error;
use toml::de::Error as TomlDeError;
use toml::ser::Error as TomlSerError;

use crate::scheduler::TaskId;

/// Result type for running fixture trees.
pub type Result<T> = CoreResult<T, RunError>;

/// Errors that abort a whole run. Individual fixture failures are results,
/// never errors.
#[derive(Debug, Error)]
pub enum RunError {
    /// Loading or dispatch failed.
    #[error("Fixture error: {0}")]
    Fixture(#[from] FixtureError),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// The configuration file could not be parsed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] TomlDeError),

    /// The configuration could not be serialized.
    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] TomlSerError),

    /// The task graph contains a cycle.
    #[error("Cyclic dependency detected in task graph")]
    CyclicDependency,

    /// A task depends on a task that was never added.
    #[error("Task depends on unknown task {0}")]
    UnknownDependency(TaskId),

    /// A worker could not be joined.
    #[error("Task execution failed: {0}")]
    ExecutionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            RunError::CyclicDependency.to_string(),
            "Cyclic dependency detected in task graph"
        );
        let error: RunError = FixtureError::UnknownFixtureShape("row 1".to_owned()).into();
        assert_eq!(
            error.to_string(),
            "Fixture error: Unable to determine fixture type for row 1"
        );
    }
}
