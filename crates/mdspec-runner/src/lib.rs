//! Execution side of the markdown fixture framework.
//!
//! Takes the fixture tree built by `mdspec-core` and runs it: an optional
//! shared build task, then every test concurrently under a bounded
//! scheduler, with results attached back onto the tree.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::indexing_slicing,
        reason = "Allow for tests"
    )
)]

/// Built-in fixture types and the default registry.
pub mod builtin;
/// Run configuration.
pub mod config;
/// Error types.
pub mod error;
/// The `exec` fixture type.
pub mod exec;
/// Dependency graph over scheduled tasks.
pub mod graph;
/// Tree execution and result aggregation.
pub mod orchestrator;
/// Child process helpers.
pub mod process;
/// Bounded-concurrency task scheduling.
pub mod scheduler;
/// Logging setup.
pub mod telemetry;

pub use builtin::{default_registry, register_builtin};
pub use config::RunConfig;
pub use error::{Result, RunError};
pub use exec::ExecFixtureType;
pub use graph::TaskGraph;
pub use orchestrator::{BUILD_TASK_NAME, Orchestrator, RunReport};
pub use process::{run_process, run_shell};
pub use scheduler::{TaskGroup, TaskId, TaskStatus};
pub use telemetry::{init_test_tracing, init_tracing};
