//! Markdown-embedded test fixtures.
//!
//! This crate turns markdown documents into a tree of executable fixtures and
//! judges their output:
//! - Front-matter and block-local YAML overrides
//! - Structural parsing of tables, `command:` blocks and standalone fences
//! - The validation-list DSL compiled to boolean expressions
//! - Glob expansion of fixtures across files
//! - The fixture type trait and registry used for dispatch
//! - The expectation evaluator
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

/// Markdown event stream flattened to blocks.
pub mod blocks;
/// Error types.
pub mod error;
/// Expectation checks and validation expressions.
pub mod evaluator;
/// Expansion across the `files` glob.
pub mod expand;
/// Fixture definitions.
pub mod fixture;
/// Fixture type trait and run options.
pub mod fixture_type;
/// Front-matter parsing.
pub mod frontmatter;
/// Fence languages and how to run them.
pub mod language;
/// Reading documents from disk.
pub mod loader;
/// The fixture tree.
pub mod node;
/// Structural parser.
pub mod parser;
/// Fixture type registry.
pub mod registry;
/// Execution outcomes.
pub mod result;
/// Table rows as fixtures.
pub mod table;
/// Validation-list DSL.
pub mod validation;

pub use error::{FixtureError, Result};
pub use evaluator::{ExpressionOutcome, evaluate};
pub use expand::{expand_tests, expand_tree};
pub use fixture::{Expectations, FixtureTest};
pub use fixture_type::{FixtureType, RunOptions};
pub use frontmatter::{BlockFrontMatter, FrontMatter, split_front_matter};
pub use loader::{discover, load_file, load_suite};
pub use node::{FixtureNode, NodeId, NodeKind, Stats};
pub use parser::{parse, parse_document};
pub use registry::{EXEC_TYPE, FixtureTypeRegistry, QUERY_TYPE};
pub use result::{FixtureResult, ProcessOutput, Status, TempFile};
