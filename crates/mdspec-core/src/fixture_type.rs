use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use mdspec_expr::{CelEngine, ExpressionEngine};

use crate::error::Result;
use crate::fixture::FixtureTest;
use crate::result::FixtureResult;

/// Settings shared by every fixture in a run.
#[derive(Clone)]
pub struct RunOptions {
    /// Fallback working directory for fixtures without a source directory
    pub working_dir: PathBuf,
    /// Emit per-fixture diagnostics
    pub verbose: bool,
    /// Bypass any result caching a fixture type keeps
    pub no_cache: bool,
    /// Engine used to compile validation expressions
    pub engine: Arc<dyn ExpressionEngine>,
    /// Host binary exposed to fixtures as `{{executable}}`
    pub executable: Option<PathBuf>,
    /// Free-form settings for custom fixture types
    pub extra: BTreeMap<String, String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            verbose: false,
            no_cache: false,
            engine: Arc::new(CelEngine::new()),
            executable: None,
            extra: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RunOptions")
            .field("working_dir", &self.working_dir)
            .field("verbose", &self.verbose)
            .field("no_cache", &self.no_cache)
            .field("engine", &self.engine.name())
            .field("executable", &self.executable)
            .field("extra", &self.extra)
            .finish()
    }
}

/// A kind of fixture the runner knows how to execute.
///
/// Implementations never fail the run: every problem becomes a
/// [`FixtureResult`] with `Error` or `Fail` status. Cancellation happens by
/// dropping the future returned from [`run`](Self::run).
#[async_trait]
pub trait FixtureType: Send + Sync {
    /// Unique registry key.
    fn name(&self) -> &'static str;

    /// Execute the fixture and judge its output.
    async fn run(&self, test: &FixtureTest, options: &RunOptions) -> FixtureResult;

    /// Check the fixture definition before it is scheduled.
    ///
    /// # Errors
    ///
    /// Returns `FixtureError::InvalidFixture` when a required field is missing.
    fn validate_fixture(&self, test: &FixtureTest) -> Result<()>;

    /// Fields a fixture of this type must set.
    fn required_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Fields a fixture of this type may set.
    fn optional_fields(&self) -> &'static [&'static str] {
        &[]
    }
}
