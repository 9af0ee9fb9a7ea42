//! Runs a fixture tree: one optional shared build task, one task per test,
//! then a single pass that attaches results, rolls up stats and prunes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mdspec_core::{
    FixtureNode, FixtureResult, FixtureTest, FixtureTypeRegistry, NodeId, RunOptions, Stats, Status,
};
use mdspec_expr::{CelEngine, ExpressionEngine};
use serde::{Deserialize, Serialize};

use crate::builtin::default_registry;
use crate::config::RunConfig;
use crate::error::Result;
use crate::process::run_shell;
use crate::scheduler::{TaskGroup, TaskId, TaskStatus};

/// Name under which the shared build step is reported.
pub const BUILD_TASK_NAME: &str = "build";

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Root statistics after aggregation
    pub stats: Stats,
    /// The shared build step, when the documents declared one
    pub build: Option<FixtureResult>,
}

impl RunReport {
    /// Whether the build (if any) passed and no test failed
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.stats.has_failures() && self.build.as_ref().is_none_or(FixtureResult::passed)
    }

    /// Whether the shared build step failed
    #[must_use]
    pub fn build_failed(&self) -> bool {
        self.build.as_ref().is_some_and(|build| !build.passed())
    }
}

/// The shared build step declared in front-matter.
#[derive(Debug, Clone)]
struct BuildStep {
    command: String,
    working_dir: PathBuf,
    env: std::collections::BTreeMap<String, String>,
}

/// Where a test task's result goes.
struct TestSlot {
    node: NodeId,
    name: String,
}

/// Schedules fixture trees and folds results back into them.
pub struct Orchestrator {
    registry: Arc<FixtureTypeRegistry>,
    config: RunConfig,
    engine: Arc<dyn ExpressionEngine>,
}

impl Orchestrator {
    /// Orchestrator over the default registry and the CEL engine
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            registry: default_registry(),
            config,
            engine: Arc::new(CelEngine::new()),
        }
    }

    /// Use an isolated registry
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<FixtureTypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Use another expression engine
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn ExpressionEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Run configuration in effect
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute every test in `tree` and attach the results to it.
    ///
    /// Build failure is reported in [`RunReport::build`]; the tests that
    /// depended on it are attached as skipped.
    ///
    /// # Errors
    /// Returns an error only if the scheduler itself fails.
    pub async fn run(&self, tree: &mut FixtureNode) -> Result<RunReport> {
        let options = self.config.run_options(Arc::clone(&self.engine));
        let mut group: TaskGroup<FixtureResult> =
            TaskGroup::new(self.config.max_concurrent, self.config.default_timeout());

        let build_task = find_build_step(tree).map(|step| {
            tracing::info!(command = %step.command, "scheduling shared build");
            group.add(
                BUILD_TASK_NAME,
                &[],
                Some(self.config.build_timeout()),
                run_build(step),
            )
        });
        let dependencies: Vec<TaskId> = build_task.into_iter().collect();

        let mut slots: HashMap<TaskId, TestSlot> = HashMap::new();
        for node in tree.tests() {
            let Some(test) = node.test.clone() else {
                continue;
            };
            let slot = TestSlot {
                node: node.id,
                name: test.name.clone(),
            };
            let task_timeout = test.timeout;
            let task = group.add(
                test.name.clone(),
                &dependencies,
                task_timeout,
                run_test(Arc::clone(&self.registry), test, options.clone()),
            );
            slots.insert(task, slot);
        }
        tracing::info!(tests = slots.len(), "scheduled fixtures");

        let mut statuses = group.wait().await?;

        let build = build_task
            .and_then(|task| statuses.remove(&task))
            .map(|status| status_to_result(BUILD_TASK_NAME, status));
        if let Some(build) = build.as_ref().filter(|build| !build.passed()) {
            tracing::warn!(message = %build.message, "shared build failed, tests skipped");
        }

        let mut results: HashMap<NodeId, FixtureResult> = slots
            .into_iter()
            .map(|(task, slot)| {
                let result = statuses.remove(&task).map_or_else(
                    || FixtureResult::error(&slot.name, "scheduler returned no result"),
                    |status| status_to_result(&slot.name, status),
                );
                (slot.node, result)
            })
            .collect();

        tree.for_each_test_mut(&mut |node| {
            if let Some(result) = results.remove(&node.id) {
                tracing::debug!(test = %node.name, status = %result.status, "attaching result");
                node.attach_result(result);
            }
        });

        let stats = tree.compute_stats();
        tree.prune_empty_sections();
        tracing::info!(
            total = stats.total,
            passed = stats.passed,
            failed = stats.failed,
            skipped = stats.skipped,
            "run finished"
        );

        Ok(RunReport { stats, build })
    }
}

/// The first non-empty `build` command across the tree's tests, in document order.
fn find_build_step(tree: &FixtureNode) -> Option<BuildStep> {
    tree.tests().into_iter().find_map(|node| {
        let test = node.test.as_ref()?;
        let command = test.front_matter.build.trim();
        (!command.is_empty()).then(|| BuildStep {
            command: command.to_owned(),
            working_dir: build_dir(&test.source_dir, &test.front_matter.cwd),
            env: test.front_matter.env.clone(),
        })
    })
}

/// The document's directory joined with its front-matter `cwd`.
fn build_dir(source_dir: &Path, cwd: &str) -> PathBuf {
    let base = if source_dir.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        source_dir.to_path_buf()
    };
    let cwd = cwd.trim();
    if cwd.is_empty() {
        base
    } else {
        base.join(cwd)
    }
}

async fn run_build(step: BuildStep) -> core::result::Result<FixtureResult, String> {
    let output = run_shell(&step.command, &step.working_dir, &step.env)
        .await
        .map_err(|err| format!("failed to run build `{}`: {err}", step.command))?;

    if output.exit_code != 0 {
        return Err(format!(
            "build `{}` exited with code {}: {}",
            step.command,
            output.exit_code,
            output.stderr.trim()
        ));
    }

    let mut result = FixtureResult::pass(BUILD_TASK_NAME);
    result.command = output.command;
    result.stdout = output.stdout;
    result.stderr = output.stderr;
    result.exit_code = Some(output.exit_code);
    result.duration = output.duration;
    Ok(result)
}

async fn run_test(
    registry: Arc<FixtureTypeRegistry>,
    test: FixtureTest,
    options: RunOptions,
) -> core::result::Result<FixtureResult, String> {
    let fixture_type = match registry.get_for_fixture(&test) {
        Ok(fixture_type) => fixture_type,
        Err(err) => {
            tracing::warn!(test = %test.name, error = %err, "dispatch failed");
            return Ok(FixtureResult::error(&test.name, err.to_string()));
        }
    };

    if let Err(err) = fixture_type.validate_fixture(&test) {
        return Ok(FixtureResult::error(&test.name, err.to_string()));
    }

    tracing::debug!(test = %test.name, fixture_type = fixture_type.name(), "running fixture");
    Ok(fixture_type.run(&test, &options).await)
}

fn status_to_result(name: &str, status: TaskStatus<FixtureResult>) -> FixtureResult {
    match status {
        TaskStatus::Completed(result) => result,
        TaskStatus::Failed(message) => {
            let mut result = FixtureResult::fail(name, message);
            if name != BUILD_TASK_NAME {
                result.status = Status::Error;
            }
            result
        }
        TaskStatus::TimedOut(limit) => {
            FixtureResult::error(name, format!("timed out after {}s", limit.as_secs_f64()))
        }
        TaskStatus::Skipped { .. } => FixtureResult::skip(name, "skipped: build failed"),
        TaskStatus::Panicked(message) => {
            FixtureResult::error(name, format!("fixture panicked: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_status_to_result() {
        let skipped = status_to_result(
            "t",
            TaskStatus::Skipped {
                dependency: TaskId::new(),
            },
        );
        assert_eq!(skipped.status, Status::Skip);
        assert_eq!(skipped.message, "skipped: build failed");

        let timed_out = status_to_result("t", TaskStatus::TimedOut(Duration::from_millis(1500)));
        assert_eq!(timed_out.status, Status::Error);
        assert_eq!(timed_out.message, "timed out after 1.5s");

        let build = status_to_result(BUILD_TASK_NAME, TaskStatus::Failed("exit 1".to_owned()));
        assert_eq!(build.status, Status::Fail);
    }

    #[test]
    fn test_report_success() {
        let mut stats = Stats::default();
        stats.record(Status::Pass);
        let report = RunReport {
            stats,
            build: Some(FixtureResult::fail(BUILD_TASK_NAME, "boom")),
        };
        assert!(!report.succeeded());
        assert!(report.build_failed());

        let clean = RunReport { stats, build: None };
        assert!(clean.succeeded());
    }

    #[test]
    fn test_find_build_step_first_wins() {
        let mut first = FixtureTest::default();
        first.front_matter.build = "make one".to_owned();
        let mut second = FixtureTest::default();
        second.front_matter.build = "make two".to_owned();

        let mut root = FixtureNode::file("suite");
        root.children.push(FixtureNode::test(FixtureTest::default()));
        root.children.push(FixtureNode::test(first));
        root.children.push(FixtureNode::test(second));

        let step = find_build_step(&root).expect("build step");
        assert_eq!(step.command, "make one");
    }

    #[test]
    fn test_build_dir_honours_front_matter_cwd() {
        assert_eq!(build_dir(Path::new("/docs"), ""), PathBuf::from("/docs"));
        assert_eq!(build_dir(Path::new("/docs"), " app "), PathBuf::from("/docs/app"));
        assert_eq!(build_dir(Path::new(""), "app"), PathBuf::from("./app"));
        assert_eq!(build_dir(Path::new("/docs"), "/abs"), PathBuf::from("/abs"));
    }
}
