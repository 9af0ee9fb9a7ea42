//! The built-in `exec` fixture type: runs a program and judges its output.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mdspec_core::fixture::render_template;
use mdspec_core::{
    EXEC_TYPE, FixtureError, FixtureResult, FixtureTest, FixtureType, RunOptions, Status, TempFile,
    evaluate,
};

use crate::process::run_process;

/// Template variable holding the host executable path.
const EXECUTABLE_VAR: &str = "executable";

/// Runs `exec` with `args` as a child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecFixtureType;

impl ExecFixtureType {
    /// Template variables for `test`, plus `executable` when configured.
    fn template_vars(test: &FixtureTest, options: &RunOptions) -> BTreeMap<String, String> {
        let mut vars = test.template_vars.clone();
        if let Some(executable) = &options.executable {
            vars.entry(EXECUTABLE_VAR.to_owned())
                .or_insert_with(|| executable.display().to_string());
        }
        vars
    }

    /// Working directory: the fixture's `cwd` relative to its document, else
    /// the document's directory, else the configured fallback.
    fn working_dir(test: &FixtureTest, options: &RunOptions, vars: &BTreeMap<String, String>) -> PathBuf {
        let base = if test.source_dir.as_os_str().is_empty() {
            options.working_dir.clone()
        } else {
            test.source_dir.clone()
        };

        let cwd = render_template(test.cwd.trim(), vars);
        if cwd.is_empty() {
            base
        } else {
            base.join(cwd)
        }
    }

    fn load_temp_files(
        test: &FixtureTest,
        cwd: &Path,
        vars: &BTreeMap<String, String>,
    ) -> Result<Vec<TempFile>, String> {
        test.temp_files
            .iter()
            .map(|(name, path)| {
                let full_path = cwd.join(render_template(path, vars));
                TempFile::load(name, &full_path)
                    .map_err(|err| format!("failed to read temp file {name} ({}): {err}", full_path.display()))
            })
            .collect()
    }
}

#[async_trait]
impl FixtureType for ExecFixtureType {
    fn name(&self) -> &'static str {
        EXEC_TYPE
    }

    async fn run(&self, test: &FixtureTest, options: &RunOptions) -> FixtureResult {
        let vars = Self::template_vars(test, options);
        let program = render_template(test.exec.trim(), &vars);
        let args: Vec<String> = test.args.iter().map(|arg| render_template(arg, &vars)).collect();
        let cwd = Self::working_dir(test, options, &vars);

        let mut output = match run_process(&program, &args, &cwd, &test.env).await {
            Ok(output) => output,
            Err(err) => {
                let mut result = FixtureResult::error(&test.name, format!("failed to run {program}: {err}"));
                result.command = test.command_line();
                return result;
            }
        };

        match Self::load_temp_files(test, &cwd, &vars) {
            Ok(files) => output.temp_files = files,
            Err(message) => {
                let mut result = evaluate(test, &output, options.engine.as_ref());
                if result.passed() {
                    result.status = Status::Error;
                    result.message = message;
                }
                return result;
            }
        }

        let result = evaluate(test, &output, options.engine.as_ref());
        if options.verbose {
            tracing::info!(test = %test.name, status = %result.status, duration = ?result.duration, "fixture finished");
        }
        result
    }

    fn validate_fixture(&self, test: &FixtureTest) -> mdspec_core::Result<()> {
        if test.has_exec() {
            Ok(())
        } else {
            Err(FixtureError::InvalidFixture {
                fixture: test.name.clone(),
                message: "exec fixtures need a program to run".to_owned(),
            })
        }
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["exec"]
    }

    fn optional_fields(&self) -> &'static [&'static str] {
        &["args", "cwd", "env", "timeout", "tempFiles", "expected"]
    }
}
