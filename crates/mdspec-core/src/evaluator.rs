//! Judges a process's output against a fixture's expectations.
//!
//! Checks run in order and the first one that fails decides the result:
//! exit code, exact stdout, exact stderr, expected error text, then the
//! validation expression.

use mdspec_expr::{Bindings, BindingSchema, ExpressionEngine, type_name};
use serde_json::Value;

use crate::fixture::FixtureTest;
use crate::result::{FixtureResult, ProcessOutput, Status, parse_json_like};

/// Outcome of a validation expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionOutcome {
    /// The expression held
    Passed,
    /// The expression did not hold; carries the diagnostic
    Failed(String),
    /// The expression could not be compiled or evaluated
    Errored(String),
}

/// Evaluate `actual` against `test`'s expectations.
#[must_use]
pub fn evaluate(test: &FixtureTest, actual: &ProcessOutput, engine: &dyn ExpressionEngine) -> FixtureResult {
    let mut result = FixtureResult::pass(&test.name);
    result.command = if actual.command.is_empty() {
        test.command_line()
    } else {
        actual.command.clone()
    };
    result.stdout.clone_from(&actual.stdout);
    result.stderr.clone_from(&actual.stderr);
    result.exit_code = Some(actual.exit_code);
    result.duration = actual.duration;

    if let Some(message) = first_mismatch(test, actual) {
        result.status = Status::Fail;
        result.message = message;
        return result;
    }

    let expression = test.expected.cel.trim();
    if expression.is_empty() {
        return result;
    }

    let bindings = build_bindings(test, actual);
    match evaluate_expression(expression, &bindings, engine) {
        ExpressionOutcome::Passed => {}
        ExpressionOutcome::Failed(message) => {
            result.status = Status::Fail;
            result.message = message;
        }
        ExpressionOutcome::Errored(message) => {
            result.status = Status::Error;
            result.message = message;
        }
    }
    result
}

fn first_mismatch(test: &FixtureTest, actual: &ProcessOutput) -> Option<String> {
    let expected = &test.expected;

    let exit_code = expected.expected_exit_code();
    if actual.exit_code != exit_code {
        return Some(format!(
            "expected exit code {exit_code}, got {}",
            actual.exit_code
        ));
    }

    if !expected.stdout.is_empty() && actual.stdout.trim() != expected.stdout.trim() {
        return Some(format!(
            "stdout mismatch: expected {:?}, got {:?}",
            expected.stdout.trim(),
            actual.stdout.trim()
        ));
    }

    if !expected.stderr.is_empty() && actual.stderr.trim() != expected.stderr.trim() {
        return Some(format!(
            "stderr mismatch: expected {:?}, got {:?}",
            expected.stderr.trim(),
            actual.stderr.trim()
        ));
    }

    if !expected.error.is_empty() && !actual.stderr.contains(expected.error.as_str()) {
        return Some(format!(
            "expected stderr to contain {:?}, got {:?}",
            expected.error,
            actual.stderr.trim()
        ));
    }

    None
}

/// Bindings visible to validation expressions.
///
/// The fixture's declared fields come first, then temp files by name, then
/// `output`, `stdout`, `stderr`, `exitCode` and (when stdout is JSON) `json`,
/// each later entry replacing an earlier one of the same name.
#[must_use]
pub fn build_bindings(test: &FixtureTest, actual: &ProcessOutput) -> Bindings {
    let mut bindings = test.declared_fields();

    for file in &actual.temp_files {
        bindings.insert(file.name.clone(), file.to_binding());
    }

    bindings.insert(
        "output".to_owned(),
        Value::String(format!("{}{}", actual.stdout, actual.stderr)),
    );
    bindings.insert("stdout".to_owned(), Value::String(actual.stdout.clone()));
    bindings.insert("stderr".to_owned(), Value::String(actual.stderr.clone()));
    bindings.insert("exitCode".to_owned(), Value::from(actual.exit_code));
    if let Some(json) = parse_json_like(&actual.stdout) {
        bindings.insert("json".to_owned(), json);
    }
    bindings
}

/// Compile and run `expression` against `bindings`.
///
/// `true`, or a string equal to `"true"` ignoring case and surrounding
/// whitespace, passes. `false` and any other string fail. Every other result
/// type is an error.
#[must_use]
pub fn evaluate_expression(
    expression: &str,
    bindings: &Bindings,
    engine: &dyn ExpressionEngine,
) -> ExpressionOutcome {
    let schema = BindingSchema::from_bindings(bindings);
    let program = match engine.compile(expression, &schema) {
        Ok(program) => program,
        Err(error) => {
            return ExpressionOutcome::Errored(format!("invalid expression {expression:?}: {error}"));
        }
    };

    match program.eval(bindings) {
        Ok(Value::Bool(true)) => ExpressionOutcome::Passed,
        Ok(Value::Bool(false)) => {
            ExpressionOutcome::Failed(format!("CEL expression evaluated to false: {expression}"))
        }
        Ok(Value::String(text)) if text.trim().eq_ignore_ascii_case("true") => ExpressionOutcome::Passed,
        Ok(Value::String(text)) => ExpressionOutcome::Failed(format!("{text} != true")),
        Ok(other) => ExpressionOutcome::Errored(format!(
            "expression {expression:?} returned {} instead of bool",
            type_name(&other)
        )),
        Err(error) => ExpressionOutcome::Errored(format!("evaluating {expression:?} failed: {error}")),
    }
}
