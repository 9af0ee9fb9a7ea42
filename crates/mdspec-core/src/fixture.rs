//! Fixture definitions: one executable test case with its expectations.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::frontmatter::FrontMatter;

/// What a fixture expects from its process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectations {
    /// Expected exit code; `None` means 0
    pub exit_code: Option<i32>,
    /// Exact stdout (compared after trimming surrounding whitespace)
    pub stdout: String,
    /// Exact stderr (compared after trimming surrounding whitespace)
    pub stderr: String,
    /// Compiled boolean expression, empty when absent
    pub cel: String,
    /// Expected result count, consumed by query-style fixture types
    pub count: Option<i64>,
    /// Expected output format
    pub format: String,
    /// Text stderr must contain
    pub error: String,
    /// Unrecognized table columns, keyed by header text
    pub properties: BTreeMap<String, String>,
}

impl Expectations {
    /// Exit code the process must return.
    #[must_use]
    pub fn expected_exit_code(&self) -> i32 {
        self.exit_code.unwrap_or(0)
    }

    /// Append a compiled expression, joining with `&&`.
    pub fn push_expression(&mut self, expression: &str) {
        if expression.is_empty() {
            return;
        }
        if self.cel.is_empty() {
            expression.clone_into(&mut self.cel);
        } else {
            self.cel = format!("{} && {expression}", self.cel);
        }
    }
}

/// A single declared test case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureTest {
    /// Display name
    pub name: String,
    /// Program to run
    pub exec: String,
    /// Positional arguments
    pub args: Vec<String>,
    /// Working directory override, relative to `source_dir` unless absolute
    pub cwd: String,
    /// Environment overrides
    pub env: BTreeMap<String, String>,
    /// Query text; routes the fixture to the `query` type
    pub query: String,
    /// Declared expectations
    pub expected: Expectations,
    /// Per-test timeout override
    pub timeout: Option<Duration>,
    /// Files the command writes, bound by name for validations
    pub temp_files: BTreeMap<String, String>,
    /// Front-matter of the document the fixture came from
    pub front_matter: FrontMatter,
    /// Bindings for `{{name}}` placeholders
    pub template_vars: BTreeMap<String, String>,
    /// Directory of the originating document
    pub source_dir: PathBuf,
}

impl FixtureTest {
    /// Create a fixture with the given name and document context.
    #[must_use]
    pub fn new(name: impl Into<String>, front_matter: &FrontMatter, source_dir: PathBuf) -> Self {
        Self {
            name: name.into(),
            cwd: front_matter.cwd.clone(),
            env: front_matter.env.clone(),
            front_matter: front_matter.clone(),
            source_dir,
            ..Self::default()
        }
    }

    /// Whether this fixture carries an exec command.
    #[must_use]
    pub fn has_exec(&self) -> bool {
        !self.exec.trim().is_empty()
    }

    /// Whether this fixture carries a query.
    #[must_use]
    pub fn has_query(&self) -> bool {
        !self.query.trim().is_empty()
    }

    /// Substitute `{{name}}` placeholders from the template variables.
    ///
    /// Unknown placeholders are left untouched.
    #[must_use]
    pub fn render(&self, text: &str) -> String {
        render_template(text, &self.template_vars)
    }

    /// Shell-style command line for diagnostics.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut parts = vec![quote_arg(&self.exec)];
        parts.extend(self.args.iter().map(|arg| quote_arg(arg)));
        parts.join(" ")
    }

    /// The fixture's own declared fields, exposed to validation expressions.
    ///
    /// Template variables and unrecognized table columns are included; a
    /// declared field never shadows `stdout`/`stderr`/`output`/`exitCode`,
    /// which the evaluator binds afterwards.
    #[must_use]
    pub fn declared_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        for (key, value) in self
            .expected
            .properties
            .iter()
            .chain(self.template_vars.iter())
        {
            fields.insert(key.clone(), Value::String(value.clone()));
        }

        fields.insert("name".to_owned(), Value::String(self.name.clone()));
        fields.insert("exec".to_owned(), Value::String(self.exec.clone()));
        fields.insert(
            "args".to_owned(),
            Value::Array(self.args.iter().cloned().map(Value::String).collect()),
        );
        fields.insert("cwd".to_owned(), Value::String(self.cwd.clone()));
        fields.insert(
            "env".to_owned(),
            Value::Object(
                self.env
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect(),
            ),
        );
        if self.has_query() {
            fields.insert("query".to_owned(), Value::String(self.query.clone()));
        }
        if let Some(count) = self.expected.count {
            fields.insert("count".to_owned(), Value::from(count));
        }
        if !self.expected.format.is_empty() {
            fields.insert(
                "format".to_owned(),
                Value::String(self.expected.format.clone()),
            );
        }
        if !self.expected.error.is_empty() {
            fields.insert("error".to_owned(), Value::String(self.expected.error.clone()));
        }
        fields
    }
}

/// Replace every `{{key}}` in `text` with its value from `vars`.
#[must_use]
pub fn render_template(text: &str, vars: &BTreeMap<String, String>) -> String {
    if vars.is_empty() || !text.contains("{{") {
        return text.to_owned();
    }
    let mut rendered = text.to_owned();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }
    rendered
}

fn quote_arg(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg
            .chars()
            .any(|current| current.is_whitespace() || "'\"$`\\|&;<>()*?".contains(current));
    if needs_quotes {
        format!("'{}'", arg.replace('\'', r"'\''"))
    } else {
        arg.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_inherits_front_matter() {
        let mut front_matter = FrontMatter {
            cwd: "work".to_owned(),
            ..FrontMatter::default()
        };
        front_matter.env.insert("MODE".to_owned(), "ci".to_owned());

        let test = FixtureTest::new("t", &front_matter, PathBuf::from("/docs"));
        assert_eq!(test.cwd, "work");
        assert_eq!(test.env.get("MODE").map(String::as_str), Some("ci"));
        assert_eq!(test.source_dir, PathBuf::from("/docs"));
        assert!(!test.has_exec());
    }

    #[test]
    fn test_render_template() {
        let mut test = FixtureTest::default();
        test.template_vars
            .insert("file".to_owned(), "data/a.json".to_owned());
        assert_eq!(test.render("cat {{file}} {{other}}"), "cat data/a.json {{other}}");
    }

    #[test]
    fn test_command_line_quotes() {
        let test = FixtureTest {
            exec: "bash".to_owned(),
            args: vec!["-c".to_owned(), "echo 'hi'".to_owned()],
            ..FixtureTest::default()
        };
        assert_eq!(test.command_line(), r#"bash -c 'echo '\''hi'\'''"#);
    }

    #[test]
    fn test_push_expression() {
        let mut expected = Expectations::default();
        expected.push_expression("exitCode == 0");
        expected.push_expression("");
        expected.push_expression(r#"stdout.contains("OK")"#);
        assert_eq!(expected.cel, r#"exitCode == 0 && stdout.contains("OK")"#);
        assert_eq!(expected.expected_exit_code(), 0);
    }

    #[test]
    fn test_declared_fields() {
        let mut test = FixtureTest {
            name: "row".to_owned(),
            query: "select".to_owned(),
            ..FixtureTest::default()
        };
        test.expected.count = Some(3);
        test.expected
            .properties
            .insert("Owner".to_owned(), "core".to_owned());

        let fields = test.declared_fields();
        assert_eq!(fields.get("count"), Some(&Value::from(3)));
        assert_eq!(fields.get("Owner"), Some(&Value::String("core".to_owned())));
        assert_eq!(fields.get("query"), Some(&Value::String("select".to_owned())));
        assert!(!fields.contains_key("format"));
    }
}
