//! Execution outcomes: raw process output and per-fixture results.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of a single fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// All expectations held
    Pass,
    /// An expectation did not hold
    Fail,
    /// The fixture could not be evaluated
    Error,
    /// The fixture never ran
    Skip,
}

impl fmt::Display for Status {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
            Self::Skip => "skip",
        };
        formatter.write_str(label)
    }
}

/// Result attached to a test node after execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureResult {
    /// Fixture name
    pub name: String,
    /// Outcome
    pub status: Status,
    /// Reconstructed command line
    pub command: String,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Process exit code, if the process ran
    pub exit_code: Option<i32>,
    /// Wall-clock duration
    pub duration: Duration,
    /// Human-readable failure diagnostic, empty on pass
    pub message: String,
}

impl FixtureResult {
    fn with_status(name: &str, status: Status, message: String) -> Self {
        Self {
            name: name.to_owned(),
            status,
            command: String::new(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            duration: Duration::ZERO,
            message,
        }
    }

    /// A passing result with no captured output.
    #[must_use]
    pub fn pass(name: &str) -> Self {
        Self::with_status(name, Status::Pass, String::new())
    }

    /// A failed result.
    #[must_use]
    pub fn fail(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, Status::Fail, message.into())
    }

    /// A result for a fixture that could not be evaluated.
    #[must_use]
    pub fn error(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, Status::Error, message.into())
    }

    /// A result for a fixture that never ran.
    #[must_use]
    pub fn skip(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, Status::Skip, message.into())
    }

    /// Whether the fixture passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }
}

/// What a process produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    /// Command line that was run
    pub command: String,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Exit code (`-1` when terminated by a signal)
    pub exit_code: i32,
    /// Wall-clock duration
    pub duration: Duration,
    /// Declared files read back after the process exited
    pub temp_files: Vec<TempFile>,
}

/// A file the command wrote, bound by name for validations.
#[derive(Debug, Clone, PartialEq)]
pub struct TempFile {
    /// Binding name
    pub name: String,
    /// Path on disk
    pub path: PathBuf,
    /// File content (lossy UTF-8)
    pub content: String,
    /// Extension including the dot, empty if none
    pub ext: String,
    /// Detected format: `json`, `yaml`, `toml`, `markdown` or `text`
    pub detected: String,
    /// Parsed JSON when the content is JSON
    pub json: Option<Value>,
}

impl TempFile {
    /// Read `path` and classify its content.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn load(name: &str, path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let ext = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let json = parse_json_like(&content);
        let detected = detect_format(&ext, json.is_some()).to_owned();
        Ok(Self {
            name: name.to_owned(),
            path: path.to_path_buf(),
            content,
            ext,
            detected,
            json,
        })
    }

    /// Expression binding exposing `path/content/ext/detected/json`.
    #[must_use]
    pub fn to_binding(&self) -> Value {
        let mut fields = Map::new();
        fields.insert(
            "path".to_owned(),
            Value::String(self.path.display().to_string()),
        );
        fields.insert("content".to_owned(), Value::String(self.content.clone()));
        fields.insert("ext".to_owned(), Value::String(self.ext.clone()));
        fields.insert("detected".to_owned(), Value::String(self.detected.clone()));
        if let Some(json) = &self.json {
            fields.insert("json".to_owned(), json.clone());
        }
        Value::Object(fields)
    }
}

/// Parse `text` as JSON only when it looks like an object or array.
#[must_use]
pub fn parse_json_like(text: &str) -> Option<Value> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

fn detect_format(ext: &str, is_json: bool) -> &'static str {
    if is_json {
        return "json";
    }
    match ext.to_ascii_lowercase().as_str() {
        ".json" => "json",
        ".yaml" | ".yml" => "yaml",
        ".toml" => "toml",
        ".md" | ".markdown" => "markdown",
        _ => "text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Pass.to_string(), "pass");
        assert_eq!(Status::Skip.to_string(), "skip");
    }

    #[test]
    fn test_constructors() {
        let result = FixtureResult::fail("t", "expected exit code 0, got 2");
        assert_eq!(result.status, Status::Fail);
        assert!(!result.passed());
        assert!(FixtureResult::pass("t").passed());
    }

    #[test]
    fn test_parse_json_like() {
        assert!(parse_json_like("  {\"a\": 1}").is_some());
        assert!(parse_json_like("[1, 2]").is_some());
        assert!(parse_json_like("plain text").is_none());
        assert!(parse_json_like("{broken").is_none());
    }

    #[test]
    fn test_temp_file_load() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("report.json");
        fs::write(&path, "{\"ok\": true}").expect("write");

        let file = TempFile::load("report", &path).expect("load");
        assert_eq!(file.ext, ".json");
        assert_eq!(file.detected, "json");
        let binding = file.to_binding();
        assert_eq!(binding["json"]["ok"], Value::Bool(true));
        assert_eq!(binding["content"], Value::String("{\"ok\": true}".to_owned()));

        let path = dir.path().join("notes.yaml");
        fs::write(&path, "a: 1\n").expect("write");
        let file = TempFile::load("notes", &path).expect("load");
        assert_eq!(file.detected, "yaml");
        assert!(file.json.is_none());
    }
}
