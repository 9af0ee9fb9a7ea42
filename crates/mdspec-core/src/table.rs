//! Markdown table rows as fixtures, matched by header name.

use std::path::Path;

use crate::fixture::FixtureTest;
use crate::frontmatter::FrontMatter;
use crate::validation::compile_item;

/// The fixture field a table column feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// Test name
    Name,
    /// Working directory
    Cwd,
    /// Query text
    Query,
    /// Program (and leading arguments)
    Exec,
    /// Whitespace-separated arguments
    Args,
    /// Expected exit code
    ExitCode,
    /// Expected count
    Count,
    /// Expected stdout
    Output,
    /// Expected format
    Format,
    /// Expected stderr text
    Error,
    /// Validation expression
    Expression,
    /// Anything else, keyed by the original header
    Property(String),
}

impl Column {
    /// Classify a header cell (case-insensitive).
    #[must_use]
    pub fn from_header(header: &str) -> Self {
        let trimmed = header.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "test name" | "name" => Self::Name,
            "cwd" | "working directory" | "dir" => Self::Cwd,
            "query" => Self::Query,
            "cli" | "command" | "exec" => Self::Exec,
            "cli args" | "args" | "arguments" => Self::Args,
            "exit code" | "exitcode" | "expected exit code" => Self::ExitCode,
            "expected count" | "count" => Self::Count,
            "expected output" | "output" | "expected matches" | "matches" | "expected results"
            | "results" | "expected files" | "files" | "template output" => Self::Output,
            "expected format" | "format" => Self::Format,
            "expected error" | "error" => Self::Error,
            "cel validation" | "cel" | "validation" | "expr" => Self::Expression,
            _ => Self::Property(trimmed.to_owned()),
        }
    }
}

/// Build the fixture for one data row.
///
/// The caller guarantees `cells.len() == headers.len()`. `row_number` (1-based)
/// names rows without a name column.
#[must_use]
pub fn row_fixture(
    headers: &[String],
    cells: &[String],
    row_number: usize,
    front_matter: &FrontMatter,
    source_dir: &Path,
) -> FixtureTest {
    let mut test = FixtureTest::new(
        format!("row {row_number}"),
        front_matter,
        source_dir.to_path_buf(),
    );
    let mut exec_line = front_matter.exec.clone();
    let mut extra_args = Vec::new();

    for (header, cell) in headers.iter().zip(cells) {
        let value = cell.trim();
        match Column::from_header(header) {
            Column::Name if !value.is_empty() => value.clone_into(&mut test.name),
            Column::Name => {}
            Column::Cwd => value.clone_into(&mut test.cwd),
            Column::Query => value.clone_into(&mut test.query),
            Column::Exec if !value.is_empty() => value.clone_into(&mut exec_line),
            Column::Exec => {}
            Column::Args => extra_args.extend(value.split_whitespace().map(str::to_owned)),
            Column::ExitCode if value.is_empty() => {}
            Column::ExitCode => match value.parse::<i32>() {
                Ok(code) => test.expected.exit_code = Some(code),
                Err(_) => {
                    tracing::warn!(header = %header, value, "non-numeric exit code kept as property");
                    test.expected
                        .properties
                        .insert(header.trim().to_owned(), value.to_owned());
                }
            },
            Column::Count if value.is_empty() => {}
            Column::Count => match value.parse::<i64>() {
                Ok(count) => test.expected.count = Some(count),
                Err(_) => {
                    test.expected
                        .properties
                        .insert(header.trim().to_owned(), value.to_owned());
                }
            },
            Column::Output => value.clone_into(&mut test.expected.stdout),
            Column::Format => value.clone_into(&mut test.expected.format),
            Column::Error => value.clone_into(&mut test.expected.error),
            Column::Expression if value.is_empty() => {}
            Column::Expression => test.expected.push_expression(&compile_item(value)),
            Column::Property(key) => {
                test.expected.properties.insert(key, value.to_owned());
            }
        }
    }

    let mut words = exec_line.split_whitespace().map(str::to_owned);
    test.exec = words.next().unwrap_or_default();
    test.args = words.chain(extra_args).collect();
    test
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn test_header_synonyms() {
        assert_eq!(Column::from_header("Test Name"), Column::Name);
        assert_eq!(Column::from_header("working directory"), Column::Cwd);
        assert_eq!(Column::from_header("CLI"), Column::Exec);
        assert_eq!(Column::from_header("CLI Args"), Column::Args);
        assert_eq!(Column::from_header("Expected Exit Code"), Column::ExitCode);
        assert_eq!(Column::from_header("Expected Matches"), Column::Output);
        assert_eq!(Column::from_header("Template Output"), Column::Output);
        assert_eq!(Column::from_header("Expected Files"), Column::Output);
        assert_eq!(Column::from_header("CEL Validation"), Column::Expression);
        assert_eq!(
            Column::from_header(" Owner "),
            Column::Property("Owner".to_owned())
        );
    }

    #[test]
    fn test_row_fixture() {
        let front_matter = FrontMatter::default();
        let test = row_fixture(
            &headers(&["Name", "CLI", "Args", "Exit Code", "Output", "Notes"]),
            &headers(&["greets", "echo -n", "hello world", "0", "hello world", "smoke"]),
            1,
            &front_matter,
            Path::new("/docs"),
        );
        assert_eq!(test.name, "greets");
        assert_eq!(test.exec, "echo");
        assert_eq!(test.args, vec!["-n", "hello", "world"]);
        assert_eq!(test.expected.exit_code, Some(0));
        assert_eq!(test.expected.stdout, "hello world");
        assert_eq!(
            test.expected.properties.get("Notes").map(String::as_str),
            Some("smoke")
        );
    }

    #[test]
    fn test_row_uses_front_matter_exec() {
        let front_matter = FrontMatter {
            exec: "./tool --quiet".to_owned(),
            ..FrontMatter::default()
        };
        let test = row_fixture(
            &headers(&["Args", "CEL"]),
            &headers(&["list", r#"contains: "a""#]),
            4,
            &front_matter,
            Path::new("."),
        );
        assert_eq!(test.name, "row 4");
        assert_eq!(test.exec, "./tool");
        assert_eq!(test.args, vec!["--quiet", "list"]);
        assert_eq!(test.expected.cel, r#"stdout.contains("a")"#);
    }

    #[test]
    fn test_query_and_count() {
        let test = row_fixture(
            &headers(&["Query", "Count", "Format"]),
            &headers(&["kind:fn", "3", "json"]),
            1,
            &FrontMatter::default(),
            Path::new("."),
        );
        assert!(test.has_query());
        assert!(!test.has_exec());
        assert_eq!(test.expected.count, Some(3));
        assert_eq!(test.expected.format, "json");
    }
}
