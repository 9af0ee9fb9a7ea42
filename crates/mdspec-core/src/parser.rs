//! Structural parser: turns a markdown body into a tree of sections and tests.
//!
//! Three constructs declare tests:
//!
//! * table rows whose cell count matches the header row,
//! * `command:` headings followed by a whitelisted code fence, optional
//!   block-local YAML and validation lists,
//! * standalone executable fences, optionally followed by a validation list.

use std::path::Path;

use crate::blocks::{Block, read_blocks};
use crate::error::Result;
use crate::fixture::FixtureTest;
use crate::frontmatter::{BlockFrontMatter, FrontMatter};
use crate::language::{
    command_for, is_front_matter_fence, is_standalone_executable, standalone_command_for,
};
use crate::node::FixtureNode;
use crate::table::row_fixture;
use crate::validation::{compile, is_validation_list};

const COMMAND_PREFIX: &str = "command:";

/// A `command:` block collecting its parts until the next heading.
#[derive(Debug, Default)]
struct CommandBuilder {
    name: String,
    language: String,
    content: Option<String>,
    overrides: BlockFrontMatter,
    validations: Vec<String>,
}

/// A standalone fence waiting for an optional validation list.
#[derive(Debug)]
struct StandaloneBuilder {
    name: String,
    language: String,
    content: String,
    validations: Vec<String>,
}

struct StructuralParser<'ctx> {
    front_matter: &'ctx FrontMatter,
    source_dir: &'ctx Path,
    /// Open sections; index 0 is the document root.
    stack: Vec<FixtureNode>,
    command: Option<CommandBuilder>,
    standalone: Option<StandaloneBuilder>,
    last_heading: Option<String>,
}

/// Parse a markdown body into an unnamed file node.
///
/// # Errors
/// Returns a YAML error when a block-local front-matter fence is malformed.
pub fn parse(body: &str, front_matter: &FrontMatter, source_dir: &Path) -> Result<FixtureNode> {
    parse_document("", body, front_matter, source_dir)
}

/// Parse a markdown body (front-matter already removed) into a file node.
///
/// Sections mirror the heading hierarchy; tests attach to the innermost
/// section open at the point they are declared.
///
/// # Errors
/// Returns a YAML error when a block-local front-matter fence is malformed.
pub fn parse_document(
    name: &str,
    body: &str,
    front_matter: &FrontMatter,
    source_dir: &Path,
) -> Result<FixtureNode> {
    let mut parser = StructuralParser {
        front_matter,
        source_dir,
        stack: vec![FixtureNode::file(name)],
        command: None,
        standalone: None,
        last_heading: None,
    };

    for block in read_blocks(body) {
        parser.visit(block)?;
    }

    Ok(parser.finish())
}

impl StructuralParser<'_> {
    fn visit(&mut self, block: Block) -> Result<()> {
        match block {
            Block::Heading { level, text } => self.heading(level, text),
            Block::Code { language, content } => self.code(language, content)?,
            Block::List { items } => self.list(items),
            Block::Table { headers, rows } => self.table(&headers, &rows),
        }
        Ok(())
    }

    fn heading(&mut self, level: u8, text: String) {
        self.flush_builders();

        let lowered = text.to_ascii_lowercase();
        if lowered.starts_with(COMMAND_PREFIX) {
            let name = text[COMMAND_PREFIX.len()..].trim().to_owned();
            self.command = Some(CommandBuilder {
                name,
                ..CommandBuilder::default()
            });
            return;
        }

        while self.stack.len() > 1 && self.stack.last().is_some_and(|top| top.level >= level) {
            self.close_section();
        }
        self.last_heading = Some(text.clone());
        self.stack.push(FixtureNode::section(text, level));
    }

    fn code(&mut self, language: String, content: String) -> Result<()> {
        if let Some(command) = &mut self.command {
            if is_front_matter_fence(&language) {
                let overrides = BlockFrontMatter::from_yaml(&content)?;
                merge_overrides(&mut command.overrides, overrides);
            } else if self.front_matter.allows_language(&language) {
                if command.content.is_none() {
                    command.language = language;
                    command.content = Some(content);
                } else {
                    tracing::debug!(command = %command.name, "ignoring extra code block in command");
                }
            }
            return Ok(());
        }

        if is_standalone_executable(&language) {
            self.flush_standalone();
            let name = self
                .last_heading
                .clone()
                .unwrap_or_else(|| format!("{language}-block"));
            self.standalone = Some(StandaloneBuilder {
                name,
                language,
                content,
                validations: Vec::new(),
            });
        }
        Ok(())
    }

    fn list(&mut self, items: Vec<String>) {
        if !is_validation_list(&items.join("\n")) {
            return;
        }

        if let Some(command) = &mut self.command {
            command.validations.extend(items);
        } else if let Some(standalone) = &mut self.standalone {
            standalone.validations.extend(items);
            self.flush_standalone();
        } else {
            tracing::debug!("validation list outside any test ignored");
        }
    }

    fn table(&mut self, headers: &[String], rows: &[Vec<String>]) {
        for (index, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                tracing::debug!(
                    row = index + 1,
                    cells = row.len(),
                    headers = headers.len(),
                    "skipping table row with mismatched cell count"
                );
                continue;
            }
            let test = row_fixture(headers, row, index + 1, self.front_matter, self.source_dir);
            self.attach(test);
        }
    }

    fn attach(&mut self, test: FixtureTest) {
        tracing::debug!(test = %test.name, "declared test");
        if let Some(section) = self.stack.last_mut() {
            section.children.push(FixtureNode::test(test));
        }
    }

    fn close_section(&mut self) {
        if let Some(section) = self.stack.pop() {
            if let Some(parent) = self.stack.last_mut() {
                parent.children.push(section);
            }
        }
    }

    fn flush_builders(&mut self) {
        self.flush_command();
        self.flush_standalone();
    }

    fn flush_command(&mut self) {
        let Some(command) = self.command.take() else {
            return;
        };
        let Some(content) = command.content else {
            tracing::debug!(command = %command.name, "command block without code dropped");
            return;
        };
        if command.name.is_empty() || content.trim().is_empty() {
            tracing::debug!("unnamed or empty command block dropped");
            return;
        }

        let mut test = FixtureTest::new(command.name, self.front_matter, self.source_dir.to_path_buf());
        (test.exec, test.args) = command_for(&command.language, &content);

        let overrides = command.overrides;
        if let Some(cwd) = overrides.cwd {
            test.cwd = cwd;
        }
        test.expected.exit_code = overrides.exit_code;
        test.env.extend(overrides.env);
        test.timeout = overrides.timeout;
        test.temp_files = overrides.temp_files;
        test.expected.push_expression(&compile(&command.validations));

        self.attach(test);
    }

    fn flush_standalone(&mut self) {
        let Some(standalone) = self.standalone.take() else {
            return;
        };
        if standalone.content.trim().is_empty() {
            return;
        }

        let mut test = FixtureTest::new(standalone.name, self.front_matter, self.source_dir.to_path_buf());
        (test.exec, test.args) = standalone_command_for(&standalone.language, &standalone.content);
        test.expected.push_expression(&compile(&standalone.validations));
        self.attach(test);
    }

    fn finish(mut self) -> FixtureNode {
        self.flush_builders();
        while self.stack.len() > 1 {
            self.close_section();
        }
        self.stack.pop().unwrap_or_else(|| FixtureNode::file(""))
    }
}

/// Later block-local fences win field by field; env maps merge.
fn merge_overrides(current: &mut BlockFrontMatter, next: BlockFrontMatter) {
    if next.cwd.is_some() {
        current.cwd = next.cwd;
    }
    if next.exit_code.is_some() {
        current.exit_code = next.exit_code;
    }
    if next.timeout.is_some() {
        current.timeout = next.timeout;
    }
    current.env.extend(next.env);
    current.temp_files.extend(next.temp_files);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mdspec_expr::CelEngine;

    use super::*;
    use crate::evaluator::evaluate;
    use crate::node::NodeKind;
    use crate::result::{ProcessOutput, Status};

    fn parse(body: &str) -> FixtureNode {
        parse_document("doc.md", body, &FrontMatter::default(), Path::new("/docs"))
            .expect("document should parse")
    }

    fn names(node: &FixtureNode) -> Vec<String> {
        node.tests()
            .into_iter()
            .map(|test| test.name.clone())
            .collect()
    }

    #[test]
    fn test_command_block() {
        let root = parse(
            "# Suite\n\n## command: say hello\n\n```bash\necho hello\n```\n\n* contains: \"hello\"\n* cel: exitCode == 0\n",
        );
        let tests = root.tests();
        assert_eq!(tests.len(), 1);
        let test = tests[0].test.as_ref().expect("payload");
        assert_eq!(test.name, "say hello");
        assert_eq!(test.exec, "bash");
        assert_eq!(test.args, vec!["-c".to_owned(), "echo hello\n".to_owned()]);
        assert_eq!(test.expected.cel, r#"stdout.contains("hello") && exitCode == 0"#);
        assert_eq!(test.source_dir, Path::new("/docs"));
    }

    #[test]
    fn test_command_block_overrides() {
        let mut front_matter = FrontMatter::default();
        front_matter.env.insert("A".to_owned(), "file".to_owned());
        front_matter.env.insert("B".to_owned(), "file".to_owned());

        let body = "## command: fails\n\n```yaml\nexitCode: 2\ncwd: sub\ntimeout: 5s\nenv:\n  B: block\n```\n\n```bash\nexit 2\n```\n";
        let root = parse_document("doc.md", body, &front_matter, Path::new(".")).expect("parse");
        let tests = root.tests();
        let test = tests[0].test.as_ref().expect("payload");
        assert_eq!(test.expected.exit_code, Some(2));
        assert_eq!(test.cwd, "sub");
        assert_eq!(test.timeout, Some(Duration::from_secs(5)));
        assert_eq!(test.env.get("A").map(String::as_str), Some("file"));
        assert_eq!(test.env.get("B").map(String::as_str), Some("block"));
    }

    #[test]
    fn test_command_ignores_non_whitelisted_fence() {
        let root = parse("## command: only python\n\n```python\nprint(1)\n```\n");
        assert_eq!(root.test_count(), 0);
    }

    #[test]
    fn test_python_before_bash_not_selected() {
        let root = parse("## command: mixed\n\n```python\nprint(1)\n```\n\n```bash\necho 2\n```\n");
        let tests = root.tests();
        assert_eq!(tests.len(), 1);
        let test = tests[0].test.as_ref().expect("payload");
        assert_eq!(test.exec, "bash");
        assert_eq!(test.args[1], "echo 2\n");
    }

    #[test]
    fn test_nested_validation_label() {
        let root = parse("## command: greet\n\n```bash\necho ok\n```\n\n* Validation\n  * contains: \"ok\"\n");
        let tests = root.tests();
        let test = tests[0].test.as_ref().expect("payload");
        assert_eq!(test.expected.cel, r#"stdout.contains("ok")"#);

        let output = ProcessOutput {
            stdout: "ok\n".to_owned(),
            ..ProcessOutput::default()
        };
        let result = evaluate(test, &output, &CelEngine::new());
        assert_eq!(result.status, Status::Pass, "{}", result.message);
    }

    #[test]
    fn test_command_block_language_passthrough() {
        let front_matter = FrontMatter {
            code_blocks: vec!["py".to_owned()],
            ..FrontMatter::default()
        };
        let root = parse_document("doc.md", "## command: raw\n\n```py\nprint(1)\n```\n", &front_matter, Path::new("."))
            .expect("parse");
        let tests = root.tests();
        let test = tests[0].test.as_ref().expect("payload");
        assert_eq!(test.exec, "py");
        assert_eq!(test.args, vec!["print(1)\n".to_owned()]);
    }

    #[test]
    fn test_validation_only_command_yields_nothing() {
        let root = parse("## command: lonely\n\n* cel: exitCode == 0\n");
        assert_eq!(root.test_count(), 0);
    }

    #[test]
    fn test_first_whitelisted_fence_wins() {
        let root = parse("## command: two\n\n```bash\necho one\n```\n\n```bash\necho two\n```\n");
        let tests = root.tests();
        assert_eq!(tests.len(), 1);
        let test = tests[0].test.as_ref().expect("payload");
        assert_eq!(test.args[1], "echo one\n");
    }

    #[test]
    fn test_unnamed_command_dropped() {
        let root = parse("## command:\n\n```bash\necho hi\n```\n");
        assert_eq!(root.test_count(), 0);
    }

    #[test]
    fn test_standalone_named_after_heading() {
        let root = parse("## Greeting\n\n```bash\necho hi\n```\n\n* contains: \"hi\"\n");
        let tests = root.tests();
        assert_eq!(tests.len(), 1);
        let test = tests[0].test.as_ref().expect("payload");
        assert_eq!(test.name, "Greeting");
        assert_eq!(test.expected.cel, r#"stdout.contains("hi")"#);
    }

    #[test]
    fn test_standalone_without_heading() {
        let root = parse("```py\nprint(1)\n```\n");
        assert_eq!(names(&root), vec!["py-block"]);
        let tests = root.tests();
        assert_eq!(tests[0].test.as_ref().map(|test| test.exec.as_str()), Some("python3"));
    }

    #[test]
    fn test_consecutive_standalone_blocks() {
        let root = parse("## Steps\n\n```sh\necho a\n```\n\n```sh\necho b\n```\n");
        assert_eq!(root.test_count(), 2);
    }

    #[test]
    fn test_non_executable_fence_ignored() {
        let root = parse("## Data\n\n```json\n{}\n```\n");
        assert_eq!(root.test_count(), 0);
    }

    #[test]
    fn test_section_nesting() {
        let body = "# A\n\n## B\n\n| Name | CLI |\n|---|---|\n| one | echo 1 |\n\n## C\n\n### D\n\n| Name | CLI |\n|---|---|\n| two | echo 2 |\n\n# E\n";
        let root = parse(body);
        assert_eq!(root.kind, NodeKind::File);
        assert_eq!(root.children.len(), 2);

        let section_a = &root.children[0];
        assert_eq!(section_a.name, "A");
        assert_eq!(section_a.children.len(), 2);
        assert_eq!(section_a.children[0].name, "B");
        assert_eq!(section_a.children[0].children[0].name, "one");
        assert_eq!(section_a.children[1].children[0].name, "D");
        assert_eq!(section_a.children[1].children[0].children[0].name, "two");
        assert_eq!(root.children[1].name, "E");
    }

    #[test]
    fn test_table_row_count_matches() {
        let body = "| Name | CLI | Exit Code |\n|---|---|---|\n| a | true | 0 |\n| b | false | 1 |\n| c | true | 0 |\n";
        let root = parse(body);
        assert_eq!(names(&root), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_malformed_block_yaml_is_error() {
        let result = parse_document(
            "doc.md",
            "## command: bad\n\n```yaml\nexitCode: [\n```\n",
            &FrontMatter::default(),
            Path::new("."),
        );
        assert!(result.is_err());
    }
}
