//! Reads fixture documents from disk into trees.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::expand::expand_tree;
use crate::frontmatter::split_front_matter;
use crate::node::FixtureNode;
use crate::parser::parse_document;

/// Extension fixture documents carry.
const DOCUMENT_EXTENSION: &str = "md";

/// Load one document: split front-matter, parse, then expand across the
/// `files` glob. The file node is named after `path`.
///
/// # Errors
/// Returns an error if the file cannot be read, its front-matter is
/// malformed, or its glob is invalid.
pub fn load_file(path: &Path) -> Result<FixtureNode> {
    let content = fs::read_to_string(path)?;
    let source_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let (front_matter, body) = split_front_matter(&content, path)?;
    let mut root = parse_document(&path.display().to_string(), body, &front_matter, &source_dir)?;
    expand_tree(&mut root, &front_matter, &source_dir)?;

    tracing::debug!(file = %path.display(), tests = root.test_count(), "loaded fixture document");
    Ok(root)
}

/// Every markdown document under `dir`, recursively, in sorted order.
///
/// # Errors
/// Returns an error if a directory cannot be read.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    collect_documents(dir, &mut documents)?;
    documents.sort();
    Ok(documents)
}

fn collect_documents(dir: &Path, documents: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_documents(&path, documents)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
        {
            documents.push(path);
        }
    }
    Ok(())
}

/// Load several documents under one root node named `name`.
///
/// # Errors
/// Returns the first error raised by [`load_file`].
pub fn load_suite(name: &str, paths: &[PathBuf]) -> Result<FixtureNode> {
    let mut suite = FixtureNode::file(name);
    for path in paths {
        suite.children.push(load_file(path)?);
    }
    Ok(suite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_file_with_expansion() {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir(dir.path().join("inputs")).expect("mkdir");
        fs::write(dir.path().join("inputs/one.txt"), "1").expect("write");
        fs::write(dir.path().join("inputs/two.txt"), "2").expect("write");

        let doc = dir.path().join("cat.md");
        fs::write(
            &doc,
            "---\nfiles: \"inputs/*.txt\"\n---\n# Cat\n\n## command: cat it\n\n```bash\ncat {{file}}\n```\n",
        )
        .expect("write");

        let root = load_file(&doc).expect("load");
        let names: Vec<_> = root.tests().iter().map(|node| node.name.clone()).collect();
        assert_eq!(names, vec!["cat it [inputs/one.txt]", "cat it [inputs/two.txt]"]);

        let tests = root.tests();
        let test = tests[0].test.as_ref().expect("payload");
        assert_eq!(test.source_dir, dir.path());
        assert_eq!(test.render(&test.args[1]), "cat inputs/one.txt\n");
    }

    #[test]
    fn test_discover_sorted_markdown_only() {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir(dir.path().join("nested")).expect("mkdir");
        fs::write(dir.path().join("b.md"), "").expect("write");
        fs::write(dir.path().join("a.md"), "").expect("write");
        fs::write(dir.path().join("notes.txt"), "").expect("write");
        fs::write(dir.path().join("nested/c.md"), "").expect("write");

        let found = discover(dir.path()).expect("discover");
        assert_eq!(
            found,
            vec![
                dir.path().join("a.md"),
                dir.path().join("b.md"),
                dir.path().join("nested/c.md"),
            ]
        );
    }

    #[test]
    fn test_load_suite() {
        let dir = TempDir::new().expect("temp dir");
        let first = dir.path().join("first.md");
        let second = dir.path().join("second.md");
        fs::write(&first, "# One\n\n```sh\necho 1\n```\n").expect("write");
        fs::write(&second, "| Name | CLI |\n|---|---|\n| two | echo 2 |\n").expect("write");

        let suite = load_suite("suite", &[first, second]).expect("load");
        assert_eq!(suite.children.len(), 2);
        assert_eq!(suite.test_count(), 2);
    }

    #[test]
    fn test_missing_file() {
        assert!(load_file(Path::new("/definitely/not/here.md")).is_err());
    }
}
