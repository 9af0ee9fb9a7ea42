//! Multiplies fixtures across the files matched by the front-matter `files` glob.

use std::collections::BTreeMap;
use std::path::{self, Path, PathBuf};

use crate::error::Result;
use crate::fixture::FixtureTest;
use crate::frontmatter::FrontMatter;
use crate::node::FixtureNode;

/// Regular files matching `pattern`, sorted. Relative patterns resolve
/// against `source_dir`.
///
/// # Errors
/// Returns an error when the pattern is invalid or a match cannot be read.
pub fn matched_files(pattern: &str, source_dir: &Path) -> Result<Vec<PathBuf>> {
    let full_pattern = if Path::new(pattern).is_absolute() {
        pattern.to_owned()
    } else {
        source_dir.join(pattern).to_string_lossy().into_owned()
    };

    let mut matches = Vec::new();
    for entry in glob::glob(&full_pattern)? {
        let path = entry?;
        if path.is_file() {
            matches.push(path);
        }
    }
    matches.sort();
    Ok(matches)
}

/// Template variables describing one matched file.
///
/// | key | value |
/// |-----|-------|
/// | `file` | path relative to `source_dir` |
/// | `filename` | final component |
/// | `dir` | relative parent, `.` when none |
/// | `absfile` / `absdir` | absolute path and parent |
/// | `basename` | file stem |
/// | `ext` | extension with its leading dot |
///
/// # Errors
/// Returns an I/O error when the absolute path cannot be resolved.
pub fn template_vars(path: &Path, source_dir: &Path) -> Result<BTreeMap<String, String>> {
    let relative = path.strip_prefix(source_dir).unwrap_or(path);
    let absolute = path::absolute(path)?;
    let display = |part: &Path| part.to_string_lossy().replace('\\', "/");

    let dir = relative
        .parent()
        .map(display)
        .filter(|dir| !dir.is_empty())
        .unwrap_or_else(|| ".".to_owned());
    let os_text = |part: Option<&std::ffi::OsStr>| {
        part.map(|text| text.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    let mut vars = BTreeMap::new();
    vars.insert("file".to_owned(), display(relative));
    vars.insert("filename".to_owned(), os_text(path.file_name()));
    vars.insert("dir".to_owned(), dir);
    vars.insert("absfile".to_owned(), display(&absolute));
    vars.insert(
        "absdir".to_owned(),
        absolute.parent().map(display).unwrap_or_default(),
    );
    vars.insert("basename".to_owned(), os_text(path.file_stem()));
    vars.insert(
        "ext".to_owned(),
        path.extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default(),
    );
    Ok(vars)
}

/// Expand a flat list of fixtures: one independent copy per matched file.
///
/// Without a `files` glob, or when it matches nothing, the input is returned
/// unchanged.
///
/// # Errors
/// Returns an error when the glob is invalid or a match cannot be resolved.
pub fn expand_tests(
    tests: Vec<FixtureTest>,
    front_matter: &FrontMatter,
    source_dir: &Path,
) -> Result<Vec<FixtureTest>> {
    let Some(matches) = matches_for(front_matter, source_dir)? else {
        return Ok(tests);
    };

    let mut expanded = Vec::with_capacity(tests.len() * matches.len());
    for test in &tests {
        for (path, vars) in &matches {
            expanded.push(copy_for(test, path, vars));
        }
    }
    Ok(expanded)
}

/// Expand every test node in `root` in place. Each copy gets a fresh node id.
///
/// # Errors
/// Returns an error when the glob is invalid or a match cannot be resolved.
pub fn expand_tree(root: &mut FixtureNode, front_matter: &FrontMatter, source_dir: &Path) -> Result<()> {
    let Some(matches) = matches_for(front_matter, source_dir)? else {
        return Ok(());
    };
    expand_children(root, &matches);
    Ok(())
}

type Match = (PathBuf, BTreeMap<String, String>);

fn matches_for(front_matter: &FrontMatter, source_dir: &Path) -> Result<Option<Vec<Match>>> {
    let pattern = front_matter.files.trim();
    if pattern.is_empty() {
        return Ok(None);
    }

    let paths = matched_files(pattern, source_dir)?;
    if paths.is_empty() {
        tracing::warn!(pattern, "files glob matched nothing, fixtures left unexpanded");
        return Ok(None);
    }
    tracing::debug!(pattern, matches = paths.len(), "expanding fixtures across files");

    paths
        .into_iter()
        .map(|path| {
            let vars = template_vars(&path, source_dir)?;
            Ok((path, vars))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn expand_children(node: &mut FixtureNode, matches: &[Match]) {
    let children = std::mem::take(&mut node.children);
    for mut child in children {
        if let Some(test) = child.test.as_ref().filter(|_| child.is_test()) {
            for (path, vars) in matches {
                node.children
                    .push(FixtureNode::test(copy_for(test, path, vars)));
            }
        } else {
            expand_children(&mut child, matches);
            node.children.push(child);
        }
    }
}

fn copy_for(test: &FixtureTest, path: &Path, vars: &BTreeMap<String, String>) -> FixtureTest {
    let mut copy = test.clone();
    let label = vars
        .get("file")
        .cloned()
        .unwrap_or_else(|| path.display().to_string());
    copy.name = format!("{} [{label}]", test.name);
    copy.template_vars
        .extend(vars.iter().map(|(key, value)| (key.clone(), value.clone())));
    copy
}
