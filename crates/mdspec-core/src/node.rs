//! The fixture tree: files, sections and tests, plus rolled-up statistics.

use core::ops::AddAssign;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fixture::FixtureTest;
use crate::result::{FixtureResult, Status};

/// Stable identity of a tree node, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Allocate a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A markdown document (or a suite of them)
    File,
    /// A heading and everything nested under it
    Section,
    /// A single executable fixture
    Test,
}

/// Aggregated pass/fail counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Tests counted
    pub total: usize,
    /// Tests that passed
    pub passed: usize,
    /// Tests that failed or errored
    pub failed: usize,
    /// Tests that never ran
    pub skipped: usize,
}

impl Stats {
    /// Whether any test failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Count one outcome.
    pub fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Pass => self.passed += 1,
            Status::Fail | Status::Error => self.failed += 1,
            Status::Skip => self.skipped += 1,
        }
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// A node in the fixture tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureNode {
    /// Stable identity
    pub id: NodeId,
    /// Node kind
    pub kind: NodeKind,
    /// File path, heading text or test name
    pub name: String,
    /// Heading level for sections, 0 otherwise
    pub level: u8,
    /// Ordered children
    pub children: Vec<FixtureNode>,
    /// Payload for test nodes
    pub test: Option<FixtureTest>,
    /// Outcome, written once after execution
    pub result: Option<FixtureResult>,
    /// Rolled-up statistics, computed after execution
    pub stats: Stats,
}

impl FixtureNode {
    fn with_kind(kind: NodeKind, name: String, level: u8) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            name,
            level,
            children: Vec::new(),
            test: None,
            result: None,
            stats: Stats::default(),
        }
    }

    /// A file node.
    #[must_use]
    pub fn file(name: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::File, name.into(), 0)
    }

    /// A section node for a heading at `level`.
    #[must_use]
    pub fn section(name: impl Into<String>, level: u8) -> Self {
        Self::with_kind(NodeKind::Section, name.into(), level)
    }

    /// A test node wrapping `test`.
    #[must_use]
    pub fn test(test: FixtureTest) -> Self {
        let mut node = Self::with_kind(NodeKind::Test, test.name.clone(), 0);
        node.test = Some(test);
        node
    }

    /// Whether this is a test node.
    #[must_use]
    pub fn is_test(&self) -> bool {
        self.kind == NodeKind::Test
    }

    /// All test nodes in document order.
    #[must_use]
    pub fn tests(&self) -> Vec<&Self> {
        let mut found = Vec::new();
        self.collect_tests(&mut found);
        found
    }

    fn collect_tests<'tree>(&'tree self, found: &mut Vec<&'tree Self>) {
        if self.is_test() {
            found.push(self);
        }
        for child in &self.children {
            child.collect_tests(found);
        }
    }

    /// Number of test nodes in this subtree.
    #[must_use]
    pub fn test_count(&self) -> usize {
        usize::from(self.is_test())
            + self
                .children
                .iter()
                .map(Self::test_count)
                .sum::<usize>()
    }

    /// Visit every test node mutably, in document order.
    pub fn for_each_test_mut(&mut self, visit: &mut impl FnMut(&mut Self)) {
        if self.is_test() {
            visit(self);
        }
        for child in &mut self.children {
            child.for_each_test_mut(visit);
        }
    }

    /// Find a node by identity.
    #[must_use]
    pub fn find(&self, id: NodeId) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Attach an outcome. Returns `false` and leaves the node untouched if a
    /// result is already present.
    pub fn attach_result(&mut self, result: FixtureResult) -> bool {
        if self.result.is_some() {
            tracing::warn!(node = %self.name, "result already attached, ignoring second write");
            return false;
        }
        self.result = Some(result);
        true
    }

    /// Recompute `stats` for this subtree, bottom-up, and return this node's.
    ///
    /// A node's stats are its own outcome (for tests) plus the sum of its
    /// children's stats. Tests without a result are not counted.
    pub fn compute_stats(&mut self) -> Stats {
        let mut stats = Stats::default();
        if let Some(result) = &self.result {
            stats.record(result.status);
        }
        for child in &mut self.children {
            stats += child.compute_stats();
        }
        self.stats = stats;
        stats
    }

    /// Remove every section subtree whose computed `stats.total` is zero.
    ///
    /// Call after [`compute_stats`](Self::compute_stats).
    pub fn prune_empty_sections(&mut self) {
        self.children
            .retain(|child| child.kind != NodeKind::Section || child.stats.total > 0);
        for child in &mut self.children {
            child.prune_empty_sections();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node(name: &str, status: Option<Status>) -> FixtureNode {
        let mut node = FixtureNode::test(FixtureTest {
            name: name.to_owned(),
            ..FixtureTest::default()
        });
        if let Some(status) = status {
            let mut result = FixtureResult::pass(name);
            result.status = status;
            node.result = Some(result);
        }
        node
    }

    #[test]
    fn test_stats_record() {
        let mut stats = Stats::default();
        stats.record(Status::Pass);
        stats.record(Status::Error);
        stats.record(Status::Skip);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert!(stats.has_failures());
    }

    #[test]
    fn test_compute_stats_nested() {
        let mut inner = FixtureNode::section("inner", 3);
        inner.children.push(test_node("c", Some(Status::Fail)));

        let mut outer = FixtureNode::section("outer", 2);
        outer.children.push(test_node("a", Some(Status::Pass)));
        outer.children.push(test_node("b", Some(Status::Pass)));
        outer.children.push(inner);

        let mut root = FixtureNode::file("doc.md");
        root.children.push(outer);

        let stats = root.compute_stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(root.children[0].stats.total, 3);
        assert_eq!(root.children[0].children[2].stats.total, 1);
    }

    #[test]
    fn test_prune_empty_sections() {
        let mut empty = FixtureNode::section("empty", 2);
        empty.children.push(FixtureNode::section("deeper", 3));

        let mut full = FixtureNode::section("full", 2);
        full.children.push(test_node("a", Some(Status::Pass)));
        full.children.push(FixtureNode::section("hollow", 3));

        let mut root = FixtureNode::file("doc.md");
        root.children.push(empty);
        root.children.push(full);

        root.compute_stats();
        root.prune_empty_sections();

        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "full");
        assert_eq!(root.children[0].children.len(), 1);
        assert!(root.children[0].children[0].is_test());
    }

    #[test]
    fn test_attach_result_once() {
        let mut node = test_node("a", None);
        assert!(node.attach_result(FixtureResult::pass("a")));
        assert!(!node.attach_result(FixtureResult::fail("a", "late")));
        assert_eq!(node.result.as_ref().map(|result| result.status), Some(Status::Pass));
    }

    #[test]
    fn test_find_and_count() {
        let leaf = test_node("a", None);
        let leaf_id = leaf.id;
        let mut root = FixtureNode::file("doc.md");
        let mut section = FixtureNode::section("s", 1);
        section.children.push(leaf);
        section.children.push(test_node("b", None));
        root.children.push(section);

        assert_eq!(root.test_count(), 2);
        assert_eq!(root.tests().len(), 2);
        assert_eq!(root.find(leaf_id).map(|node| node.name.as_str()), Some("a"));
        assert!(root.find(NodeId::new()).is_none());
    }
}
