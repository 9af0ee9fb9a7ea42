use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef as _;
use petgraph::{Direction, algo};

use crate::error::{Result, RunError};
use crate::scheduler::TaskId;

/// Immutable task dependency graph
#[derive(Debug, Clone)]
pub struct TaskGraph {
    graph: DiGraph<TaskId, ()>,
    nodes: HashMap<TaskId, NodeIndex>,
}

impl TaskGraph {
    /// Build from `(task, dependencies)` pairs.
    ///
    /// # Errors
    /// Returns `UnknownDependency` if a dependency is not itself a task.
    pub fn from_dependencies(tasks: &[(TaskId, Vec<TaskId>)]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for (task, _) in tasks {
            nodes.insert(*task, graph.add_node(*task));
        }

        for (task, dependencies) in tasks {
            let task_node = nodes[task];
            for dependency in dependencies {
                let dep_node = nodes
                    .get(dependency)
                    .copied()
                    .ok_or(RunError::UnknownDependency(*dependency))?;
                graph.add_edge(dep_node, task_node, ());
            }
        }

        Ok(Self { graph, nodes })
    }

    /// Tasks not yet finished whose dependencies all are, in insertion order
    #[must_use]
    pub fn ready_tasks(&self, finished: &HashSet<TaskId>) -> Vec<TaskId> {
        self.graph
            .node_indices()
            .filter_map(|node| {
                let task = self.graph[node];
                if finished.contains(&task) {
                    return None;
                }

                let deps_satisfied = self
                    .graph
                    .edges_directed(node, Direction::Incoming)
                    .all(|edge| finished.contains(&self.graph[edge.source()]));

                deps_satisfied.then_some(task)
            })
            .collect()
    }

    /// Direct dependencies of `task`
    #[must_use]
    pub fn dependencies(&self, task: TaskId) -> Vec<TaskId> {
        self.nodes.get(&task).map_or_else(Vec::new, |&node| {
            self.graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|dep| self.graph[dep])
                .collect()
        })
    }

    /// Detect cycles (invalid graph)
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        algo::is_cyclic_directed(&self.graph)
    }

    /// Get total task count
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }
}
