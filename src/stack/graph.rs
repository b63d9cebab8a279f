use crate::errors::{Result, StaxError};
use crate::stack::metadata::BranchMetadata;
use crate::stack::store::BranchStore;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef as _;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Parent -> child DAG of tracked branches, rooted at trunk.
///
/// Rebuilt from a store snapshot whenever it is needed and never mutated
/// afterwards; every vertex other than trunk has exactly one parent.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
    trunk: String,
}

impl DependencyGraph {
    /// Build the graph for every tracked entry in `store`
    pub fn from_store(store: &BranchStore, trunk: &str) -> Result<Self> {
        Self::build(&store.snapshot(), trunk)
    }

    /// Build from metadata entries.
    ///
    /// Parents that are not tracked themselves get a placeholder vertex, and
    /// any vertex left without a parent is hung under trunk.
    pub fn build(entries: &[BranchMetadata], trunk: &str) -> Result<Self> {
        let mut dag = Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            trunk: trunk.to_string(),
        };
        dag.vertex(trunk);

        let tracked: Vec<&BranchMetadata> = entries
            .iter()
            .filter(|meta| meta.is_tracked() && !meta.name.is_empty())
            .filter(|meta| {
                if meta.name == trunk {
                    debug!("Ignoring parent '{}' recorded for trunk", meta.parent);
                }
                meta.name != trunk
            })
            .collect();

        for meta in &tracked {
            dag.vertex(&meta.name);
        }

        for meta in &tracked {
            let parent = dag.vertex(&meta.parent);
            let child = dag.nodes[&meta.name];
            if algo::has_path_connecting(&dag.graph, child, parent, None) {
                return Err(StaxError::graph(format!(
                    "Setting '{}' as the parent of '{}' would create a cycle",
                    meta.parent, meta.name
                )));
            }
            dag.graph.add_edge(parent, child, ());
        }

        let trunk_node = dag.nodes[trunk];
        let mut roots: Vec<NodeIndex> = dag
            .graph
            .node_indices()
            .filter(|&node| node != trunk_node)
            .filter(|&node| {
                dag.graph
                    .edges_directed(node, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect();
        roots.sort_by(|a, b| dag.graph[*a].cmp(&dag.graph[*b]));

        for root in roots {
            debug!("Attaching orphan '{}' to '{}'", dag.graph[root], trunk);
            dag.graph.add_edge(trunk_node, root, ());
        }

        Ok(dag)
    }

    fn vertex(&mut self, name: &str) -> NodeIndex {
        if let Some(&node) = self.nodes.get(name) {
            return node;
        }
        let node = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), node);
        node
    }

    pub fn trunk(&self) -> &str {
        &self.trunk
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Parent vertex of `name` in this graph
    pub fn parent(&self, name: &str) -> Option<&str> {
        let node = *self.nodes.get(name)?;
        self.graph
            .edges_directed(node, Direction::Incoming)
            .next()
            .map(|edge| self.graph[edge.source()].as_str())
    }

    /// Direct children, sorted by name
    pub fn children(&self, name: &str) -> Vec<&str> {
        let Some(&node) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut children: Vec<&str> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| self.graph[edge.target()].as_str())
            .collect();
        children.sort_unstable();
        children
    }

    /// Lineage above `name`, nearest first, ending at trunk
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let mut lineage = Vec::new();
        let mut seen = HashSet::new();
        let mut current = name;
        while let Some(parent) = self.parent(current) {
            if !seen.insert(parent) {
                break;
            }
            lineage.push(parent.to_string());
            current = parent;
        }
        lineage
    }

    /// Everything below `name`, depth-first, each parent before its children
    pub fn descendants(&self, name: &str) -> Vec<String> {
        let mut ordered = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<&str> = self.children(name).into_iter().rev().collect();

        while let Some(branch) = stack.pop() {
            if !visited.insert(branch) {
                continue;
            }
            ordered.push(branch.to_string());
            stack.extend(self.children(branch).into_iter().rev());
        }
        ordered
    }

    /// (parent, child) pairs reachable from `root`, parent-before-child.
    ///
    /// When `root` is trunk this covers the whole graph.
    pub fn edges_below(&self, root: &str) -> Vec<(String, String)> {
        self.descendants(root)
            .into_iter()
            .filter_map(|child| {
                self.parent(&child)
                    .map(|parent| (parent.to_string(), child.clone()))
            })
            .collect()
    }

    /// Subgraph for the stack `branch` belongs to: its single lineage up to
    /// trunk, itself, and every descendant. Trunk yields the full graph.
    pub fn current_stack(&self, branch: &str) -> Result<Self> {
        if branch == self.trunk {
            return Ok(self.clone());
        }
        if !self.contains(branch) {
            return Err(StaxError::branch(format!(
                "Branch '{branch}' is not part of any stack"
            )));
        }

        let mut members: HashSet<String> = self.ancestors(branch).into_iter().collect();
        members.insert(branch.to_string());
        members.extend(self.descendants(branch));

        let mut sub = Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            trunk: self.trunk.clone(),
        };
        sub.vertex(&self.trunk);

        let mut ordered: Vec<&String> = members.iter().collect();
        ordered.sort();
        for name in ordered {
            if let Some(parent) = self.parent(name) {
                if members.contains(parent) {
                    let p = sub.vertex(parent);
                    let c = sub.vertex(name);
                    sub.graph.add_edge(p, c, ());
                }
            } else {
                sub.vertex(name);
            }
        }

        Ok(sub)
    }
}
