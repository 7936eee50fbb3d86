//! Pattern tree: monitor patterns decomposed into path segments.
//!
//! Every configured pattern is split on `/` and threaded through the tree
//! one segment per edge. Patterns sharing a prefix share its edges, so the
//! matching (and, in event mode, the OS watches) for a common directory
//! happen once no matter how many monitors live below it.
//!
//! The tree is an arena: nodes and edges are addressed by [`NodeId`] and
//! [`EdgeId`] and never removed. A reload builds a fresh tree.

use std::fmt;

use crate::config::{Config, MonitorId};

/// Index of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Index of an edge in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(usize);

impl EdgeId {
    /// Position of the edge in arena order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A directory level: the edges one segment further down.
#[derive(Debug, Default)]
pub struct PatternNode {
    edges: Vec<EdgeId>,
}

impl PatternNode {
    /// Child edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }
}

/// One path segment.
#[derive(Debug)]
pub struct PatternEdge {
    name: String,
    path: String,
    is_file: bool,
    instances: Vec<MonitorId>,
    child: Option<NodeId>,
    parent: NodeId,
}

impl PatternEdge {
    /// Segment text, possibly containing wildcards.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pattern prefix up to and including this segment.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this edge matches files (the last segment of its patterns).
    #[must_use]
    pub const fn is_file(&self) -> bool {
        self.is_file
    }

    /// Monitors whose pattern runs through this edge, in configuration order.
    #[must_use]
    pub fn instances(&self) -> &[MonitorId] {
        &self.instances
    }

    /// Node below a directory edge; `None` for file edges.
    #[must_use]
    pub const fn child(&self) -> Option<NodeId> {
        self.child
    }

    /// Node this edge hangs off.
    #[must_use]
    pub const fn parent(&self) -> NodeId {
        self.parent
    }
}

/// Arena of pattern nodes and edges.
#[derive(Debug)]
pub struct PatternTree {
    nodes: Vec<PatternNode>,
    edges: Vec<PatternEdge>,
}

impl Default for PatternTree {
    fn default() -> Self {
        Self::new()
    }
}

struct Segment<'a> {
    name: &'a str,
    path: String,
    is_last: bool,
}

fn segments(pattern: &str) -> Vec<Segment<'_>> {
    let absolute = pattern.starts_with('/');
    let parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();

    let mut out = Vec::with_capacity(parts.len() + 1);
    let mut prefix = String::new();
    if absolute {
        prefix.push('/');
        out.push(Segment {
            name: "/",
            path: prefix.clone(),
            is_last: parts.is_empty(),
        });
    }
    for (i, part) in parts.iter().enumerate() {
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        prefix.push_str(part);
        out.push(Segment {
            name: part,
            path: prefix.clone(),
            is_last: i + 1 == parts.len(),
        });
    }
    out
}

impl PatternTree {
    /// The root node.
    pub const ROOT: NodeId = NodeId(0);

    /// Create a tree with only the root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![PatternNode::default()],
            edges: Vec::new(),
        }
    }

    /// Build the tree for every configured monitor.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut tree = Self::new();
        for (id, monitor) in config.monitors_with_ids() {
            tree.insert(&monitor.file, id);
        }
        tracing::debug!(
            nodes = tree.nodes.len(),
            edges = tree.edges.len(),
            "Pattern tree built"
        );
        tree
    }

    /// Bind `instance` to every edge along `pattern`, creating edges as
    /// needed.
    ///
    /// A segment that one pattern uses as a directory and another as its
    /// final file segment cannot be both; the role it got first is kept and
    /// the conflicting instance is not bound. Returns whether it was bound.
    pub fn insert(&mut self, pattern: &str, instance: MonitorId) -> bool {
        let segments = segments(pattern);
        if segments.is_empty() {
            tracing::warn!(pattern, "Empty pattern, not monitored");
            return false;
        }

        if let Some(conflict) = self.role_conflict(&segments) {
            tracing::warn!(
                pattern,
                segment = %conflict,
                "Pattern uses a path both as file and as directory, not monitored"
            );
            return false;
        }

        let mut node = Self::ROOT;
        for segment in segments {
            let edge = match self.find_child(node, segment.name) {
                Some(edge) => {
                    let edge_ref = &mut self.edges[edge.0];
                    if !edge_ref.instances.contains(&instance) {
                        edge_ref.instances.push(instance);
                    }
                    edge
                }
                None => self.add_edge(node, segment, instance),
            };
            match self.edges[edge.0].child {
                Some(child) => node = child,
                None => break,
            }
        }
        true
    }

    fn role_conflict(&self, segments: &[Segment<'_>]) -> Option<String> {
        let mut node = Self::ROOT;
        for segment in segments {
            let edge = &self.edges[self.find_child(node, segment.name)?.0];
            if edge.is_file != segment.is_last {
                return Some(edge.path.clone());
            }
            node = edge.child?;
        }
        None
    }

    fn add_edge(&mut self, parent: NodeId, segment: Segment<'_>, instance: MonitorId) -> EdgeId {
        let child = (!segment.is_last).then(|| {
            self.nodes.push(PatternNode::default());
            NodeId(self.nodes.len() - 1)
        });
        let id = EdgeId(self.edges.len());
        self.edges.push(PatternEdge {
            name: segment.name.to_string(),
            path: segment.path,
            is_file: segment.is_last,
            instances: vec![instance],
            child,
            parent,
        });
        self.nodes[parent.0].edges.push(id);
        id
    }

    fn find_child(&self, node: NodeId, name: &str) -> Option<EdgeId> {
        self.nodes[node.0]
            .edges
            .iter()
            .copied()
            .find(|e| self.edges[e.0].name == name)
    }

    /// Node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &PatternNode {
        &self.nodes[id.0]
    }

    /// Edge by id.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &PatternEdge {
        &self.edges[id.0]
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All edges in arena order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len()).map(EdgeId)
    }

    /// Find the edge whose prefix path is exactly `path`.
    #[must_use]
    pub fn find_edge(&self, path: &str) -> Option<EdgeId> {
        self.edges.iter().position(|e| e.path == path).map(EdgeId)
    }
}
