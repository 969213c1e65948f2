//! The pipeline graph store.
//!
//! Nodes and edges live in a `StableDiGraph` so indices survive removals;
//! an id → index map gives O(1) lookup by backend id. petgraph reuses freed
//! slots, so iteration goes through separate insertion-order lists instead
//! of index order. All removals are idempotent: removing an unknown id is a
//! no-op, which tolerates out-of-order UI events.

use crate::id::NodeId;
use crate::model::*;
use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::{Dfs, EdgeRef};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Reasons a graph mutation was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node '{id}' is a {existing:?} node and cannot become {requested:?}")]
    KindChanged {
        id: NodeId,
        existing: NodeKind,
        requested: NodeKind,
    },

    #[error("node '{0}' has a payload that does not match its type")]
    KindMismatch(NodeId),

    #[error("edge '{edge}' references missing node '{missing}'")]
    DanglingEdge { edge: NodeId, missing: NodeId },

    #[error("edge '{edge}' would create a cycle")]
    WouldCycle { edge: NodeId },

    #[error("dummy node '{0}' already has an outgoing edge")]
    DummyFanOut(NodeId),

    #[error("node '{0}' not found")]
    NotFound(NodeId),
}

/// The complete pipeline graph for one project.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    graph: StableDiGraph<CanvasNode, CanvasEdge>,
    node_index: HashMap<NodeId, NodeIndex>,
    edge_index: HashMap<NodeId, EdgeIndex>,
    node_order: Vec<NodeId>,
    edge_order: Vec<NodeId>,
}

impl FlowGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a backend snapshot, dropping dangling edges.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let mut graph = Self::new();
        graph.replace_with(snapshot);
        graph
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &CanvasNode> {
        self.node_order.iter().filter_map(|id| self.get(*id))
    }

    /// All edges, in insertion order. A replaced edge keeps its place.
    pub fn edges(&self) -> impl Iterator<Item = &CanvasEdge> {
        self.edge_order.iter().filter_map(|id| self.get_edge(*id))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&CanvasNode> {
        self.node_index.get(&id).map(|idx| &self.graph[*idx])
    }

    pub fn get_edge(&self, id: NodeId) -> Option<&CanvasEdge> {
        self.edge_index.get(&id).map(|idx| &self.graph[*idx])
    }

    /// Direct producers of a node.
    pub fn parents(&self, id: NodeId) -> SmallVec<[NodeId; 2]> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct consumers of a node.
    pub fn children(&self, id: NodeId) -> SmallVec<[NodeId; 2]> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: NodeId, dir: Direction) -> SmallVec<[NodeId; 2]> {
        let Some(&idx) = self.node_index.get(&id) else {
            return SmallVec::new();
        };
        self.graph
            .neighbors_directed(idx, dir)
            .map(|n| self.graph[n].id)
            .collect()
    }

    /// The node and everything that transitively depends on it.
    /// The starting node comes first.
    pub fn downstream(&self, id: NodeId) -> Vec<NodeId> {
        let Some(&start) = self.node_index.get(&id) else {
            return Vec::new();
        };
        let mut dfs = Dfs::new(&self.graph, start);
        let mut out = Vec::new();
        while let Some(idx) = dfs.next(&self.graph) {
            out.push(self.graph[idx].id);
        }
        out
    }

    /// The source/model node an operation chain hangs from.
    ///
    /// Follows the first producer upward; a table node is its own root.
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        let mut idx = *self.node_index.get(&id)?;
        let mut visited = HashSet::new();
        loop {
            let node = &self.graph[idx];
            if node.kind.is_table() {
                return Some(node.id);
            }
            if !visited.insert(idx) {
                return None;
            }
            idx = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .next()?;
        }
    }

    pub fn dummy_nodes(&self) -> Vec<NodeId> {
        self.nodes().filter(|n| n.is_dummy).map(|n| n.id).collect()
    }

    // ─── Node mutations ──────────────────────────────────────────────────

    /// Insert a node, or update an existing one in place.
    ///
    /// An update replaces `data`, `output_columns` and `is_dummy`; the
    /// stored position and height are kept unless the incoming node carries
    /// its own. Returns `true` when the node was newly inserted.
    pub fn upsert_node(&mut self, node: CanvasNode) -> Result<bool, GraphError> {
        if !node.is_consistent() {
            return Err(GraphError::KindMismatch(node.id));
        }
        match self.node_index.get(&node.id) {
            Some(&idx) => {
                let existing = &mut self.graph[idx];
                if existing.kind != node.kind {
                    return Err(GraphError::KindChanged {
                        id: node.id,
                        existing: existing.kind,
                        requested: node.kind,
                    });
                }
                existing.data = node.data;
                existing.output_columns = node.output_columns;
                existing.is_dummy = node.is_dummy;
                if node.position.is_some() {
                    existing.position = node.position;
                }
                if node.height.is_some() {
                    existing.height = node.height;
                }
                Ok(false)
            }
            None => {
                let id = node.id;
                let idx = self.graph.add_node(node);
                self.node_index.insert(id, idx);
                self.node_order.push(id);
                Ok(true)
            }
        }
    }

    /// Remove a node and every edge touching it.
    ///
    /// Unknown ids are a no-op and return `None`.
    pub fn remove_node(&mut self, id: NodeId) -> Option<CanvasNode> {
        let idx = self.node_index.remove(&id)?;
        self.node_order.retain(|n| *n != id);
        self.forget_edges_of(idx);
        self.graph.remove_node(idx)
    }

    /// Remove every edge whose source or target is `id`.
    /// Returns the number of edges removed.
    pub fn remove_edges_touching(&mut self, id: NodeId) -> usize {
        let Some(&idx) = self.node_index.get(&id) else {
            return 0;
        };
        let edges = self.forget_edges_of(idx);
        for e in &edges {
            self.graph.remove_edge(*e);
        }
        edges.len()
    }

    /// Drop incident edges from the edge index; returns their indices.
    fn forget_edges_of(&mut self, idx: NodeIndex) -> Vec<EdgeIndex> {
        let incident: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| e.id())
            .collect();
        let mut forgotten = HashSet::new();
        for e in &incident {
            if let Some(edge) = self.graph.edge_weight(*e) {
                self.edge_index.remove(&edge.id);
                forgotten.insert(edge.id);
            }
        }
        self.edge_order.retain(|id| !forgotten.contains(id));
        incident
    }

    /// Set a node's position (drag gestures, layout). Returns false for
    /// unknown ids.
    pub fn set_position(&mut self, id: NodeId, position: Position) -> bool {
        match self.node_index.get(&id) {
            Some(&idx) => {
                self.graph[idx].position = Some(position);
                true
            }
            None => false,
        }
    }

    pub fn set_height(&mut self, id: NodeId, height: f32) -> bool {
        match self.node_index.get(&id) {
            Some(&idx) => {
                self.graph[idx].height = Some(height);
                true
            }
            None => false,
        }
    }

    // ─── Edge mutations ──────────────────────────────────────────────────

    /// Insert an edge, or replace the edge with the same id.
    ///
    /// Both endpoints must exist. Self loops and edges closing a cycle are
    /// refused, as are second outgoing edges from a dummy node.
    pub fn upsert_edge(&mut self, edge: CanvasEdge) -> Result<(), GraphError> {
        let source = self.require_endpoint(&edge, edge.source)?;
        let target = self.require_endpoint(&edge, edge.target)?;

        let previous = self.edge_index.get(&edge.id).copied();
        let unchanged = previous
            .and_then(|e| self.graph.edge_endpoints(e))
            .is_some_and(|ends| ends == (source, target));
        if unchanged {
            if let Some(e) = previous {
                self.graph[e] = edge;
            }
            return Ok(());
        }

        if source == target || has_path_connecting(&self.graph, target, source, None) {
            return Err(GraphError::WouldCycle { edge: edge.id });
        }
        if self.graph[source].is_dummy
            && self
                .graph
                .edges_directed(source, Direction::Outgoing)
                .any(|e| Some(e.id()) != previous)
        {
            return Err(GraphError::DummyFanOut(edge.source));
        }

        if let Some(e) = previous {
            self.graph.remove_edge(e);
        }
        let id = edge.id;
        let e = self.graph.add_edge(source, target, edge);
        self.edge_index.insert(id, e);
        if previous.is_none() {
            self.edge_order.push(id);
        }
        Ok(())
    }

    fn require_endpoint(&self, edge: &CanvasEdge, id: NodeId) -> Result<NodeIndex, GraphError> {
        self.node_index
            .get(&id)
            .copied()
            .ok_or(GraphError::DanglingEdge {
                edge: edge.id,
                missing: id,
            })
    }

    /// Remove one edge by id. Unknown ids are a no-op.
    pub fn remove_edge(&mut self, id: NodeId) -> Option<CanvasEdge> {
        let e = self.edge_index.remove(&id)?;
        self.edge_order.retain(|n| *n != id);
        self.graph.remove_edge(e)
    }

    // ─── Dummy staging ───────────────────────────────────────────────────

    /// Stage a dummy node under `parent`.
    ///
    /// Only one in-progress chain may exist per root: any dummy already
    /// hanging from the same root is discarded first. Returns the dummy's id.
    pub fn stage_dummy(&mut self, parent: NodeId, mut dummy: CanvasNode) -> Result<NodeId, GraphError> {
        let parent_node = self.get(parent).ok_or(GraphError::NotFound(parent))?;
        if parent_node.is_dummy {
            return Err(GraphError::DummyFanOut(parent));
        }
        dummy.is_dummy = true;

        let root = self.root_of(parent);
        let stale: Vec<NodeId> = self
            .dummy_nodes()
            .into_iter()
            .filter(|d| self.root_of(*d) == root)
            .collect();
        for id in stale {
            log::debug!("discarding dummy {id} superseded on the same chain");
            self.remove_node(id);
        }

        let id = dummy.id;
        self.upsert_node(dummy)?;
        if let Err(e) = self.upsert_edge(CanvasEdge::connect(parent, id)) {
            self.remove_node(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Remove every dummy node. Returns how many were discarded.
    pub fn discard_dummies(&mut self) -> usize {
        let dummies = self.dummy_nodes();
        for id in &dummies {
            self.remove_node(*id);
        }
        dummies.len()
    }

    // ─── Snapshots ───────────────────────────────────────────────────────

    /// Replace the contents with an authoritative snapshot.
    ///
    /// Local positions and heights win over the snapshot's for nodes that
    /// are still present; local dummies are discarded and dangling edges
    /// dropped.
    /// Returns the number of edges dropped.
    pub fn replace_with(&mut self, snapshot: GraphSnapshot) -> usize {
        let previous: HashMap<NodeId, (Option<Position>, Option<f32>)> = self
            .nodes()
            .filter(|n| !n.is_dummy)
            .map(|n| (n.id, (n.position, n.height)))
            .collect();

        let mut next = FlowGraph::new();
        for mut node in snapshot.nodes {
            if node.is_dummy {
                continue;
            }
            if let Some((position, height)) = previous.get(&node.id) {
                node.position = position.or(node.position);
                node.height = height.or(node.height);
            }
            if let Err(e) = next.upsert_node(node) {
                log::warn!("skipping node from snapshot: {e}");
            }
        }

        let mut dropped = 0;
        for edge in snapshot.edges {
            if let Err(e) = next.upsert_edge(edge) {
                log::warn!("dropping edge from snapshot: {e}");
                dropped += 1;
            }
        }

        *self = next;
        dropped
    }

    /// Update source/model nodes from a snapshot, leaving operation nodes
    /// untouched. New tables are added; edges are not modified.
    pub fn merge_tables(&mut self, snapshot: &GraphSnapshot) -> usize {
        let mut merged = 0;
        for node in snapshot.nodes.iter().filter(|n| n.kind.is_table()) {
            match self.upsert_node(node.clone()) {
                Ok(_) => merged += 1,
                Err(e) => log::warn!("skipping table metadata: {e}"),
            }
        }
        merged
    }

    /// Export the current contents (dummies excluded).
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let dummies: HashSet<NodeId> = self.dummy_nodes().into_iter().collect();
        GraphSnapshot {
            nodes: self.nodes().filter(|n| !n.is_dummy).cloned().collect(),
            edges: self
                .edges()
                .filter(|e| !dummies.contains(&e.source) && !dummies.contains(&e.target))
                .cloned()
                .collect(),
        }
    }
}
