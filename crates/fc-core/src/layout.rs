//! Default placement for newly created nodes.
//!
//! A rightmost-node heuristic, not an optimal layout: the new node goes
//! below the node with the greatest `x`, so consecutive additions cascade
//! instead of overlapping. Ties on `x` resolve to the node seen last.

use crate::graph::FlowGraph;
use crate::id::NodeId;
use crate::model::{CanvasNode, Position};

/// Where the first node lands on an empty canvas.
pub const ORIGIN_OFFSET: f32 = 50.0;
/// Vertical gap between a node and the one placed under it.
pub const NODE_GAP: f32 = 30.0;
/// Height assumed for nodes the renderer has not measured yet.
pub const DEFAULT_NODE_HEIGHT: f32 = 100.0;

/// Tunables for the placement heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub origin: Position,
    pub gap: f32,
    pub default_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin: Position::new(ORIGIN_OFFSET, ORIGIN_OFFSET),
            gap: NODE_GAP,
            default_height: DEFAULT_NODE_HEIGHT,
        }
    }
}

/// Whether a reported height counts as measured. Anything else falls back
/// to the configured default.
pub fn is_measured_height(height: f32) -> bool {
    height.is_finite() && height > 0.0
}

/// Compute the position for a new node using the default config.
pub fn compute_next_position<'a, I>(nodes: I) -> Position
where
    I: IntoIterator<Item = &'a CanvasNode>,
{
    compute_next_position_with(nodes, &LayoutConfig::default())
}

/// Compute the position for a new node.
///
/// Nodes without a position, or with a NaN/infinite one, are skipped. When
/// no usable node remains the configured origin is returned.
pub fn compute_next_position_with<'a, I>(nodes: I, config: &LayoutConfig) -> Position
where
    I: IntoIterator<Item = &'a CanvasNode>,
{
    let mut rightmost: Option<(Position, f32)> = None;

    for node in nodes {
        let Some(pos) = node.position else {
            continue;
        };
        if !pos.is_finite() {
            log::warn!("layout: skipping node {} with malformed position", node.id);
            continue;
        }
        let height = node
            .height
            .filter(|h| is_measured_height(*h))
            .unwrap_or(config.default_height);
        if rightmost.is_none_or(|(best, _)| pos.x >= best.x) {
            rightmost = Some((pos, height));
        }
    }

    match rightmost {
        Some((pos, height)) => Position::new(pos.x, pos.y + height + config.gap),
        None => config.origin,
    }
}

/// Give every node without a usable position one, in index order.
/// Returns the ids that were placed.
pub fn place_unpositioned(graph: &mut FlowGraph, config: &LayoutConfig) -> Vec<NodeId> {
    let pending: Vec<NodeId> = graph
        .nodes()
        .filter(|n| !n.position.is_some_and(|p| p.is_finite()))
        .map(|n| n.id)
        .collect();

    for id in &pending {
        let next = compute_next_position_with(graph.nodes(), config);
        graph.set_position(*id, next);
    }
    pending
}
