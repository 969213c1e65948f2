//! The seam to whatever draws the canvas.
//!
//! The engine owns the model; a renderer only reads it through a
//! `CanvasView` and reports gestures back via `CanvasEngine::move_node`,
//! `CanvasEngine::set_node_height` and action dispatch.

use crate::preview::PreviewPane;
use crate::store::FocusedNode;
use fc_core::{CanvasEdge, CanvasNode, FlowGraph, NodeId};

/// Borrowed, read-only view of everything a renderer needs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct CanvasView<'a> {
    pub(crate) graph: &'a FlowGraph,
    pub(crate) focused: Option<&'a FocusedNode>,
    pub(crate) preview: &'a PreviewPane,
}

impl<'a> CanvasView<'a> {
    pub fn nodes(&self) -> impl Iterator<Item = &'a CanvasNode> + 'a {
        self.graph.nodes()
    }

    pub fn edges(&self) -> impl Iterator<Item = &'a CanvasEdge> + 'a {
        self.graph.edges()
    }

    pub fn focused(&self) -> Option<&'a FocusedNode> {
        self.focused
    }

    pub fn is_focused(&self, id: NodeId) -> bool {
        self.focused.is_some_and(|f| f.id == id)
    }

    pub fn preview(&self) -> &'a PreviewPane {
        self.preview
    }
}

pub trait CanvasRenderer {
    fn render(&mut self, view: CanvasView<'_>);
}
