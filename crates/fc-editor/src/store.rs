//! The focused node that drives the configuration panel.

use fc_core::NodeId;
use serde::{Deserialize, Serialize};

/// What the config panel is doing with the focused node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum PanelMode {
    /// Configuring a staged dummy chained after `parent`.
    Create { parent: NodeId },
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusedNode {
    pub id: NodeId,
    #[serde(flatten)]
    pub mode: PanelMode,
}

impl FocusedNode {
    pub fn edit(id: NodeId) -> Self {
        Self {
            id,
            mode: PanelMode::Edit,
        }
    }

    pub fn create(id: NodeId, parent: NodeId) -> Self {
        Self {
            id,
            mode: PanelMode::Create { parent },
        }
    }
}

/// At most one node is focused at a time; setting a new one replaces the
/// previous focus outright.
#[derive(Debug, Clone, Default)]
pub struct CanvasNodeStore {
    focused: Option<FocusedNode>,
}

impl CanvasNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some` opens the panel for that node, `None` closes it.
    pub fn set_canvas_node(&mut self, node: Option<FocusedNode>) {
        if self.focused != node {
            log::debug!("focus {:?} -> {:?}", self.focused.map(|f| f.id), node.map(|f| f.id));
        }
        self.focused = node;
    }

    pub fn canvas_node(&self) -> Option<&FocusedNode> {
        self.focused.as_ref()
    }

    pub fn is_panel_open(&self) -> bool {
        self.focused.is_some()
    }

    pub fn is_focused(&self, id: NodeId) -> bool {
        self.focused.is_some_and(|f| f.id == id)
    }

    /// Close the panel if it belongs to `id`. Returns whether it did.
    pub fn clear_if(&mut self, id: NodeId) -> bool {
        if self.is_focused(id) {
            self.set_canvas_node(None);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn last_focus_wins() {
        let mut store = CanvasNodeStore::new();
        store.set_canvas_node(Some(FocusedNode::edit(NodeId::intern("a"))));
        store.set_canvas_node(Some(FocusedNode::edit(NodeId::intern("b"))));
        assert!(store.is_focused(NodeId::intern("b")));
        assert!(!store.is_focused(NodeId::intern("a")));
    }

    #[test]
    fn clear_if_only_touches_matching_node() {
        let mut store = CanvasNodeStore::new();
        store.set_canvas_node(Some(FocusedNode::edit(NodeId::intern("a"))));
        assert!(!store.clear_if(NodeId::intern("z")));
        assert!(store.is_panel_open());
        assert!(store.clear_if(NodeId::intern("a")));
        assert_eq!(store.canvas_node(), None);
    }

    #[test]
    fn focus_serializes_with_flat_mode() {
        let focus = FocusedNode::create(NodeId::intern("dummy_1"), NodeId::intern("src"));
        let value = serde_json::to_value(focus).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "id": "dummy_1", "mode": "create", "parent": "src" })
        );
    }
}
