//! Intents carried by the canvas mailboxes.
//!
//! Both enums serialize as `{"type": ..., "data": ...}` with the kebab-case
//! wire names the rest of the console uses.

use fc_core::{CanvasNode, NodeData, NodeId, OperationType};
use serde::{Deserialize, Serialize};

/// An intent for the canvas engine. Idle is an empty mailbox, not a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum CanvasAction {
    /// Place a source or model on the canvas and focus it.
    #[serde(rename = "add-srcmodel-node")]
    AddSrcModelNode { node: CanvasNode },

    /// Delete one node; edges touching it go with it.
    DeleteNode { id: NodeId },

    /// Delete a node and everything downstream of it.
    DeleteSourceTreeNode { id: NodeId },

    RefreshCanvas,

    /// Open the config panel for `node`. With `create`, a dummy operation of
    /// that type is staged under `node` and focused instead.
    #[serde(rename = "open-opconfig-panel")]
    OpenOpConfigPanel {
        node: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        create: Option<OperationType>,
    },

    #[serde(rename = "close-reset-opconfig-panel")]
    CloseResetOpConfigPanel,

    SyncSources,

    RunWorkflow,

    /// Server-confirmed data for an existing node.
    #[serde(rename_all = "camelCase")]
    UpdateCanvasNode {
        id: NodeId,
        data: NodeData,
        #[serde(default)]
        output_columns: Vec<String>,
    },
}

impl CanvasAction {
    /// The wire name of the action's `type` field.
    pub fn wire_name(&self) -> &'static str {
        match self {
            CanvasAction::AddSrcModelNode { .. } => "add-srcmodel-node",
            CanvasAction::DeleteNode { .. } => "delete-node",
            CanvasAction::DeleteSourceTreeNode { .. } => "delete-source-tree-node",
            CanvasAction::RefreshCanvas => "refresh-canvas",
            CanvasAction::OpenOpConfigPanel { .. } => "open-opconfig-panel",
            CanvasAction::CloseResetOpConfigPanel => "close-reset-opconfig-panel",
            CanvasAction::SyncSources => "sync-sources",
            CanvasAction::RunWorkflow => "run-workflow",
            CanvasAction::UpdateCanvasNode { .. } => "update-canvas-node",
        }
    }
}

/// Read-only preview intents, kept apart from graph edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum PreviewAction {
    Preview(NodeId),
    ClearPreview,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{NodeKind, TableDescriptor};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn every_action() -> Vec<CanvasAction> {
        let id = NodeId::intern("n-1");
        let table = TableDescriptor {
            name: "orders".into(),
            display_name: "Orders".into(),
            schema: "raw".into(),
            source_name: "shop".into(),
            sql_path: String::new(),
        };
        vec![
            CanvasAction::AddSrcModelNode {
                node: CanvasNode::table(id, NodeKind::Source, table.clone()),
            },
            CanvasAction::DeleteNode { id },
            CanvasAction::DeleteSourceTreeNode { id },
            CanvasAction::RefreshCanvas,
            CanvasAction::OpenOpConfigPanel { node: id, create: None },
            CanvasAction::CloseResetOpConfigPanel,
            CanvasAction::SyncSources,
            CanvasAction::RunWorkflow,
            CanvasAction::UpdateCanvasNode {
                id,
                data: NodeData::Table(table),
                output_columns: vec!["id".into()],
            },
        ]
    }

    #[test]
    fn type_field_uses_wire_names() {
        for action in every_action() {
            let value = serde_json::to_value(&action).unwrap();
            assert_eq!(value["type"], action.wire_name());
        }
    }

    #[test]
    fn parses_dispatches_from_the_ui() {
        let action: CanvasAction = serde_json::from_value(json!({
            "type": "open-opconfig-panel",
            "data": { "node": "src-1", "create": "drop-columns" }
        }))
        .unwrap();
        assert_eq!(
            action,
            CanvasAction::OpenOpConfigPanel {
                node: NodeId::intern("src-1"),
                create: Some(OperationType::DropColumns),
            }
        );

        let action: CanvasAction = serde_json::from_value(json!({ "type": "refresh-canvas" })).unwrap();
        assert_eq!(action, CanvasAction::RefreshCanvas);
    }

    #[test]
    fn preview_actions_are_tagged() {
        let value = serde_json::to_value(PreviewAction::Preview(NodeId::intern("op-1"))).unwrap();
        assert_eq!(value, json!({ "type": "preview", "data": "op-1" }));
        let value = serde_json::to_value(PreviewAction::ClearPreview).unwrap();
        assert_eq!(value, json!({ "type": "clear-preview" }));
    }
}
