//! Core data model for the transform canvas.
//!
//! A pipeline is a DAG: `source` and `model` nodes reference warehouse
//! tables, `operation` nodes are single transformation steps chained from
//! one of those roots. Edges point from producer → consumer. Positions are
//! owned by the UI layer; `output_columns` are owned by the backend.

use crate::id::NodeId;
use crate::operation::OperationConfig;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

// ─── Geometry ────────────────────────────────────────────────────────────

/// Screen coordinates of a node's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Both coordinates are usable for layout (not NaN or infinite).
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Decode an optional layout value, turning a malformed one (a null or
/// string coordinate, a non-numeric height) into `None` so that one bad node
/// never sinks a whole snapshot. Layout places the node afterwards.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient<T> {
        Value(Option<T>),
        Malformed(IgnoredAny),
    }

    Ok(match Lenient::<T>::deserialize(deserializer)? {
        Lenient::Value(value) => value,
        Lenient::Malformed(_) => {
            log::warn!("ignoring malformed layout value in node payload");
            None
        }
    })
}

// ─── Node payloads ───────────────────────────────────────────────────────

/// The closed set of node kinds. Never changes after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Source,
    Model,
    Operation,
}

impl NodeKind {
    /// Source and model nodes are the roots operation chains hang from.
    pub fn is_table(&self) -> bool {
        matches!(self, NodeKind::Source | NodeKind::Model)
    }
}

/// Backend-defined reference to a warehouse table (source or dbt model).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub schema: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub sql_path: String,
}

impl TableDescriptor {
    /// Fully qualified, quoted relation name for read-only queries.
    pub fn qualified_name(&self) -> String {
        format!(
            "\"{}\".\"{}\"",
            self.schema.replace('"', "\"\""),
            self.name.replace('"', "\"\"")
        )
    }
}

/// Payload of an operation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationData {
    #[serde(flatten)]
    pub config: OperationConfig,
    /// Compiled SQL for the node, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_sql: Option<String>,
}

/// Variant payload of a canvas node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeData {
    Operation(OperationData),
    Table(TableDescriptor),
}

impl NodeData {
    pub fn as_table(&self) -> Option<&TableDescriptor> {
        match self {
            NodeData::Table(t) => Some(t),
            NodeData::Operation(_) => None,
        }
    }

    pub fn as_operation(&self) -> Option<&OperationData> {
        match self {
            NodeData::Operation(op) => Some(op),
            NodeData::Table(_) => None,
        }
    }
}

// ─── Nodes & edges ───────────────────────────────────────────────────────

/// One pipeline stage on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasNode {
    pub id: NodeId,

    #[serde(rename = "type")]
    pub kind: NodeKind,

    pub data: NodeData,

    /// Columns produced by this node. Recomputed by the backend whenever the
    /// config changes; read-only on the client.
    #[serde(default)]
    pub output_columns: Vec<String>,

    /// Local-only staging node with no backend identity yet.
    #[serde(default)]
    pub is_dummy: bool,

    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<Position>,

    /// Rendered height, reported back by the renderer once measured.
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<f32>,
}

impl CanvasNode {
    /// A source or model node backed by a warehouse table.
    pub fn table(id: NodeId, kind: NodeKind, table: TableDescriptor) -> Self {
        Self {
            id,
            kind,
            data: NodeData::Table(table),
            output_columns: Vec::new(),
            is_dummy: false,
            position: None,
            height: None,
        }
    }

    /// A committed operation node.
    pub fn operation(id: NodeId, config: OperationConfig) -> Self {
        Self {
            id,
            kind: NodeKind::Operation,
            data: NodeData::Operation(OperationData {
                config,
                preview_sql: None,
            }),
            output_columns: Vec::new(),
            is_dummy: false,
            position: None,
            height: None,
        }
    }

    /// A local placeholder for an operation being configured.
    pub fn dummy(config: OperationConfig) -> Self {
        Self {
            is_dummy: true,
            ..Self::operation(NodeId::with_prefix("dummy"), config)
        }
    }

    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }

    #[must_use]
    pub fn with_output_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `kind` and the payload variant agree.
    pub fn is_consistent(&self) -> bool {
        match (&self.kind, &self.data) {
            (NodeKind::Operation, NodeData::Operation(_)) => true,
            (NodeKind::Source | NodeKind::Model, NodeData::Table(_)) => true,
            _ => false,
        }
    }

    /// Human-readable label for toasts and logs.
    pub fn label(&self) -> String {
        match &self.data {
            NodeData::Table(t) if !t.display_name.is_empty() => t.display_name.clone(),
            NodeData::Table(t) => t.name.clone(),
            NodeData::Operation(op) => op.config.op_type().label().to_string(),
        }
    }
}

/// A directed producer → consumer relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasEdge {
    pub id: NodeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl CanvasEdge {
    pub fn new(id: NodeId, source: NodeId, target: NodeId) -> Self {
        Self { id, source, target }
    }

    /// An edge with a locally generated id.
    pub fn connect(source: NodeId, target: NodeId) -> Self {
        Self::new(NodeId::with_prefix("edge"), source, target)
    }

    pub fn touches(&self, id: NodeId) -> bool {
        self.source == id || self.target == id
    }
}

/// The authoritative graph as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<CanvasNode>,
    #[serde(default)]
    pub edges: Vec<CanvasEdge>,
}
