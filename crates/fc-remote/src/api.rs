//! Request and response bodies exchanged with the backend.

use fc_core::{CanvasEdge, CanvasNode, NodeId, OperationConfig};
use serde::{Deserialize, Serialize};

/// Body for creating an operation node chained after `input_node`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOperationPayload {
    pub input_node: NodeId,
    #[serde(flatten)]
    pub config: OperationConfig,
    /// Columns the form was validated against.
    pub source_columns: Vec<String>,
    /// Extra inputs for multi-input operations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_inputs: Vec<NodeId>,
}

/// Body for editing an existing operation's config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOperationPayload {
    #[serde(flatten)]
    pub config: OperationConfig,
    pub source_columns: Vec<String>,
}

/// Body for ending an operation chain in a new dbt model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateChainPayload {
    /// Last operation of the chain.
    pub node: NodeId,
    pub name: String,
    pub display_name: String,
    pub dest_schema: String,
}

/// A node confirmed by the backend, with the edges that connect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasNodeResponse {
    pub node: CanvasNode,
    #[serde(default)]
    pub edges: Vec<CanvasEdge>,
}

/// Tabular result of a read-only preview query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlResult {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlQuery<'a> {
    pub sql: &'a str,
    pub limit: u32,
    pub offset: u32,
}

/// A backend task (source sync) that can be polled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub task_id: String,
}

/// A pipeline run started by `run_workflow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: String,
}

/// Lock status reported while polling a sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Queued,
    Running,
    Locked,
    Completed,
    Failed,
}

/// One poll of a task's progress. `status` is absent once the backend has
/// released the lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    #[serde(default)]
    pub status: Option<LockStatus>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One log record from a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub level: String,
    pub message: String,
}

/// A page of run logs starting at the requested offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPage {
    pub lines: Vec<LogLine>,
    /// The run has ended and no further lines will appear.
    #[serde(default)]
    pub finished: bool,
}
