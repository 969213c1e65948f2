//! The backend seam consumed by the canvas engine.

use crate::api::*;
use crate::error::RemoteError;
use async_trait::async_trait;
use fc_core::{GraphSnapshot, NodeId};

/// Graph CRUD, preview queries, and run control against the backend.
///
/// Implementations return an error for any non-success response. Nothing
/// here touches local state; callers only mutate the graph after `Ok`.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    async fn fetch_graph(&self, project: &str) -> Result<GraphSnapshot, RemoteError>;

    async fn create_operation_node(
        &self,
        payload: &CreateOperationPayload,
    ) -> Result<CanvasNodeResponse, RemoteError>;

    async fn edit_operation_node(
        &self,
        id: NodeId,
        payload: &EditOperationPayload,
    ) -> Result<CanvasNodeResponse, RemoteError>;

    async fn delete_node(&self, id: NodeId) -> Result<(), RemoteError>;

    async fn terminate_chain_and_create_model(
        &self,
        payload: &TerminateChainPayload,
    ) -> Result<CanvasNodeResponse, RemoteError>;

    /// Read-only query used for previews.
    async fn run_sql(&self, sql: &str, limit: u32, offset: u32) -> Result<SqlResult, RemoteError>;

    async fn sync_sources(&self, project: &str) -> Result<TaskHandle, RemoteError>;

    async fn sync_lock_status(&self, task: &TaskHandle) -> Result<TaskProgress, RemoteError>;

    async fn run_workflow(&self, project: &str) -> Result<RunHandle, RemoteError>;

    async fn fetch_run_logs(&self, run: &RunHandle, offset: usize) -> Result<LogPage, RemoteError>;
}
