//! In-memory backend shared by the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use fc_core::*;
use fc_editor::{CanvasEngine, EditorConfig};
use fc_remote::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
pub struct State {
    pub snapshot: GraphSnapshot,
    /// Names of every backend call, in order.
    pub calls: Vec<String>,
    /// Error returned by the next call instead of its normal result.
    pub fail_next: Option<RemoteError>,
    /// Errors returned by the next call of a given name.
    pub fail_calls: HashMap<String, RemoteError>,
    /// Answer the next create with a node whose type and payload disagree.
    pub corrupt_next_create: bool,
    pub lock_polls: VecDeque<TaskProgress>,
    next_id: usize,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
}

impl FakeBackend {
    pub fn from_fixture() -> Arc<Self> {
        let input = include_str!("../fixtures/project_graph.json");
        let snapshot: GraphSnapshot = serde_json::from_str(input).expect("fixture parses");
        Arc::new(Self {
            state: Mutex::new(State {
                snapshot,
                ..State::default()
            }),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn fail_next(&self, status: u16, detail: &str) {
        self.state().fail_next = Some(RemoteError::Status {
            status,
            body: format!(r#"{{"detail": "{detail}"}}"#),
        });
    }

    pub fn fail_call(&self, call: &str, status: u16, detail: &str) {
        self.state().fail_calls.insert(
            call.to_string(),
            RemoteError::Status {
                status,
                body: format!(r#"{{"detail": "{detail}"}}"#),
            },
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn begin(&self, call: &str) -> Result<MutexGuard<'_, State>, RemoteError> {
        let mut state = self.state();
        state.calls.push(call.to_string());
        let failure = match state.fail_next.take() {
            Some(e) => Some(e),
            None => state.fail_calls.remove(call),
        };
        match failure {
            Some(e) => Err(e),
            None => Ok(state),
        }
    }
}

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

#[async_trait]
impl RemoteSync for FakeBackend {
    async fn fetch_graph(&self, _project: &str) -> Result<GraphSnapshot, RemoteError> {
        Ok(self.begin("fetch_graph")?.snapshot.clone())
    }

    async fn create_operation_node(
        &self,
        payload: &CreateOperationPayload,
    ) -> Result<CanvasNodeResponse, RemoteError> {
        let mut state = self.begin("create_operation_node")?;
        state.next_id += 1;
        let n = state.next_id;
        let mut node = CanvasNode::operation(id(&format!("op-new-{n}")), payload.config.clone())
            .with_output_columns(payload.source_columns.clone());
        if std::mem::take(&mut state.corrupt_next_create) {
            node.kind = NodeKind::Source;
        }
        let edge = CanvasEdge::new(id(&format!("e-new-{n}")), payload.input_node, node.id);
        state.snapshot.nodes.push(node.clone());
        state.snapshot.edges.push(edge.clone());
        Ok(CanvasNodeResponse {
            node,
            edges: vec![edge],
        })
    }

    async fn edit_operation_node(
        &self,
        node_id: NodeId,
        payload: &EditOperationPayload,
    ) -> Result<CanvasNodeResponse, RemoteError> {
        let mut state = self.begin("edit_operation_node")?;
        let Some(node) = state.snapshot.nodes.iter_mut().find(|n| n.id == node_id) else {
            return Err(RemoteError::Status {
                status: 404,
                body: String::new(),
            });
        };
        node.data = NodeData::Operation(OperationData {
            config: payload.config.clone(),
            preview_sql: None,
        });
        Ok(CanvasNodeResponse {
            node: node.clone(),
            edges: Vec::new(),
        })
    }

    async fn delete_node(&self, node_id: NodeId) -> Result<(), RemoteError> {
        let mut state = self.begin("delete_node")?;
        state.snapshot.nodes.retain(|n| n.id != node_id);
        state.snapshot.edges.retain(|e| !e.touches(node_id));
        Ok(())
    }

    async fn terminate_chain_and_create_model(
        &self,
        payload: &TerminateChainPayload,
    ) -> Result<CanvasNodeResponse, RemoteError> {
        let mut state = self.begin("terminate_chain_and_create_model")?;
        let columns = state
            .snapshot
            .nodes
            .iter()
            .find(|n| n.id == payload.node)
            .map(|n| n.output_columns.clone())
            .unwrap_or_default();
        let table = TableDescriptor {
            name: payload.name.clone(),
            display_name: payload.display_name.clone(),
            schema: payload.dest_schema.clone(),
            source_name: payload.dest_schema.clone(),
            sql_path: format!("models/{}/{}.sql", payload.dest_schema, payload.name),
        };
        let node = CanvasNode::table(id(&format!("model-{}", payload.name)), NodeKind::Model, table)
            .with_output_columns(columns);
        let edge = CanvasEdge::new(id(&format!("e-{}", payload.name)), payload.node, node.id);
        state.snapshot.nodes.push(node.clone());
        state.snapshot.edges.push(edge.clone());
        Ok(CanvasNodeResponse {
            node,
            edges: vec![edge],
        })
    }

    async fn run_sql(&self, sql: &str, limit: u32, offset: u32) -> Result<SqlResult, RemoteError> {
        self.begin("run_sql")?;
        let mut row = serde_json::Map::new();
        row.insert("sql".into(), sql.into());
        row.insert("limit".into(), limit.into());
        row.insert("offset".into(), offset.into());
        Ok(SqlResult {
            columns: vec!["sql".into(), "limit".into(), "offset".into()],
            rows: vec![row],
        })
    }

    async fn sync_sources(&self, _project: &str) -> Result<TaskHandle, RemoteError> {
        self.begin("sync_sources")?;
        Ok(TaskHandle {
            task_id: "task-1".into(),
        })
    }

    async fn sync_lock_status(&self, _task: &TaskHandle) -> Result<TaskProgress, RemoteError> {
        let mut state = self.begin("sync_lock_status")?;
        Ok(state.lock_polls.pop_front().unwrap_or_default())
    }

    async fn run_workflow(&self, _project: &str) -> Result<RunHandle, RemoteError> {
        self.begin("run_workflow")?;
        Ok(RunHandle {
            run_id: "run-1".into(),
        })
    }

    async fn fetch_run_logs(&self, _run: &RunHandle, _offset: usize) -> Result<LogPage, RemoteError> {
        self.begin("fetch_run_logs")?;
        Ok(LogPage {
            lines: Vec::new(),
            finished: true,
        })
    }
}

/// An engine loaded with the fixture graph.
pub async fn loaded_engine(config: EditorConfig) -> (CanvasEngine<FakeBackend>, Arc<FakeBackend>) {
    let backend = FakeBackend::from_fixture();
    let mut engine = CanvasEngine::new(backend.clone(), config);
    engine.refresh().await.expect("initial load");
    backend.state().calls.clear();
    (engine, backend)
}
