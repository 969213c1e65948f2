//! The canvas engine: owns the graph and applies intents against it.
//!
//! UI controls never touch the graph directly. They dispatch `CanvasAction`s
//! and `PreviewAction`s into mailboxes; the engine drains them, talks to the
//! backend, and only mutates the graph once the backend has confirmed a
//! write. Failures become toasts and leave the graph as it was.
//!
//! Everything runs on one task: methods take `&mut self`, so no action can
//! be applied while another is still awaiting the backend.

use crate::action::{CanvasAction, PreviewAction};
use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::mailbox::Mailbox;
use crate::preview::{PreviewPane, PreviewRequest, PreviewTicket};
use crate::render::{CanvasRenderer, CanvasView};
use crate::store::{CanvasNodeStore, FocusedNode, PanelMode};
use crate::toast::Toast;
use fc_core::layout::place_unpositioned;
use fc_core::{
    CanvasNode, FieldError, FlowGraph, GraphError, NodeData, NodeId, NodeKind, OperationConfig,
    Position, compute_next_position_with, is_measured_height,
};
use fc_remote::{
    CanvasNodeResponse, CreateOperationPayload, EditOperationPayload, LockEvent, RemoteError,
    RemoteSync, RunHandle, SqlResult, SyncLock, TerminateChainPayload,
};
use std::sync::Arc;

pub struct CanvasEngine<R: RemoteSync + ?Sized> {
    remote: Arc<R>,
    config: EditorConfig,
    graph: FlowGraph,
    store: CanvasNodeStore,
    actions: Mailbox<CanvasAction>,
    previews: Mailbox<PreviewAction>,
    pane: PreviewPane,
    sync_lock: SyncLock,
    /// A finished sync whose tables have not been merged yet.
    pending_merge: bool,
    toasts: Vec<Toast>,
    last_run: Option<RunHandle>,
}

impl<R: RemoteSync + ?Sized> CanvasEngine<R> {
    pub fn new(remote: Arc<R>, config: EditorConfig) -> Self {
        Self {
            remote,
            actions: Mailbox::new(config.dispatch_mode),
            previews: Mailbox::single_slot(),
            pane: PreviewPane::new(config.preview_page_size),
            config,
            graph: FlowGraph::new(),
            store: CanvasNodeStore::new(),
            sync_lock: SyncLock::new(),
            pending_merge: false,
            toasts: Vec::new(),
            last_run: None,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn store(&self) -> &CanvasNodeStore {
        &self.store
    }

    pub fn preview_pane(&self) -> &PreviewPane {
        &self.pane
    }

    pub fn sync_lock(&self) -> &SyncLock {
        &self.sync_lock
    }

    pub fn actions(&self) -> &Mailbox<CanvasAction> {
        &self.actions
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// The most recent run started from this canvas.
    pub fn last_run(&self) -> Option<&RunHandle> {
        self.last_run.as_ref()
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    /// Hand pending toasts to the UI.
    pub fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    pub fn render_to<C: CanvasRenderer + ?Sized>(&self, renderer: &mut C) {
        renderer.render(self.view());
    }

    pub fn view(&self) -> CanvasView<'_> {
        CanvasView {
            graph: &self.graph,
            focused: self.store.canvas_node(),
            preview: &self.pane,
        }
    }

    // ─── Dispatch ────────────────────────────────────────────────────────

    pub fn dispatch(&mut self, action: CanvasAction) {
        self.actions.dispatch(action);
    }

    pub fn dispatch_preview(&mut self, action: PreviewAction) {
        self.previews.dispatch(action);
    }

    /// Drain the action mailbox. Each action is taken before it is applied,
    /// so a failure never leaves it pending. Returns how many were applied.
    pub async fn process_actions(&mut self) -> usize {
        let mut applied = 0;
        while let Some(action) = self.actions.take() {
            let name = action.wire_name();
            log::debug!("applying {name}");
            if let Err(e) = self.apply(action).await {
                log::warn!("{name} failed: {e}");
                self.toasts.push(Toast::error(e.user_message()));
            }
            applied += 1;
        }
        applied
    }

    async fn apply(&mut self, action: CanvasAction) -> Result<(), EditorError> {
        match action {
            CanvasAction::AddSrcModelNode { node } => self.add_node(node),
            CanvasAction::DeleteNode { id } => self.delete_node(id).await,
            CanvasAction::DeleteSourceTreeNode { id } => self.delete_tree(id).await,
            CanvasAction::RefreshCanvas => self.refresh().await,
            CanvasAction::OpenOpConfigPanel { node, create } => match create {
                Some(op_type) => self.stage_operation(node, OperationConfig::blank(op_type)).map(drop),
                None => self.focus(node),
            },
            CanvasAction::CloseResetOpConfigPanel => {
                self.close_panel();
                Ok(())
            }
            CanvasAction::SyncSources => self.sync_sources().await,
            CanvasAction::RunWorkflow => self.run_workflow().await,
            CanvasAction::UpdateCanvasNode {
                id,
                data,
                output_columns,
            } => self.update_node(id, data, output_columns),
        }
    }

    // ─── Local effects ───────────────────────────────────────────────────

    fn add_node(&mut self, mut node: CanvasNode) -> Result<(), EditorError> {
        if !node.position.is_some_and(|p| p.is_finite()) {
            node.position = Some(self.next_position());
        }
        let id = node.id;
        self.graph.upsert_node(node)?;
        self.store.set_canvas_node(Some(FocusedNode::edit(id)));
        Ok(())
    }

    fn focus(&mut self, id: NodeId) -> Result<(), EditorError> {
        if !self.graph.contains(id) {
            return Err(EditorError::NotFound(id));
        }
        self.store.set_canvas_node(Some(FocusedNode::edit(id)));
        Ok(())
    }

    /// Stage a local-only dummy operation under `parent` and focus it in
    /// create mode. Any other dummy on the same chain is discarded.
    pub fn stage_operation(
        &mut self,
        parent: NodeId,
        config: OperationConfig,
    ) -> Result<NodeId, EditorError> {
        let anchor = self.graph.get(parent).ok_or(EditorError::NotFound(parent))?;
        let layout = &self.config.layout;
        let position = match anchor.position {
            Some(p) if p.is_finite() => {
                let height = anchor.height.unwrap_or(layout.default_height);
                Position::new(p.x, p.y + height + layout.gap)
            }
            _ => self.next_position(),
        };

        let dummy = CanvasNode::dummy(config).with_position(position.x, position.y);
        let id = self.graph.stage_dummy(parent, dummy)?;
        self.store.set_canvas_node(Some(FocusedNode::create(id, parent)));
        Ok(id)
    }

    fn close_panel(&mut self) {
        self.store.set_canvas_node(None);
        let discarded = self.graph.discard_dummies();
        if discarded > 0 {
            log::debug!("discarded {discarded} unsaved dummy nodes");
        }
    }

    fn update_node(
        &mut self,
        id: NodeId,
        data: NodeData,
        output_columns: Vec<String>,
    ) -> Result<(), EditorError> {
        let mut patched = self.graph.get(id).ok_or(EditorError::NotFound(id))?.clone();
        patched.data = data;
        patched.output_columns = output_columns;
        self.graph.upsert_node(patched)?;
        Ok(())
    }

    /// Drag gesture from the renderer. Non-finite coordinates are ignored.
    pub fn move_node(&mut self, id: NodeId, position: Position) -> bool {
        if !position.is_finite() {
            log::warn!("ignoring malformed position for {id}");
            return false;
        }
        self.graph.set_position(id, position)
    }

    /// Measured height reported by the renderer. Zero, negative and
    /// non-finite heights are ignored, as layout would treat them as
    /// unmeasured anyway.
    pub fn set_node_height(&mut self, id: NodeId, height: f32) -> bool {
        if !is_measured_height(height) {
            log::warn!("ignoring malformed height {height} for {id}");
            return false;
        }
        self.graph.set_height(id, height)
    }

    fn next_position(&self) -> Position {
        compute_next_position_with(self.graph.nodes(), &self.config.layout)
    }

    /// Drop focus and preview state that point at nodes no longer present.
    fn forget_missing(&mut self) {
        if let Some(focus) = self.store.canvas_node().copied()
            && !self.graph.contains(focus.id)
        {
            self.store.set_canvas_node(None);
        }
        if let Some(node) = self.pane.node()
            && !self.graph.contains(node)
        {
            self.pane.clear();
        }
    }

    /// Dummies whose parent was deleted have nothing to chain from.
    fn prune_orphan_dummies(&mut self) {
        let orphans: Vec<NodeId> = self
            .graph
            .dummy_nodes()
            .into_iter()
            .filter(|d| self.graph.parents(*d).is_empty())
            .collect();
        for id in orphans {
            self.graph.remove_node(id);
        }
    }

    // ─── Backend-confirmed effects ───────────────────────────────────────

    async fn delete_node(&mut self, id: NodeId) -> Result<(), EditorError> {
        let Some(node) = self.graph.get(id) else {
            log::debug!("delete of unknown node {id} ignored");
            return Ok(());
        };
        if !node.is_dummy {
            self.remote.delete_node(id).await?;
        }
        self.graph.remove_node(id);
        self.prune_orphan_dummies();
        self.forget_missing();
        Ok(())
    }

    async fn delete_tree(&mut self, id: NodeId) -> Result<(), EditorError> {
        let Some(node) = self.graph.get(id) else {
            return Ok(());
        };
        if !node.is_dummy {
            self.remote.delete_node(id).await?;
        }
        let closure = self.graph.downstream(id);
        for node in &closure {
            self.graph.remove_node(*node);
        }
        log::info!("deleted {id} and {} downstream nodes", closure.len().saturating_sub(1));
        self.forget_missing();
        Ok(())
    }

    /// Replace the graph with the backend's, keeping local positions.
    pub async fn refresh(&mut self) -> Result<(), EditorError> {
        let snapshot = self.remote.fetch_graph(&self.config.project).await?;
        let dropped = self.graph.replace_with(snapshot);
        self.pending_merge = false;
        let placed = place_unpositioned(&mut self.graph, &self.config.layout);
        self.forget_missing();
        log::info!(
            "canvas refreshed: {} nodes, {} edges ({dropped} dangling edges dropped, {} placed)",
            self.graph.node_count(),
            self.graph.edge_count(),
            placed.len()
        );
        Ok(())
    }

    async fn sync_sources(&mut self) -> Result<(), EditorError> {
        if self.sync_lock.is_busy() {
            return Err(EditorError::SyncBusy);
        }
        let task = self.remote.sync_sources(&self.config.project).await?;
        log::info!("source sync started as task {}", task.task_id);
        self.sync_lock.start(task);
        self.toasts.push(Toast::info("Syncing sources"));
        Ok(())
    }

    /// Poll the running source sync once. When it finishes, source and model
    /// metadata are merged in; operation nodes are left alone.
    ///
    /// If fetching the synced tables fails, the `Finished` event is still
    /// returned and the merge is retried on the next call (or superseded by
    /// the next refresh).
    pub async fn observe_sync_lock(&mut self) -> Result<Option<LockEvent>, EditorError> {
        let Some(task) = self.sync_lock.task().cloned() else {
            if self.pending_merge {
                self.merge_synced_tables().await?;
            }
            return Ok(None);
        };
        let progress = self.remote.sync_lock_status(&task).await?;
        let event = self.sync_lock.observe(&progress);
        match &event {
            Some(LockEvent::Finished) => {
                self.pending_merge = true;
                if let Err(e) = self.merge_synced_tables().await {
                    log::warn!("source sync finished but its tables could not be fetched: {e}");
                    self.toasts.push(Toast::warning(
                        "Sources synced, but the canvas could not be updated yet",
                    ));
                }
            }
            Some(LockEvent::Failed(message)) => {
                let message = message.as_deref().unwrap_or("Source sync failed");
                self.toasts.push(Toast::error(message));
            }
            None => {}
        }
        Ok(event)
    }

    async fn merge_synced_tables(&mut self) -> Result<(), EditorError> {
        let snapshot = self.remote.fetch_graph(&self.config.project).await?;
        let merged = self.graph.merge_tables(&snapshot);
        place_unpositioned(&mut self.graph, &self.config.layout);
        self.pending_merge = false;
        log::info!("source sync finished, {merged} tables merged");
        self.toasts.push(Toast::success("Sources synced"));
        Ok(())
    }

    async fn run_workflow(&mut self) -> Result<(), EditorError> {
        let run = self.remote.run_workflow(&self.config.project).await?;
        log::info!("pipeline run {} started", run.run_id);
        self.toasts.push(Toast::info("Pipeline run started"));
        self.last_run = Some(run);
        Ok(())
    }

    /// Validate and create an operation chained after `parent`. The graph
    /// changes only after the backend confirms; the staged dummy on the same
    /// chain hands its place and focus to the committed node.
    pub async fn create_operation(
        &mut self,
        parent: NodeId,
        config: OperationConfig,
    ) -> Result<NodeId, EditorError> {
        let input = self.graph.get(parent).ok_or(EditorError::NotFound(parent))?;
        let source_columns = input.output_columns.clone();
        config
            .validate(&source_columns)
            .map_err(EditorError::Validation)?;

        let payload = CreateOperationPayload {
            input_node: parent,
            config,
            source_columns,
            other_inputs: Vec::new(),
        };
        let response = self.remote.create_operation_node(&payload).await?;

        let root = self.graph.root_of(parent);
        let staged: Vec<NodeId> = self
            .graph
            .dummy_nodes()
            .into_iter()
            .filter(|d| self.graph.root_of(*d) == root)
            .collect();
        let position = staged
            .iter()
            .find_map(|d| self.graph.get(*d).and_then(|n| n.position));
        let was_focused = staged.iter().any(|d| self.store.is_focused(*d));

        let id = self.commit(response, position)?;
        for dummy in staged {
            self.graph.remove_node(dummy);
        }
        if was_focused {
            self.store.set_canvas_node(Some(FocusedNode::edit(id)));
        }
        Ok(id)
    }

    /// Validate and save a new config for an existing operation.
    pub async fn edit_operation(
        &mut self,
        id: NodeId,
        config: OperationConfig,
    ) -> Result<NodeId, EditorError> {
        let node = self.graph.get(id).ok_or(EditorError::NotFound(id))?;
        if node.kind != NodeKind::Operation || node.is_dummy {
            return Err(GraphError::KindMismatch(id).into());
        }
        let source_columns = self.input_columns(id);
        config
            .validate(&source_columns)
            .map_err(EditorError::Validation)?;

        let payload = EditOperationPayload {
            config,
            source_columns,
        };
        let response = self.remote.edit_operation_node(id, &payload).await?;
        self.commit(response, None)
    }

    /// Submit the open config panel: creates in create mode, edits otherwise.
    pub async fn save_panel(&mut self, config: OperationConfig) -> Result<NodeId, EditorError> {
        let Some(focus) = self.store.canvas_node().copied() else {
            return Err(EditorError::Validation(vec![FieldError::new(
                "node",
                "no node is selected",
            )]));
        };
        match focus.mode {
            PanelMode::Create { parent } => self.create_operation(parent, config).await,
            PanelMode::Edit => self.edit_operation(focus.id, config).await,
        }
    }

    /// End the chain at `node` in a new model. Closes the config panel.
    pub async fn terminate_chain(
        &mut self,
        node: NodeId,
        name: &str,
        display_name: &str,
        dest_schema: &str,
    ) -> Result<NodeId, EditorError> {
        let last = self.graph.get(node).ok_or(EditorError::NotFound(node))?;
        if last.kind != NodeKind::Operation || last.is_dummy {
            return Err(GraphError::KindMismatch(node).into());
        }

        let mut errors = Vec::new();
        if name.trim().is_empty() {
            errors.push(FieldError::new("name", "is required"));
        } else if name.contains(char::is_whitespace) {
            errors.push(FieldError::new("name", "must not contain whitespace"));
        }
        if dest_schema.trim().is_empty() {
            errors.push(FieldError::new("dest_schema", "is required"));
        }
        if !errors.is_empty() {
            return Err(EditorError::Validation(errors));
        }

        let payload = TerminateChainPayload {
            node,
            name: name.to_string(),
            display_name: if display_name.trim().is_empty() {
                name.to_string()
            } else {
                display_name.to_string()
            },
            dest_schema: dest_schema.to_string(),
        };
        let response = self.remote.terminate_chain_and_create_model(&payload).await?;
        let id = self.commit(response, None)?;
        self.close_panel();
        Ok(id)
    }

    /// Apply a confirmed node and its edges. New nodes without a position
    /// take `position`, or the next layout slot.
    fn commit(
        &mut self,
        response: CanvasNodeResponse,
        position: Option<Position>,
    ) -> Result<NodeId, EditorError> {
        let CanvasNodeResponse { mut node, edges } = response;
        node.is_dummy = false;
        if node.position.is_none() && !self.graph.contains(node.id) {
            node.position = Some(position.unwrap_or_else(|| self.next_position()));
        }
        let id = node.id;
        self.graph.upsert_node(node)?;
        for edge in edges {
            if let Err(e) = self.graph.upsert_edge(edge) {
                log::warn!("dropping edge from backend response: {e}");
            }
        }
        Ok(id)
    }

    /// Columns produced by every direct input of `id`, first seen first.
    fn input_columns(&self, id: NodeId) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for parent in self.graph.parents(id) {
            if let Some(node) = self.graph.get(parent) {
                for col in &node.output_columns {
                    if !columns.contains(col) {
                        columns.push(col.clone());
                    }
                }
            }
        }
        columns
    }

    // ─── Preview ─────────────────────────────────────────────────────────

    /// The read-only query that shows a node's output, if it has one.
    pub fn preview_sql(&self, id: NodeId) -> Option<String> {
        let node = self.graph.get(id)?;
        if node.is_dummy {
            return None;
        }
        match &node.data {
            NodeData::Table(table) => Some(format!("SELECT * FROM {}", table.qualified_name())),
            NodeData::Operation(op) => op.preview_sql.clone(),
        }
    }

    /// Take the pending preview intent. A preview yields the query to run;
    /// clearing resets the pane and yields nothing.
    pub fn take_preview_request(&mut self) -> Option<PreviewRequest> {
        while let Some(action) = self.previews.take() {
            match action {
                PreviewAction::ClearPreview => self.pane.clear(),
                PreviewAction::Preview(id) => match self.preview_sql(id) {
                    Some(sql) => return Some(self.pane.begin(id, sql)),
                    None => {
                        log::warn!("node {id} has no previewable output");
                        self.pane.clear();
                        self.toasts.push(Toast::warning("Nothing to preview for this node yet"));
                    }
                },
            }
        }
        None
    }

    /// Apply a query result. Returns false when the ticket was superseded
    /// (the result is dropped) or the query failed.
    pub fn apply_preview(
        &mut self,
        ticket: PreviewTicket,
        result: Result<SqlResult, RemoteError>,
    ) -> bool {
        match result {
            Ok(rows) => self.pane.complete(ticket, rows),
            Err(e) => {
                if self.pane.fail(ticket) {
                    log::warn!("preview of {} failed: {e}", ticket.node);
                    self.toasts.push(Toast::error(e.user_message()));
                } else {
                    log::debug!("ignoring failure of superseded preview for {}", ticket.node);
                }
                false
            }
        }
    }

    /// Take and run the pending preview inline.
    pub async fn preview(&mut self) -> bool {
        match self.take_preview_request() {
            Some(request) => self.run_preview(request).await,
            None => false,
        }
    }

    pub async fn preview_next_page(&mut self) -> bool {
        match self.pane.next_page() {
            Some(request) => self.run_preview(request).await,
            None => false,
        }
    }

    pub async fn preview_prev_page(&mut self) -> bool {
        match self.pane.prev_page() {
            Some(request) => self.run_preview(request).await,
            None => false,
        }
    }

    async fn run_preview(&mut self, request: PreviewRequest) -> bool {
        let result = self
            .remote
            .run_sql(&request.sql, request.limit, request.offset)
            .await;
        self.apply_preview(request.ticket, result)
    }
}
