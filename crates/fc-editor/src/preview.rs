//! Read-only preview of a node's output.
//!
//! Every request gets a ticket stamped with a generation number. Starting a
//! new preview, paging, or clearing bumps the generation, so a response that
//! arrives for an older ticket is recognized and dropped.

use fc_core::NodeId;
use fc_remote::SqlResult;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewTicket {
    pub node: NodeId,
    generation: u64,
}

/// A query the caller should run for the ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    pub ticket: PreviewTicket,
    pub sql: String,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct PreviewPane {
    page_size: u32,
    generation: u64,
    /// Node being previewed and the query behind it.
    target: Option<(NodeId, String)>,
    page: u32,
    loading: bool,
    result: Option<SqlResult>,
}

impl Default for PreviewPane {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PreviewPane {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            generation: 0,
            target: None,
            page: 0,
            loading: false,
            result: None,
        }
    }

    /// Start previewing `node` from its first page.
    pub fn begin(&mut self, node: NodeId, sql: String) -> PreviewRequest {
        self.target = Some((node, sql.clone()));
        self.page = 0;
        self.result = None;
        self.issue(node, sql)
    }

    /// Accept a result. Returns false, leaving the pane untouched, when the
    /// ticket has been superseded.
    pub fn complete(&mut self, ticket: PreviewTicket, result: SqlResult) -> bool {
        if !self.is_current(ticket) {
            log::warn!(
                "discarding stale preview for {} (generation {} < {})",
                ticket.node,
                ticket.generation,
                self.generation
            );
            return false;
        }
        self.loading = false;
        self.result = Some(result);
        true
    }

    /// Stop waiting for the ticket without a result.
    pub fn fail(&mut self, ticket: PreviewTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.loading = false;
        true
    }

    pub fn clear(&mut self) {
        self.generation += 1;
        self.target = None;
        self.page = 0;
        self.loading = false;
        self.result = None;
    }

    pub fn next_page(&mut self) -> Option<PreviewRequest> {
        self.target.as_ref()?;
        self.page += 1;
        self.request()
    }

    pub fn prev_page(&mut self) -> Option<PreviewRequest> {
        if self.target.is_none() || self.page == 0 {
            return None;
        }
        self.page -= 1;
        self.request()
    }

    /// Issue a ticket for the current page, or re-issue after a failure.
    pub fn request(&mut self) -> Option<PreviewRequest> {
        let (node, sql) = self.target.clone()?;
        Some(self.issue(node, sql))
    }

    fn issue(&mut self, node: NodeId, sql: String) -> PreviewRequest {
        self.generation += 1;
        self.loading = true;
        PreviewRequest {
            ticket: PreviewTicket {
                node,
                generation: self.generation,
            },
            sql,
            limit: self.page_size,
            offset: self.page.saturating_mul(self.page_size),
        }
    }

    pub fn is_current(&self, ticket: PreviewTicket) -> bool {
        ticket.generation == self.generation && self.node() == Some(ticket.node)
    }

    pub fn node(&self) -> Option<NodeId> {
        self.target.as_ref().map(|(node, _)| *node)
    }

    pub fn result(&self) -> Option<&SqlResult> {
        self.result.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}
