//! Canvas engine for the flow editor.
//!
//! Owns the pipeline graph for one project and keeps it consistent with the
//! backend: UI intents arrive through mailboxes, writes are confirmed by the
//! backend before they touch the graph, and previews run on their own
//! channel so they never race graph edits.

pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod mailbox;
pub mod preview;
pub mod render;
pub mod store;
pub mod toast;

pub use action::{CanvasAction, PreviewAction};
pub use config::EditorConfig;
pub use engine::CanvasEngine;
pub use error::EditorError;
pub use mailbox::{DispatchMode, Mailbox};
pub use preview::{PreviewPane, PreviewRequest, PreviewTicket};
pub use render::{CanvasRenderer, CanvasView};
pub use store::{CanvasNodeStore, FocusedNode, PanelMode};
pub use toast::{Toast, ToastLevel};
