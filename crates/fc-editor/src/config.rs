//! Engine settings.

use crate::mailbox::DispatchMode;
use crate::preview::DEFAULT_PAGE_SIZE;
use fc_core::LayoutConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Backend project whose graph the canvas edits.
    pub project: String,
    /// Discipline for the canvas action mailbox. The preview mailbox is
    /// always single-slot.
    pub dispatch_mode: DispatchMode,
    pub preview_page_size: u32,
    pub layout: LayoutConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            dispatch_mode: DispatchMode::SingleSlot,
            preview_page_size: DEFAULT_PAGE_SIZE,
            layout: LayoutConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }
}
