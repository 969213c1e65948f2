//! Action mailboxes between UI controls and the canvas engine.
//!
//! The default discipline is a single slot: a dispatch that arrives before
//! the pending action was taken replaces it, so the consumer only ever sees
//! the most recent intent. `DispatchMode::Queue` keeps every dispatch in
//! FIFO order instead.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchMode {
    /// Latest dispatch wins; earlier unconsumed ones are dropped.
    #[default]
    SingleSlot,
    /// Every dispatch is delivered, oldest first.
    Queue,
}

/// A pending-action holder with "consume exactly once" semantics.
#[derive(Debug, Clone)]
pub struct Mailbox<T> {
    mode: DispatchMode,
    pending: VecDeque<T>,
    overwritten: u64,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new(DispatchMode::default())
    }
}

impl<T> Mailbox<T> {
    pub fn new(mode: DispatchMode) -> Self {
        Self {
            mode,
            pending: VecDeque::new(),
            overwritten: 0,
        }
    }

    pub fn single_slot() -> Self {
        Self::new(DispatchMode::SingleSlot)
    }

    pub fn queued() -> Self {
        Self::new(DispatchMode::Queue)
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Consume the next pending action, returning the mailbox to idle once
    /// nothing is left.
    pub fn take(&mut self) -> Option<T> {
        self.pending.pop_front()
    }

    pub fn peek(&self) -> Option<&T> {
        self.pending.front()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// How many dispatches were dropped by a later one.
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }

    /// Drop anything pending without counting it as overwritten.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl<T: fmt::Debug> Mailbox<T> {
    pub fn dispatch(&mut self, action: T) {
        match self.mode {
            DispatchMode::SingleSlot => {
                if let Some(dropped) = self.pending.pop_front() {
                    self.overwritten += 1;
                    log::debug!("mailbox overwrite: {dropped:?} replaced by {action:?}");
                }
                self.pending.push_back(action);
            }
            DispatchMode::Queue => self.pending.push_back(action),
        }
    }
}
