//! Source-sync lock as an explicit state machine.
//!
//! The backend holds a lock while syncing sources. The console polls the
//! task and feeds each result to `SyncLock::observe`; the state is derived
//! from transitions, never from whether a poll happened to return a value.
//!
//! ```text
//!   Idle ──start──▶ Queued ──running──▶ Running ──completed / gone──▶ Idle
//!     │                │                   │
//!     └──running/locked (found busy)───────┴──locked──▶ Locked ──gone──▶ Idle
//! ```

use crate::api::{LockStatus, TaskHandle, TaskProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Idle,
    /// Sync requested; the backend has not picked it up yet.
    Queued,
    Running,
    /// Another user's sync holds the lock.
    Locked,
}

/// Emitted once per completed sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    Finished,
    Failed(Option<String>),
}

#[derive(Debug, Clone, Default)]
pub struct SyncLock {
    state: LockState,
    task: Option<TaskHandle>,
}

impl SyncLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state != LockState::Idle
    }

    /// The task currently being polled, if any.
    pub fn task(&self) -> Option<&TaskHandle> {
        self.task.as_ref()
    }

    /// Record a newly started sync. Returns false (and changes nothing) when
    /// a sync is already in flight.
    pub fn start(&mut self, task: TaskHandle) -> bool {
        if self.is_busy() {
            return false;
        }
        log::debug!("sync lock queued for task {}", task.task_id);
        self.state = LockState::Queued;
        self.task = Some(task);
        true
    }

    /// Feed one poll result. Returns an event when a sync has just ended.
    ///
    /// A missing status while queued means the backend has not registered
    /// the task yet, so the lock stays queued. Once it has been seen running
    /// or locked, a missing status means the lock was released.
    pub fn observe(&mut self, progress: &TaskProgress) -> Option<LockEvent> {
        let next = match (self.state, progress.status) {
            (_, Some(LockStatus::Queued)) => LockState::Queued,
            (_, Some(LockStatus::Running)) => LockState::Running,
            (_, Some(LockStatus::Locked)) => LockState::Locked,
            (LockState::Idle, _) => LockState::Idle,
            (LockState::Queued, None) => LockState::Queued,
            (_, Some(LockStatus::Failed)) => {
                return self.release(LockEvent::Failed(progress.message.clone()));
            }
            (_, Some(LockStatus::Completed)) | (_, None) => {
                return self.release(LockEvent::Finished);
            }
        };
        if next != self.state {
            log::debug!("sync lock {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        None
    }

    fn release(&mut self, event: LockEvent) -> Option<LockEvent> {
        log::debug!("sync lock released from {:?}: {event:?}", self.state);
        self.state = LockState::Idle;
        self.task = None;
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn poll(status: Option<LockStatus>) -> TaskProgress {
        TaskProgress {
            status,
            message: None,
        }
    }

    fn task() -> TaskHandle {
        TaskHandle {
            task_id: "t-1".into(),
        }
    }

    #[test]
    fn full_cycle_emits_one_finish() {
        let mut lock = SyncLock::new();
        assert!(lock.start(task()));
        assert_eq!(lock.state(), LockState::Queued);

        assert_eq!(lock.observe(&poll(None)), None);
        assert_eq!(lock.state(), LockState::Queued);

        assert_eq!(lock.observe(&poll(Some(LockStatus::Running))), None);
        assert_eq!(lock.state(), LockState::Running);

        assert_eq!(lock.observe(&poll(None)), Some(LockEvent::Finished));
        assert_eq!(lock.state(), LockState::Idle);
        assert!(lock.task().is_none());

        assert_eq!(lock.observe(&poll(None)), None);
    }

    #[test]
    fn second_start_is_refused_while_busy() {
        let mut lock = SyncLock::new();
        assert!(lock.start(task()));
        assert!(!lock.start(TaskHandle {
            task_id: "t-2".into()
        }));
        assert_eq!(lock.task().unwrap().task_id, "t-1");
    }

    #[test]
    fn failure_carries_message() {
        let mut lock = SyncLock::new();
        lock.start(task());
        lock.observe(&poll(Some(LockStatus::Running)));
        let event = lock.observe(&TaskProgress {
            status: Some(LockStatus::Failed),
            message: Some("warehouse unreachable".into()),
        });
        assert_eq!(
            event,
            Some(LockEvent::Failed(Some("warehouse unreachable".into())))
        );
        assert!(!lock.is_busy());
    }

    #[test]
    fn discovering_a_foreign_lock_marks_busy() {
        let mut lock = SyncLock::new();
        assert_eq!(lock.observe(&poll(Some(LockStatus::Locked))), None);
        assert_eq!(lock.state(), LockState::Locked);
        assert!(lock.is_busy());
        assert_eq!(lock.observe(&poll(None)), Some(LockEvent::Finished));
    }

    #[test]
    fn completion_while_idle_is_ignored() {
        let mut lock = SyncLock::new();
        assert_eq!(lock.observe(&poll(Some(LockStatus::Completed))), None);
        assert_eq!(lock.state(), LockState::Idle);
    }
}
