//! Completion handles for in-flight operations
//!
//! Every memory operation dispatched to an accelerator queue and every
//! collective call returns an [`Event`]. The destination of the operation
//! must not be read from another domain until the event has been waited on.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Status of an in-flight operation
#[derive(Clone, Debug, PartialEq)]
pub enum EventStatus {
    /// Submitted, not yet executed
    Pending,
    /// Executed successfully
    Completed,
    /// Execution failed
    Failed(Error),
}

struct EventState {
    status: Mutex<EventStatus>,
    cond: Condvar,
}

/// Awaitable handle to an operation that may still be in flight
#[derive(Clone)]
pub struct Event {
    id: u64,
    state: Arc<EventState>,
}

impl Event {
    fn with_status(status: EventStatus) -> Self {
        Self {
            id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(EventState {
                status: Mutex::new(status),
                cond: Condvar::new(),
            }),
        }
    }

    /// Create a handle for an operation that has not executed yet
    pub(crate) fn pending() -> Self {
        Self::with_status(EventStatus::Pending)
    }

    /// Create a handle for an operation that already finished synchronously
    pub fn completed() -> Self {
        Self::with_status(EventStatus::Completed)
    }

    /// Unique id of this event
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current status
    pub fn status(&self) -> EventStatus {
        self.state.status.lock().clone()
    }

    /// Check whether the operation has finished (successfully or not)
    pub fn is_complete(&self) -> bool {
        !matches!(*self.state.status.lock(), EventStatus::Pending)
    }

    /// Block until the operation finishes
    ///
    /// Returns the error the operation failed with, if any. Waiting on an
    /// already-finished event returns immediately.
    pub fn wait(&self) -> Result<()> {
        let mut status = self.state.status.lock();
        while matches!(*status, EventStatus::Pending) {
            self.state.cond.wait(&mut status);
        }
        match &*status {
            EventStatus::Completed => Ok(()),
            EventStatus::Failed(err) => Err(err.clone()),
            EventStatus::Pending => unreachable!("loop exits only once the event settles"),
        }
    }

    /// Record the outcome of the operation and wake all waiters
    pub(crate) fn settle(&self, outcome: Result<()>) {
        let mut status = self.state.status.lock();
        *status = match outcome {
            Ok(()) => EventStatus::Completed,
            Err(err) => EventStatus::Failed(err),
        };
        self.state.cond.notify_all();
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("status", &*self.state.status.lock())
            .finish()
    }
}

/// Wait for every event in `events`, returning the first failure
///
/// All events are waited on even if an earlier one failed, so no operation
/// is still touching memory when this returns.
pub fn wait_all(events: &[Event]) -> Result<()> {
    let mut first_err = None;
    for event in events {
        if let Err(err) = event.wait() {
            first_err.get_or_insert(err);
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
