//! The submission queue: the one piece of `Call` state shared across thread
//! boundaries.
//!
//! A `VecDeque` behind a lock, drained in bulk by the single consumer,
//! synchronous rather than task-polled since submitters here are arbitrary
//! external threads, not tasks on a reactor. A `sealed` flag makes `close`
//! visible to concurrent submitters without requiring them to also inspect
//! a separate shutdown cell: once sealed, submissions fail synchronously
//! with "core shutting down".

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::call::Call;
use crate::error::CoreError;

#[derive(Default)]
struct Inner {
    queue: VecDeque<Call>,
    sealed: bool,
}

/// A bounded-only-by-memory, mutex-guarded FIFO of freshly submitted or
/// requeued `Call`s.
pub struct SubmissionQueue {
    inner: Mutex<Inner>,
}

impl Default for SubmissionQueue {
    fn default() -> SubmissionQueue {
        SubmissionQueue {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl SubmissionQueue {
    /// Appends `call` to the queue, or fails it synchronously if the queue
    /// has already been sealed by a shutdown in progress.
    pub fn submit(&self, call: Call) -> Result<(), (Call, CoreError)> {
        let mut inner = self.inner.lock().unwrap();
        if inner.sealed {
            return Err((call, CoreError::ShuttingDown));
        }
        inner.queue.push_back(call);
        Ok(())
    }

    /// Moves every queued `Call` out in one critical section, holding the
    /// lock only for the move itself.
    pub fn drain(&self) -> Vec<Call> {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.drain(..).collect()
    }

    /// Seals the queue: subsequent `submit` calls fail immediately, and
    /// drains everything still queued so the caller can fail it too.
    pub fn seal(&self) -> Vec<Call> {
        let mut inner = self.inner.lock().unwrap();
        inner.sealed = true;
        inner.queue.drain(..).collect()
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().unwrap().sealed
    }
}
