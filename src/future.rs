//! One-shot completable future.
//!
//! A one-shot cell with a value-or-error slot plus observer notification.
//! No cancellation handle is exposed: a `Mutex`-guarded slot, a `Condvar`
//! for blocking observers, and a `Waker` slot for async ones, so either
//! style works over the same completer without the worker caring which is
//! used.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex};
use std::task::{Context, Poll, Waker};

use crate::error::CoreError;

struct Shared<T> {
    state: Mutex<State<T>>,
    condvar: Condvar,
}

enum State<T> {
    Pending(Option<Waker>),
    Done(Result<T, CoreError>),
}

/// The worker-side handle: completes the cell exactly once.
pub struct CallCompleter<T> {
    shared: Arc<Shared<T>>,
}

/// The observer-side handle: reads the cell once it completes, either by
/// blocking (`wait`) or as a `std::future::Future`.
pub struct CallFuture<T> {
    shared: Arc<Shared<T>>,
}

/// Creates a linked completer/future pair for a single `Call` attempt-chain.
pub fn call_future<T>() -> (CallCompleter<T>, CallFuture<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Pending(None)),
        condvar: Condvar::new(),
    });
    (
        CallCompleter {
            shared: shared.clone(),
        },
        CallFuture { shared },
    )
}

impl<T> CallCompleter<T> {
    /// Completes the cell. Must be called exactly once per `Call`; the
    /// worker's dispatch logic is structured so that every code path
    /// through it calls exactly one of `on_response`/`on_failure`, which in
    /// turn calls this once.
    pub fn complete(self, result: Result<T, CoreError>) {
        let waker = {
            let mut state = self.shared.state.lock().unwrap();
            let previous = std::mem::replace(&mut *state, State::Done(result));
            match previous {
                State::Pending(waker) => waker,
                State::Done(_) => {
                    // Guarded by callers; surfacing this as a panic would
                    // take down the worker thread over a bug in a `Call`
                    // implementation's bookkeeping, not a core invariant.
                    debug_assert!(false, "CallCompleter::complete called twice");
                    None
                }
            }
        };
        self.shared.condvar.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> CallFuture<T> {
    /// Blocks the calling thread until the `Call` completes.
    pub fn wait(&self) -> Result<T, CoreError> {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            match &*state {
                State::Done(_) => break,
                State::Pending(_) => {
                    state = self.shared.condvar.wait(state).unwrap();
                }
            }
        }
        match std::mem::replace(&mut *state, State::Done(Err(CoreError::Internal(
            "CallFuture polled after completion".to_string(),
        )))) {
            State::Done(result) => result,
            State::Pending(_) => unreachable!(),
        }
    }
}

impl<T> Future for CallFuture<T> {
    type Output = Result<T, CoreError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock().unwrap();
        match &mut *state {
            State::Done(_) => {
                match std::mem::replace(
                    &mut *state,
                    State::Done(Err(CoreError::Internal(
                        "CallFuture polled after completion".to_string(),
                    ))),
                ) {
                    State::Done(result) => Poll::Ready(result),
                    State::Pending(_) => unreachable!(),
                }
            }
            State::Pending(waker) => {
                *waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
