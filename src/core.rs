//! `AdminCore`: the public handle wrapping the worker thread.
//!
//! Construction spawns the dedicated worker thread; `submit` hands a `Call`
//! across to it; `close` asks it to stop within a bounded grace period and
//! blocks until it has. Everything else — request construction, response
//! decoding, the public per-operation API — is a façade built on top of
//! this, out of scope here.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::info;

use crate::call::Call;
use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::error::ConfigError;
use crate::metadata::MetadataManager;
use crate::network::NetworkClient;
use crate::submission::SubmissionQueue;
use crate::worker::{Worker, NO_DEADLINE};

/// Upper bound `close` will clamp an absurd or negative grace period to, so
/// a caller passing a bogus value can't wedge the worker thread forever.
const MAX_CLOSE_GRACE_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// The asynchronous call-dispatch core.
///
/// One `AdminCore` owns exactly one worker thread for its lifetime; cloning
/// is not supported; share it behind an `Arc` if multiple submitters need a
/// handle.
pub struct AdminCore {
    submission: Arc<SubmissionQueue>,
    hard_deadline: Arc<AtomicI64>,
    network: Arc<dyn NetworkClient>,
    clock: Arc<dyn Clock>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl AdminCore {
    /// Spawns the worker thread and returns a handle to it.
    ///
    /// Fails without spawning anything if `config` resolves to an invalid
    /// combination of knobs.
    pub fn start(
        network: Arc<dyn NetworkClient>,
        metadata: Arc<dyn MetadataManager>,
        clock: Arc<dyn Clock>,
        config: CoreConfig,
    ) -> Result<AdminCore, ConfigError> {
        let resolved = config.resolve()?;

        let submission = Arc::new(SubmissionQueue::default());
        let hard_deadline = Arc::new(AtomicI64::new(NO_DEADLINE));

        let worker = Worker::new(
            submission.clone(),
            hard_deadline.clone(),
            network.clone(),
            metadata,
            clock.clone(),
            resolved,
        );
        let join_handle = thread::Builder::new()
            .name("admin-client-worker".to_string())
            .spawn(move || worker.run())
            .expect("failed to spawn admin-client worker thread");

        Ok(AdminCore {
            submission,
            hard_deadline,
            network,
            clock,
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    /// Submits a `Call` for dispatch. If the core has already started
    /// shutting down, the `Call` is failed synchronously with
    /// `CoreError::ShuttingDown` instead of being handed to the worker.
    pub fn submit(&self, call: Call) {
        match self.submission.submit(call) {
            Ok(()) => self.network.wakeup(),
            Err((call, err)) => call.fail(err),
        }
    }

    /// Requests a graceful shutdown: the worker stops accepting new work,
    /// drains everything outstanding within `max_wait_ms`, then exits.
    /// Blocks until the worker thread has actually exited.
    ///
    /// Safe to call more than once, and from more than one thread
    /// concurrently; the effective deadline only ever moves earlier.
    pub fn close(&self, max_wait_ms: i64) {
        let grace_ms = max_wait_ms.clamp(0, MAX_CLOSE_GRACE_MS);
        let candidate = self.clock.now_ms().saturating_add(grace_ms);

        let mut current = self.hard_deadline.load(Ordering::SeqCst);
        while candidate < current {
            match self.hard_deadline.compare_exchange_weak(
                current,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.network.wakeup();

        if let Some(handle) = self.join_handle.lock().unwrap().take() {
            info!("waiting for admin-client worker thread to exit");
            let _ = handle.join();
        }
    }
}
