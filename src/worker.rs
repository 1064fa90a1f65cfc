//! The worker event loop: a single dedicated thread multiplexing every
//! submitted `Call` onto a pool of broker connections through `NetworkClient`
//! and `MetadataManager`.
//!
//! Each iteration runs the same ten steps in order: drain submissions,
//! check for shutdown, evaluate timeouts, assign pending calls to a
//! destination, tick the metadata refresh, drain per-node send queues,
//! compute the next poll timeout, poll the network, reconcile node loss,
//! and dispatch whatever responses came back. Nothing here calls back into
//! `NetworkClient`/`MetadataManager` from inside a lock; those collaborators
//! are free to do their own internal locking without risking a deadlock
//! against the worker's own state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};
use rand::{self, Rng};

use crate::call::{Call, MAX_UNSUPPORTED_VERSION_DOWNGRADES};
use crate::clock::Clock;
use crate::config::ResolvedConfig;
use crate::error::CoreError;
use crate::metadata::MetadataManager;
use crate::metadata_call::metadata_refresh_call;
use crate::network::{NetworkClient, ResponseOutcome, WireRequest};
use crate::submission::SubmissionQueue;

/// Sentinel meaning "no hard shutdown deadline has been requested yet".
pub const NO_DEADLINE: i64 = i64::MAX;

struct InFlightEntry {
    call: Call,
    destination: i32,
}

/// Owns every piece of `Call` state that only the worker thread ever
/// touches, plus handles to the collaborators it drives.
pub struct Worker {
    submission: Arc<SubmissionQueue>,
    hard_deadline: Arc<AtomicI64>,
    network: Arc<dyn NetworkClient>,
    metadata: Arc<dyn MetadataManager>,
    clock: Arc<dyn Clock>,
    config: ResolvedConfig,

    pending: Vec<Call>,
    node_queues: HashMap<i32, VecDeque<Call>>,
    in_flight: HashMap<i64, InFlightEntry>,
    next_correlation_id: i64,
}

impl Worker {
    pub fn new(
        submission: Arc<SubmissionQueue>,
        hard_deadline: Arc<AtomicI64>,
        network: Arc<dyn NetworkClient>,
        metadata: Arc<dyn MetadataManager>,
        clock: Arc<dyn Clock>,
        config: ResolvedConfig,
    ) -> Worker {
        Worker {
            submission,
            hard_deadline,
            network,
            metadata,
            clock,
            config,
            pending: Vec::new(),
            node_queues: HashMap::new(),
            in_flight: HashMap::new(),
            next_correlation_id: 0,
        }
    }

    /// Runs the event loop until a hard shutdown deadline is reached with no
    /// non-internal work left, then drains everything still outstanding and
    /// returns.
    pub fn run(mut self) {
        loop {
            for call in self.submission.drain() {
                self.pending.push(call);
            }

            let hard_deadline = self.hard_deadline.load(Ordering::SeqCst);
            let now = self.clock.now_ms();
            if hard_deadline != NO_DEADLINE && (!self.has_non_internal_calls() || now >= hard_deadline) {
                break;
            }

            self.evaluate_timeouts(now);
            self.assign_pending(now);
            self.maybe_refresh_metadata(now);

            let mut min_node_ready_delay = i64::MAX;
            self.drain_send_queues(now, &mut min_node_ready_delay);

            let poll_timeout = self.compute_poll_timeout_ms(now, hard_deadline, min_node_ready_delay);
            trace!("polling network for up to {}ms", poll_timeout);
            let responses = self.network.poll(poll_timeout, now);

            let now = self.clock.now_ms();
            self.handle_node_loss();
            self.handle_responses(responses, now);
        }

        self.drain_on_shutdown();
    }

    fn has_non_internal_calls(&self) -> bool {
        self.pending.iter().any(|c| !c.is_internal())
            || self.node_queues.values().any(|q| q.iter().any(|c| !c.is_internal()))
            || self.in_flight.values().any(|e| !e.call.is_internal())
    }

    /// Removes and fails every `Call` whose deadline has passed, wherever it
    /// currently sits. In-flight calls can't be removed without racing the
    /// network client, so they're marked aborted and their connection is
    /// dropped instead; the eventual `Disconnected` response completes them.
    fn evaluate_timeouts(&mut self, now: i64) {
        let mut i = 0;
        while i < self.pending.len() {
            if now > self.pending[i].deadline_ms() {
                let mut call = self.pending.remove(i);
                let err = call.take_last_error().unwrap_or(CoreError::Timeout);
                call.fail(err);
            } else {
                i += 1;
            }
        }

        for queue in self.node_queues.values_mut() {
            let mut remaining = VecDeque::with_capacity(queue.len());
            while let Some(mut call) = queue.pop_front() {
                if now > call.deadline_ms() {
                    let err = call.take_last_error().unwrap_or(CoreError::Timeout);
                    call.fail(err);
                } else {
                    remaining.push_back(call);
                }
            }
            *queue = remaining;
        }

        let mut nodes_to_drop = HashSet::new();
        for entry in self.in_flight.values_mut() {
            if !entry.call.is_aborted() && now > entry.call.deadline_ms() {
                debug!(
                    "call {} past deadline while in flight against node {}; aborting",
                    entry.call.name(),
                    entry.destination
                );
                entry.call.mark_aborted();
                nodes_to_drop.insert(entry.destination);
            }
        }
        for node in nodes_to_drop {
            self.network.disconnect(node);
        }
    }

    /// Tries to resolve a destination for every pending `Call` whose
    /// back-off has elapsed; calls that resolve move to their node's send
    /// queue, calls that don't (or whose back-off hasn't elapsed yet) stay
    /// pending for the next iteration.
    fn assign_pending(&mut self, now: i64) {
        let candidates = std::mem::take(&mut self.pending);
        let mut still_pending = Vec::with_capacity(candidates.len());
        for mut call in candidates {
            if call.next_allowed_try_ms() > now {
                still_pending.push(call);
                continue;
            }
            match call
                .node_selector()
                .select(self.metadata.as_ref(), self.network.as_ref(), now)
            {
                Ok(Some(node)) => {
                    call.set_current_node(node);
                    self.node_queues.entry(node).or_default().push_back(call);
                }
                Ok(None) => still_pending.push(call),
                Err(err) => {
                    warn!("node selection failed for call {}: {}", call.name(), err);
                    self.fail_call(call, err, now);
                }
            }
        }
        // `fail_call` may push a requeued call straight back onto
        // `self.pending` (now emptied above), so this must extend rather
        // than overwrite.
        self.pending.extend(still_pending);
    }

    fn maybe_refresh_metadata(&mut self, now: i64) {
        if self.metadata.metadata_fetch_delay_ms(now) <= 0 {
            self.metadata.transition_to_update_pending(now);
            let deadline = now + self.config.default_timeout_ms;
            let call = metadata_refresh_call(self.metadata.clone(), self.clock.clone(), deadline);
            debug!("enqueuing internal metadata refresh, deadline in {}ms", deadline - now);
            self.pending.push(call);
        }
    }

    /// Pops one ready `Call` per node's send queue per iteration and hands
    /// it to the network client; a node that isn't ready yet contributes its
    /// own ready-delay to the caller's running minimum so step 7 can size
    /// the next poll tightly instead of busy-looping.
    fn drain_send_queues(&mut self, now: i64, min_node_ready_delay: &mut i64) {
        for (&node, queue) in self.node_queues.iter_mut() {
            if queue.is_empty() {
                continue;
            }
            if !self.network.ready(node, now) {
                let delay = self.network.poll_delay_ms(node, now);
                if delay < *min_node_ready_delay {
                    *min_node_ready_delay = delay;
                }
                continue;
            }

            let mut call = queue.pop_front().unwrap();
            let timeout_ms = call.attempt_timeout_ms(now) as i64;
            match call.create_request(timeout_ms) {
                Ok(body) => {
                    let correlation_id = self.next_correlation_id;
                    self.next_correlation_id += 1;
                    let request = WireRequest {
                        destination: node,
                        correlation_id,
                        body,
                    };
                    match self.network.send(request, now) {
                        Ok(()) => {
                            call.record_dispatch();
                            self.in_flight.insert(
                                correlation_id,
                                InFlightEntry {
                                    call,
                                    destination: node,
                                },
                            );
                        }
                        Err(err) => call.fail(err),
                    }
                }
                Err(err) => call.fail(err),
            }
        }
    }

    /// The minimum of every upcoming event worth waking up for: the safety
    /// ceiling, the hard shutdown deadline, the next node-ready moment, the
    /// next metadata tick, and the nearest deadline or retry-eligibility
    /// moment across every `Call` the worker still owns. Capped at the
    /// retry back-off whenever anything is pending, so a `Call` stuck
    /// waiting on node selection is re-evaluated promptly rather than only
    /// when some unrelated deadline fires.
    fn compute_poll_timeout_ms(&self, now: i64, hard_deadline: i64, min_node_ready_delay: i64) -> i64 {
        let mut min = self.config.safety_poll_ceiling_ms;

        if hard_deadline != NO_DEADLINE {
            min = min.min((hard_deadline - now).max(0));
        }
        if min_node_ready_delay != i64::MAX {
            min = min.min(min_node_ready_delay);
        }
        min = min.min(self.metadata.metadata_fetch_delay_ms(now).max(0));

        for call in &self.pending {
            min = min.min((call.deadline_ms() - now).max(0));
            if call.next_allowed_try_ms() > now {
                min = min.min(call.next_allowed_try_ms() - now);
            }
        }
        for queue in self.node_queues.values() {
            for call in queue {
                min = min.min((call.deadline_ms() - now).max(0));
            }
        }
        for entry in self.in_flight.values() {
            min = min.min((entry.call.deadline_ms() - now).max(0));
        }

        if !self.pending.is_empty() {
            min = min.min(self.config.retry_backoff_ms);
        }

        min.max(0)
    }

    /// Moves every queued-but-unsent `Call` for a node the client now
    /// reports as failed back to pending, so the next iteration's selection
    /// step can route it elsewhere.
    fn handle_node_loss(&mut self) {
        let failed: Vec<i32> = self
            .node_queues
            .keys()
            .copied()
            .filter(|&node| self.network.connection_failed(node))
            .collect();
        for node in failed {
            if let Some(mut queue) = self.node_queues.remove(&node) {
                if !queue.is_empty() {
                    debug!("node {} lost; re-queuing {} unsent calls", node, queue.len());
                }
                while let Some(mut call) = queue.pop_front() {
                    call.clear_current_node();
                    self.pending.push(call);
                }
            }
        }
    }

    fn handle_responses(&mut self, responses: Vec<crate::network::ClientResponse>, now: i64) {
        for response in responses {
            let correlation_id = response.correlation_id;
            let entry = match self.in_flight.remove(&correlation_id) {
                Some(entry) => entry,
                None => {
                    warn!(
                        "dropping response for unknown correlation id {} from node {}",
                        correlation_id, response.destination
                    );
                    self.network.disconnect(response.destination);
                    continue;
                }
            };

            match response.body {
                ResponseOutcome::Normal(body) => {
                    let internal = entry.call.is_internal();
                    let mut call = entry.call;
                    match call.on_response(body) {
                        Ok(()) => {
                            if internal {
                                self.requeue_all_unsent_to_pending();
                            }
                        }
                        Err(err) => self.fail_call(call, err, now),
                    }
                }
                ResponseOutcome::VersionMismatch => {
                    let err = CoreError::UnsupportedVersion(format!(
                        "node {} rejected the request's protocol version",
                        entry.destination
                    ));
                    self.fail_call(entry.call, err, now);
                }
                ResponseOutcome::Disconnected => {
                    let err = self
                        .network
                        .authentication_error(entry.destination)
                        .unwrap_or(CoreError::Disconnected {
                            node: entry.destination,
                        });
                    self.fail_call(entry.call, err, now);
                }
            }
        }
    }

    fn requeue_all_unsent_to_pending(&mut self) {
        for queue in self.node_queues.values_mut() {
            while let Some(mut call) = queue.pop_front() {
                call.clear_current_node();
                self.pending.push(call);
            }
        }
    }

    /// The retry/deadline policy: an aborted call is always a timeout; an
    /// unsupported-version failure gets a bounded number of free downgrade
    /// attempts before falling through to the ordinary policy; everything
    /// else is terminal once the deadline has passed, the error itself
    /// isn't retriable, or the retry budget is exhausted — otherwise the
    /// call goes back to pending for another attempt.
    fn fail_call(&mut self, mut call: Call, error: CoreError, now: i64) {
        if call.is_aborted() {
            call.fail(CoreError::Timeout);
            return;
        }

        if let CoreError::UnsupportedVersion(_) = &error {
            if call.downgrades() < MAX_UNSUPPORTED_VERSION_DOWNGRADES && call.try_downgrade(&error) {
                call.clear_current_node();
                self.pending.push(call);
                return;
            }
        }

        call.schedule_retry(now + self.jittered_backoff_ms());

        if now > call.deadline_ms() {
            debug!("call {} deadline exceeded after {} tries", call.name(), call.tries());
            call.fail(error);
            return;
        }
        if !error.is_retriable() {
            debug!("call {} failed with non-retriable error: {}", call.name(), error);
            call.fail(error);
            return;
        }
        if call.tries() > self.config.max_retries {
            warn!(
                "call {} exhausted its retry budget ({} tries) with error: {}",
                call.name(),
                call.tries(),
                error
            );
            call.fail(error);
            return;
        }

        call.set_last_error(error);
        call.clear_current_node();
        self.pending.push(call);
    }

    /// `retry_backoff_ms` plus up to 25% random jitter, so that a batch of
    /// calls that failed in the same iteration (e.g. every call queued
    /// against a node that just dropped) doesn't retry in lockstep against
    /// whatever node gets selected next.
    fn jittered_backoff_ms(&self) -> i64 {
        let base = self.config.retry_backoff_ms;
        let jitter_ceiling = (base / 4).max(1);
        let jitter = rand::thread_rng().gen_range(0..=jitter_ceiling);
        base + jitter
    }

    /// Fails every `Call` the worker still owns with `Timeout`, then closes
    /// the network client and metadata manager. Runs exactly once, after
    /// the loop in `run` decides to stop.
    fn drain_on_shutdown(mut self) {
        debug!(
            "shutting down: {} pending, {} queued, {} in flight",
            self.pending.len(),
            self.node_queues.values().map(|q| q.len()).sum::<usize>(),
            self.in_flight.len()
        );
        for call in self.submission.seal() {
            call.fail(CoreError::Timeout);
        }
        for call in self.pending.drain(..) {
            call.fail(CoreError::Timeout);
        }
        for (_, mut queue) in self.node_queues.drain() {
            while let Some(call) = queue.pop_front() {
                call.fail(CoreError::Timeout);
            }
        }
        for (_, entry) in self.in_flight.drain() {
            entry.call.fail(CoreError::Timeout);
        }
        self.network.close();
        self.metadata.close();
    }
}
