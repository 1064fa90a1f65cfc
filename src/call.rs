//! The `Call` descriptor: one instance per user request attempt-chain.
//!
//! A deep subclass hierarchy with one class per operation is the obvious
//! object-oriented rendering of "per-operation behavior attached to a
//! request". Here it collapses to a single struct carrying a boxed trait
//! object with four methods instead; implementations that would rather
//! dispatch on a tag can define one variant per logical operation behind
//! the same `CallBehavior` impl — the external contract is identical.

use std::any::Any;
use std::fmt;

use crate::error::CoreError;
use crate::selector::NodeSelector;

/// An opaque decoded response body, handed to `Call::on_response`.
pub type DecodedResponse = Box<dyn Any + Send>;

/// Per-operation behavior a `Call` supplies to the worker.
///
/// A real façade API (out of scope here) would construct one of these per
/// user-visible operation.
pub trait CallBehavior: Send {
    /// Produces a wire-level request builder for an attempt with timeout
    /// `timeout_ms`. Wire encoding itself is out of scope; the return value
    /// is opaque to the core and handed verbatim to `NetworkClient::send`.
    /// An `Err` here is a request-build failure: always internal, always
    /// terminal.
    fn create_request(&mut self, timeout_ms: i64) -> Result<Box<dyn Any + Send>, CoreError>;

    /// Consumes a successful, decoded response. Returning `Err` signals a
    /// retriable application-level failure (e.g. "not the controller") —
    /// the implementation is responsible for clearing any cached
    /// controller/coordinator state before returning it. Returning `Ok`
    /// completes the caller's future with the given value having already
    /// been delivered by the implementation itself.
    fn on_response(&mut self, response: DecodedResponse) -> Result<(), CoreError>;

    /// Terminal failure sink. Called exactly once, and only when the
    /// worker has decided no further attempt will be made.
    fn on_failure(&mut self, error: CoreError);

    /// Optional protocol-downgrade hook. Returns `true` iff the call has
    /// reconfigured itself to retry at a lower protocol version; such a
    /// retry does not increment `tries`.
    ///
    /// The default declines every downgrade, which is correct for calls
    /// with no version-specific behavior.
    fn on_unsupported_version(&mut self, _err: &CoreError) -> bool {
        false
    }
}

/// Caps the number of "free" downgrades a single `Call` may accept before a
/// further unsupported-version failure becomes terminal regardless of what
/// `on_unsupported_version` returns. See `DESIGN.md` for the rationale.
pub const MAX_UNSUPPORTED_VERSION_DOWNGRADES: u32 = 3;

/// One user-initiated administrative operation, possibly retried across
/// multiple wire attempts.
pub struct Call {
    pub(crate) name: String,
    pub(crate) internal: bool,
    pub(crate) deadline_ms: i64,
    pub(crate) node_selector: NodeSelector,
    pub(crate) tries: u32,
    pub(crate) downgrades: u32,
    pub(crate) next_allowed_try_ms: i64,
    pub(crate) current_node: Option<i32>,
    pub(crate) aborted: bool,
    pub(crate) last_error: Option<CoreError>,
    pub(crate) behavior: Box<dyn CallBehavior>,
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("name", &self.name)
            .field("internal", &self.internal)
            .field("deadline_ms", &self.deadline_ms)
            .field("node_selector", &self.node_selector)
            .field("tries", &self.tries)
            .field("next_allowed_try_ms", &self.next_allowed_try_ms)
            .field("current_node", &self.current_node)
            .field("aborted", &self.aborted)
            .finish()
    }
}

impl Call {
    /// Builds a new, not-yet-submitted `Call`.
    pub fn new(
        name: impl Into<String>,
        internal: bool,
        deadline_ms: i64,
        node_selector: NodeSelector,
        behavior: Box<dyn CallBehavior>,
    ) -> Call {
        Call {
            name: name.into(),
            internal,
            deadline_ms,
            node_selector,
            tries: 0,
            downgrades: 0,
            next_allowed_try_ms: i64::MIN,
            current_node: None,
            aborted: false,
            last_error: None,
            behavior,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn deadline_ms(&self) -> i64 {
        self.deadline_ms
    }

    pub fn tries(&self) -> u32 {
        self.tries
    }

    pub fn current_node(&self) -> Option<i32> {
        self.current_node
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn node_selector(&self) -> &NodeSelector {
        &self.node_selector
    }

    pub fn next_allowed_try_ms(&self) -> i64 {
        self.next_allowed_try_ms
    }

    pub fn downgrades(&self) -> u32 {
        self.downgrades
    }

    pub fn set_current_node(&mut self, node: i32) {
        self.current_node = Some(node);
    }

    pub fn clear_current_node(&mut self) {
        self.current_node = None;
    }

    /// Marks the call as aborted: its deadline passed while an attempt was
    /// in flight, so the connection carrying it is being dropped and the
    /// resulting `Disconnected` response should be treated as a timeout
    /// rather than fed back through the ordinary retry policy.
    pub fn mark_aborted(&mut self) {
        self.aborted = true;
    }

    /// Records that an attempt's request was actually handed to the
    /// `NetworkClient`. This is the sole place `tries` is incremented: a
    /// `Call` that is re-queued without ever being dispatched again (e.g.
    /// its deadline passes while it's still waiting out back-off) must not
    /// count that as an attempt.
    pub fn record_dispatch(&mut self) {
        self.tries += 1;
    }

    /// Schedules the earliest moment the next attempt may begin, following
    /// a failed attempt. Does not affect `tries`.
    pub fn schedule_retry(&mut self, next_allowed_try_ms: i64) {
        self.next_allowed_try_ms = next_allowed_try_ms;
    }

    /// Remembers the error that sent this `Call` back to pending, so that
    /// if its deadline then passes before another attempt is dispatched,
    /// the caller's future can be failed with the error that actually
    /// occurred rather than a fabricated timeout.
    pub fn set_last_error(&mut self, error: CoreError) {
        self.last_error = Some(error);
    }

    /// Takes the last recorded failure, if any. `None` means this `Call`
    /// was never dispatched, or its last dispatch is still in flight.
    pub fn take_last_error(&mut self) -> Option<CoreError> {
        self.last_error.take()
    }

    /// Offers the behavior a chance to downgrade in response to an
    /// unsupported-version error; a successful downgrade does not count
    /// against the retry budget.
    pub fn try_downgrade(&mut self, error: &CoreError) -> bool {
        if self.behavior.on_unsupported_version(error) {
            self.downgrades += 1;
            true
        } else {
            false
        }
    }

    /// The timeout assigned to an attempt's wire request: `max(0, deadline -
    /// now)`, clamped to a 32-bit representable range.
    pub fn attempt_timeout_ms(&self, now_ms: i64) -> i32 {
        let remaining = (self.deadline_ms - now_ms).max(0);
        remaining.min(i32::MAX as i64) as i32
    }

    pub(crate) fn create_request(
        &mut self,
        timeout_ms: i64,
    ) -> Result<Box<dyn Any + Send>, CoreError> {
        self.behavior.create_request(timeout_ms)
    }

    pub(crate) fn on_response(&mut self, response: DecodedResponse) -> Result<(), CoreError> {
        self.behavior.on_response(response)
    }

    /// Delivers a terminal failure to the caller's future. Consumes the
    /// `Call`: terminal failure is one of its mutually exclusive end
    /// states, and no further attempt follows it.
    pub fn fail(mut self, error: CoreError) {
        self.behavior.on_failure(error);
    }
}
