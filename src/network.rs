//! The `NetworkClient` contract consumed by the worker.
//!
//! Everything below this trait — connection pooling, socket I/O, the
//! authentication handshake, and wire encoding/decoding — is deliberately
//! out of scope; the core only ever calls through this interface.

use crate::error::CoreError;

/// An opaque, already-encoded request body plus its destination, handed to
/// `NetworkClient::send`. Wire encoding is produced by `Call::create_request`
/// and is never inspected by the core.
pub struct WireRequest {
    pub destination: i32,
    pub correlation_id: i64,
    pub body: Box<dyn std::any::Any + Send>,
}

/// How a completed request resolved, as reported by `NetworkClient::poll`.
pub enum ResponseOutcome {
    /// A normally decoded response body, opaque to the core.
    Normal(Box<dyn std::any::Any + Send>),
    /// The destination could not service the request's protocol version.
    VersionMismatch,
    /// The connection was lost before (or instead of) a response arriving.
    Disconnected,
}

/// One completed (or failed) request, as returned from a single
/// `NetworkClient::poll` call.
pub struct ClientResponse {
    pub correlation_id: i64,
    pub destination: i32,
    pub body: ResponseOutcome,
}

/// The network collaborator the worker multiplexes `Call`s onto.
///
/// `node` ids are the caller's own identifiers (as surfaced by
/// `MetadataManager`); the implementation is responsible for mapping them to
/// actual connections.
pub trait NetworkClient: Send + Sync {
    /// Whether `node` is ready to accept a new `send` right now.
    fn ready(&self, node: i32, now_ms: i64) -> bool;

    /// If `node` is not ready, how long until it's worth checking again.
    fn poll_delay_ms(&self, node: i32, now_ms: i64) -> i64;

    /// Non-blocking enqueue of `request` for its destination. Errors are
    /// always internal (e.g. the destination is unknown to the client).
    fn send(&self, request: WireRequest, now_ms: i64) -> Result<(), CoreError>;

    /// Blocks up to `timeout_ms`, returning whatever responses completed.
    /// `now_ms` lets deterministic test doubles avoid calling a real clock.
    fn poll(&self, timeout_ms: i64, now_ms: i64) -> Vec<ClientResponse>;

    /// The least-loaded node currently known to the client, if any.
    fn least_loaded_node(&self, now_ms: i64) -> Option<i32>;

    /// Forcibly closes the connection to `node`. Used both for operator
    /// intent (protocol corruption) and to cancel an aborted in-flight call
    /// by disconnecting its destination.
    fn disconnect(&self, node: i32);

    /// Interrupts a concurrent or subsequent `poll` promptly.
    fn wakeup(&self);

    /// An authentication error observed against `node`, if the most recent
    /// disconnect from it was caused by one.
    fn authentication_error(&self, node: i32) -> Option<CoreError>;

    /// Whether the connection to `node` has failed since the last check,
    /// i.e. the worker should move its queued-but-unsent calls back to
    /// pending.
    fn connection_failed(&self, node: i32) -> bool;

    /// Releases any resources held by the client. Called once, after the
    /// worker has drained and exited.
    fn close(&self) {}
}
