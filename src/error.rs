//! The error taxonomy consumed by the dispatch core's retry/deadline policy.
//!
//! `CoreError` is the single arbiter of retriability: every failure that
//! reaches the worker's failure handler (see `worker::Worker::fail_call`) is
//! expressed as one of these variants, and `is_retriable` is the one place
//! that answers "does this get another attempt".

use thiserror::Error;

/// Failure kinds the dispatch core can terminate a `Call` with, or route
/// through the retry/back-off policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A transient network or retriable API error reported by the server
    /// or the `NetworkClient`.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The destination rejected the request's protocol version.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// Authentication with the destination node failed. Never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The call's `on_response` hook threw after observing that the
    /// controller or coordinator it targeted has moved. Retriable at the
    /// application layer; the `Call` is responsible for clearing any cached
    /// controller/coordinator before producing this error.
    #[error("controller or coordinator moved: {0}")]
    Moved(String),

    /// The in-flight connection was lost (or forcibly disconnected to
    /// cancel an aborted call).
    #[error("disconnected from {node}")]
    Disconnected {
        /// The node id the call was talking to when the connection dropped.
        node: i32,
    },

    /// The call's deadline passed before a terminal outcome was reached.
    #[error("call timed out")]
    Timeout,

    /// The core is shutting down; the call could not complete beforehand.
    #[error("core shutting down")]
    ShuttingDown,

    /// A malformed response, an unknown correlation id, or a request-build
    /// failure. Always terminal; never retried.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the retry policy should grant this error another attempt,
    /// subject to the call's deadline and retry budget.
    ///
    /// This is consulted from exactly one place (`worker::Worker::fail_call`)
    /// so the retry taxonomy has a single source of truth.
    pub fn is_retriable(&self) -> bool {
        match self {
            CoreError::Transient(_) => true,
            CoreError::Disconnected { .. } => true,
            CoreError::Moved(_) => true,
            // Version mismatches are handled specially by the failure
            // handler (the downgrade hook runs first); if it declines,
            // the error is terminal.
            CoreError::UnsupportedVersion(_) => false,
            CoreError::Authentication(_) => false,
            CoreError::Timeout => false,
            CoreError::ShuttingDown => false,
            CoreError::Internal(_) => false,
        }
    }
}

/// Errors constructing a `CoreConfig` from caller-supplied values.
///
/// A thin string-carrying error constructible from any `Display`-able
/// message.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl From<String> for ConfigError {
    fn from(s: String) -> ConfigError {
        ConfigError(s)
    }
}

impl From<&str> for ConfigError {
    fn from(s: &str) -> ConfigError {
        ConfigError(s.to_string())
    }
}
