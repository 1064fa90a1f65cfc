//! Configuration knobs recognized by the dispatch core.
//!
//! The core never loads this from a file itself — configuration parsing is
//! an external collaborator's concern — but the struct carries
//! `deny_unknown_fields`, explicit `camelCase` wire names, and `Option`
//! fields with documented defaults applied at construction time.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on how long the worker will block in a single
/// `NetworkClient::poll` call, regardless of any other deadline.
pub const DEFAULT_SAFETY_POLL_CEILING_MS: i64 = 1_200_000;

/// Default per-`Call` deadline, applied by callers that don't specify one.
pub const DEFAULT_TIMEOUT_MS: i64 = 120_000;

/// Default gap between attempts of the same `Call`.
pub const DEFAULT_RETRY_BACKOFF_MS: i64 = 100;

/// Default number of retry attempts beyond the first.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Configuration for the dispatch core.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CoreConfig {
    /// Default per-`Call` deadline in milliseconds, used when a caller
    /// does not supply its own.
    pub default_timeout_ms: Option<i64>,

    /// Gap between attempts of the same `Call`, in milliseconds.
    pub retry_backoff_ms: Option<i64>,

    /// Retry attempts granted beyond the first, before a retriable error
    /// becomes terminal.
    pub max_retries: Option<u32>,

    /// Upper bound on a single `NetworkClient::poll` call, in milliseconds.
    pub safety_poll_ceiling_ms: Option<i64>,
}

impl CoreConfig {
    /// Resolves all knobs against their documented defaults, rejecting
    /// explicit values that can never produce sane worker behavior.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let default_timeout_ms = self.default_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if default_timeout_ms <= 0 {
            return Err(format!(
                "defaultTimeoutMs must be positive, got {}",
                default_timeout_ms
            )
            .into());
        }

        let retry_backoff_ms = self.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS);
        if retry_backoff_ms < 0 {
            return Err(format!(
                "retryBackoffMs must not be negative, got {}",
                retry_backoff_ms
            )
            .into());
        }

        let safety_poll_ceiling_ms = self
            .safety_poll_ceiling_ms
            .unwrap_or(DEFAULT_SAFETY_POLL_CEILING_MS);
        if safety_poll_ceiling_ms <= 0 {
            return Err(format!(
                "safetyPollCeilingMs must be positive, got {}",
                safety_poll_ceiling_ms
            )
            .into());
        }

        Ok(ResolvedConfig {
            default_timeout_ms,
            retry_backoff_ms,
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            safety_poll_ceiling_ms,
        })
    }
}

/// `CoreConfig` with every knob resolved to a concrete value. The worker
/// only ever consumes this form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub default_timeout_ms: i64,
    pub retry_backoff_ms: i64,
    pub max_retries: u32,
    pub safety_poll_ceiling_ms: i64,
}
