//! Asynchronous call-dispatch core for a distributed log/broker cluster's
//! administrative client.
//!
//! A single dedicated worker thread multiplexes many retriable, deadlined
//! `Call`s onto a pool of broker connections (`NetworkClient`), consulting
//! in-band cluster topology (`MetadataManager`) to choose each attempt's
//! destination. Everything above this layer — building concrete requests,
//! decoding concrete responses, the public per-operation API a real admin
//! client exposes — is deliberately out of scope; this crate is the
//! dispatch core underneath that façade.

pub mod call;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod metadata;
pub mod metadata_call;
pub mod network;
pub mod selector;

mod future;
mod submission;
mod worker;

#[cfg(test)]
mod test_support;

pub use call::{Call, CallBehavior, DecodedResponse, MAX_UNSUPPORTED_VERSION_DOWNGRADES};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{CoreConfig, ResolvedConfig};
pub use core::AdminCore;
pub use error::{ConfigError, CoreError};
pub use future::{call_future, CallCompleter, CallFuture};
pub use metadata::{ClusterMetadata, MetadataManager, Node};
pub use metadata_call::{metadata_refresh_call, METADATA_REFRESH_CALL_NAME};
pub use network::{ClientResponse, NetworkClient, ResponseOutcome, WireRequest};
pub use selector::NodeSelector;
pub use submission::SubmissionQueue;
