//! Cluster metadata and the `MetadataManager` contract.
//!
//! The core never mutates cluster metadata; it only applies whole snapshots
//! delivered by the internal metadata-refresh `Call` and reads the current
//! view through this trait.

use std::collections::HashMap;

/// A single cluster member, as known to metadata.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: i32,
    pub host: String,
    pub port: u16,
}

impl Node {
    pub fn new(id: i32, host: impl Into<String>, port: u16) -> Node {
        Node {
            id,
            host: host.into(),
            port,
        }
    }
}

/// A whole-cluster snapshot, as delivered by the metadata-refresh `Call`.
///
/// Node-topology only, no topics; the per-partition leader map is carried
/// for callers that need it (e.g. a `Controller`-targeted `Call` reasoning
/// about where a partition's leader sits), but the dispatch core itself only
/// ever reads `nodes` and `controller`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterMetadata {
    pub nodes: Vec<Node>,
    pub controller: Option<Node>,
    pub partition_leaders: HashMap<(String, i32), i32>,
}

/// The in-band metadata collaborator consumed by the worker.
///
/// Implementations are responsible for scheduling refreshes (via
/// `metadata_fetch_delay_ms`), reporting readiness, and applying
/// snapshots/failures the worker hands it after driving the internal
/// metadata `Call` through the usual dispatch path.
pub trait MetadataManager: Send + Sync {
    /// Whether metadata has been successfully fetched at least once.
    ///
    /// `LeastLoaded` and `Controller` node selectors refuse to pick a node
    /// until this is true.
    fn is_ready(&self) -> bool;

    /// The current controller node, if metadata is ready and a controller
    /// is known.
    fn controller(&self) -> Option<Node>;

    /// Looks up a known node by id, regardless of readiness.
    fn node_by_id(&self, id: i32) -> Option<Node>;

    /// All currently known nodes. Used by `LeastLoaded` node selection once
    /// combined with the `NetworkClient`'s in-flight counts.
    fn nodes(&self) -> Vec<Node>;

    /// Milliseconds until the next refresh is due; `0` means due now.
    fn metadata_fetch_delay_ms(&self, now_ms: i64) -> i64;

    /// Expedites the next refresh: a node selector that could not resolve a
    /// destination calls this so the worker's metadata tick enqueues a
    /// refresh on the next iteration rather than waiting out the normal
    /// interval.
    fn request_update(&self);

    /// Called by the worker immediately after it enqueues the internal
    /// metadata `Call`, so a concurrent tick doesn't enqueue a second one.
    fn transition_to_update_pending(&self, now_ms: i64);

    /// Applies a freshly fetched snapshot.
    fn update(&self, snapshot: ClusterMetadata, now_ms: i64);

    /// Records that the metadata refresh `Call` failed; implementations
    /// typically schedule a near-term retry of the fetch delay.
    fn update_failed(&self, now_ms: i64);

    /// Releases any resources held by the manager. Called once, after the
    /// worker has drained and exited.
    fn close(&self) {}
}
