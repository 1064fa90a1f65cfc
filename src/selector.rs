//! Node-selection strategies.
//!
//! A closed, four-variant enum rather than an open trait: the worker stays
//! monomorphic over `NodeSelector` and the match in `select` is exhaustive,
//! favoring a small closed `enum` over an open trait object where the set
//! of cases is genuinely fixed.

use crate::error::CoreError;
use crate::metadata::MetadataManager;
use crate::network::NetworkClient;

/// Strategy a `Call` uses to pick its destination node for the next
/// attempt. Returning `None` is a first-class outcome: the call stays
/// pending and is retried on a later iteration without consuming any of
/// its retry budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeSelector {
    /// The node with the fewest in-flight requests, once metadata is ready.
    LeastLoaded,
    /// The current controller node, once metadata is ready and known.
    Controller,
    /// A specific, caller-named node id (broker-specific operations).
    ConstantId(i32),
    /// The least-loaded node unconditionally; used exclusively by the
    /// internal metadata-refresh `Call`, which must be able to run before
    /// metadata is considered "ready".
    MetadataBootstrap,
}

impl NodeSelector {
    /// Attempts to resolve a destination node for the current iteration.
    ///
    /// `Ok(None)` means the call should stay pending without consuming its
    /// retry budget. `Err` means the resolved node itself is unusable — e.g.
    /// authentication against it is known to fail — and the caller should be
    /// routed through the ordinary failure handler instead of being assigned
    /// a node it can never successfully reach.
    pub fn select(
        &self,
        metadata: &dyn MetadataManager,
        network: &dyn NetworkClient,
        now_ms: i64,
    ) -> Result<Option<i32>, CoreError> {
        match self {
            NodeSelector::LeastLoaded => {
                if metadata.is_ready() {
                    Self::check_auth(network, network.least_loaded_node(now_ms))
                } else {
                    metadata.request_update();
                    Ok(None)
                }
            }
            NodeSelector::Controller => {
                if metadata.is_ready() {
                    match metadata.controller() {
                        Some(node) => Self::check_auth(network, Some(node.id)),
                        None => {
                            metadata.request_update();
                            Ok(None)
                        }
                    }
                } else {
                    metadata.request_update();
                    Ok(None)
                }
            }
            NodeSelector::ConstantId(id) => match metadata.node_by_id(*id) {
                Some(node) => Self::check_auth(network, Some(node.id)),
                None => {
                    metadata.request_update();
                    Ok(None)
                }
            },
            NodeSelector::MetadataBootstrap => {
                Self::check_auth(network, network.least_loaded_node(now_ms))
            }
        }
    }

    /// Turns a resolved-but-unauthenticated node into a terminal `Err`
    /// rather than letting the worker queue a request against it that's
    /// certain to fail.
    fn check_auth(
        network: &dyn NetworkClient,
        node: Option<i32>,
    ) -> Result<Option<i32>, CoreError> {
        match node {
            Some(id) => match network.authentication_error(id) {
                Some(err) => Err(err),
                None => Ok(Some(id)),
            },
            None => Ok(None),
        }
    }
}
