//! The internal metadata-refresh `Call`.
//!
//! Built and submitted by the worker itself, never by an external caller:
//! its `NodeSelector` is `MetadataBootstrap` (works even before metadata is
//! considered ready) and it is marked `internal` so it never blocks
//! shutdown drain. On a successful response it applies the snapshot and
//! asks the worker to move every queued-but-unsent `Call` back to pending,
//! since the refreshed metadata may now prefer different destinations; the
//! worker recognizes this by checking `Call::is_internal()` after a
//! successful dispatch rather than through any behavior-side callback.

use std::any::Any;
use std::sync::Arc;

use crate::call::{Call, CallBehavior, DecodedResponse};
use crate::clock::Clock;
use crate::error::CoreError;
use crate::metadata::{ClusterMetadata, MetadataManager};
use crate::selector::NodeSelector;

/// Name given to every internal metadata-refresh `Call`, surfaced through
/// `Call::name()` for logging.
pub const METADATA_REFRESH_CALL_NAME: &str = "metadata-refresh";

struct MetadataRefreshBehavior {
    metadata: Arc<dyn MetadataManager>,
    clock: Arc<dyn Clock>,
}

impl CallBehavior for MetadataRefreshBehavior {
    fn create_request(&mut self, _timeout_ms: i64) -> Result<Box<dyn Any + Send>, CoreError> {
        Ok(Box::new(()))
    }

    fn on_response(&mut self, response: DecodedResponse) -> Result<(), CoreError> {
        let snapshot = response
            .downcast::<ClusterMetadata>()
            .map_err(|_| CoreError::Internal("metadata refresh returned the wrong type".into()))?;
        self.metadata.update(*snapshot, self.clock.now_ms());
        Ok(())
    }

    fn on_failure(&mut self, _error: CoreError) {
        self.metadata.update_failed(self.clock.now_ms());
    }
}

/// Builds a new internal metadata-refresh `Call`, due at `deadline_ms`.
pub fn metadata_refresh_call(
    metadata: Arc<dyn MetadataManager>,
    clock: Arc<dyn Clock>,
    deadline_ms: i64,
) -> Call {
    Call::new(
        METADATA_REFRESH_CALL_NAME,
        true,
        deadline_ms,
        NodeSelector::MetadataBootstrap,
        Box::new(MetadataRefreshBehavior { metadata, clock }),
    )
}
