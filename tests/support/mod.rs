//! Test doubles for driving `AdminCore` end to end against the public API
//! only — these live under `tests/` rather than `src/` because integration
//! tests can't see the crate's own private `test_support` module.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use admin_client_core::{
    ClientResponse, ClusterMetadata, CoreError, MetadataManager, NetworkClient, Node,
    ResponseOutcome, WireRequest,
};

/// A `NetworkClient` double whose `poll` blocks briefly and returns whatever
/// has been queued with `push_response`, so the worker thread doesn't spin
/// a hot loop while a test is arranging the next event.
pub struct FakeNetworkClient {
    least_loaded: Mutex<Option<i32>>,
    ready_nodes: Mutex<HashSet<i32>>,
    sent: Mutex<Vec<(i32, i64)>>,
    responses: Mutex<Vec<ClientResponse>>,
    failed_nodes: Mutex<HashSet<i32>>,
    auth_errors: Mutex<HashMap<i32, String>>,
    disconnected: Mutex<Vec<i32>>,
    send_should_fail: Mutex<bool>,
}

impl FakeNetworkClient {
    pub fn new() -> Arc<FakeNetworkClient> {
        Arc::new(FakeNetworkClient {
            least_loaded: Mutex::new(None),
            ready_nodes: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            failed_nodes: Mutex::new(HashSet::new()),
            auth_errors: Mutex::new(HashMap::new()),
            disconnected: Mutex::new(Vec::new()),
            send_should_fail: Mutex::new(false),
        })
    }

    pub fn set_least_loaded(&self, node: Option<i32>) {
        *self.least_loaded.lock().unwrap() = node;
    }

    pub fn mark_ready(&self, node: i32) {
        self.ready_nodes.lock().unwrap().insert(node);
    }

    pub fn mark_not_ready(&self, node: i32) {
        self.ready_nodes.lock().unwrap().remove(&node);
    }

    pub fn mark_connection_failed(&self, node: i32) {
        self.failed_nodes.lock().unwrap().insert(node);
    }

    pub fn set_authentication_error(&self, node: i32, message: &str) {
        self.auth_errors.lock().unwrap().insert(node, message.to_string());
    }

    pub fn respond_to_latest(&self, node: i32, outcome: ResponseOutcome) -> bool {
        let correlation_id = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(n, _)| *n == node)
            .map(|(_, id)| *id);
        match correlation_id {
            Some(correlation_id) => {
                self.responses.lock().unwrap().push(ClientResponse {
                    correlation_id,
                    destination: node,
                    body: outcome,
                });
                true
            }
            None => false,
        }
    }

    pub fn sent_to(&self, node: i32) -> usize {
        self.sent.lock().unwrap().iter().filter(|(n, _)| *n == node).count()
    }

    pub fn disconnected_nodes(&self) -> Vec<i32> {
        self.disconnected.lock().unwrap().clone()
    }
}

impl NetworkClient for FakeNetworkClient {
    fn ready(&self, node: i32, _now_ms: i64) -> bool {
        self.ready_nodes.lock().unwrap().contains(&node)
    }

    fn poll_delay_ms(&self, _node: i32, _now_ms: i64) -> i64 {
        5
    }

    fn send(&self, request: WireRequest, _now_ms: i64) -> Result<(), CoreError> {
        if *self.send_should_fail.lock().unwrap() {
            return Err(CoreError::Internal("send failed".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((request.destination, request.correlation_id));
        Ok(())
    }

    fn poll(&self, timeout_ms: i64, _now_ms: i64) -> Vec<ClientResponse> {
        let drained: Vec<_> = self.responses.lock().unwrap().drain(..).collect();
        if drained.is_empty() {
            std::thread::sleep(Duration::from_millis((timeout_ms as u64).min(5)));
        }
        drained
    }

    fn least_loaded_node(&self, _now_ms: i64) -> Option<i32> {
        *self.least_loaded.lock().unwrap()
    }

    fn disconnect(&self, node: i32) {
        self.disconnected.lock().unwrap().push(node);
    }

    fn wakeup(&self) {}

    fn authentication_error(&self, node: i32) -> Option<CoreError> {
        self.auth_errors
            .lock()
            .unwrap()
            .get(&node)
            .map(|m| CoreError::Authentication(m.clone()))
    }

    fn connection_failed(&self, node: i32) -> bool {
        self.failed_nodes.lock().unwrap().remove(&node)
    }
}

/// A `MetadataManager` double that is ready from construction with a fixed
/// node set, unless told otherwise.
pub struct FakeMetadataManager {
    nodes: Mutex<Vec<Node>>,
    controller: Mutex<Option<Node>>,
    ready: Mutex<bool>,
}

impl FakeMetadataManager {
    pub fn new(nodes: Vec<Node>, controller: Option<Node>) -> Arc<FakeMetadataManager> {
        Arc::new(FakeMetadataManager {
            nodes: Mutex::new(nodes),
            controller: Mutex::new(controller),
            ready: Mutex::new(true),
        })
    }

    pub fn set_controller(&self, node: Option<Node>) {
        *self.controller.lock().unwrap() = node;
    }
}

impl MetadataManager for FakeMetadataManager {
    fn is_ready(&self) -> bool {
        *self.ready.lock().unwrap()
    }

    fn controller(&self) -> Option<Node> {
        self.controller.lock().unwrap().clone()
    }

    fn node_by_id(&self, id: i32) -> Option<Node> {
        self.nodes.lock().unwrap().iter().find(|n| n.id == id).cloned()
    }

    fn nodes(&self) -> Vec<Node> {
        self.nodes.lock().unwrap().clone()
    }

    fn metadata_fetch_delay_ms(&self, _now_ms: i64) -> i64 {
        i64::MAX
    }

    fn request_update(&self) {}

    fn transition_to_update_pending(&self, _now_ms: i64) {}

    fn update(&self, snapshot: ClusterMetadata, _now_ms: i64) {
        *self.nodes.lock().unwrap() = snapshot.nodes;
        *self.controller.lock().unwrap() = snapshot.controller;
    }

    fn update_failed(&self, _now_ms: i64) {}
}

/// Polls `condition` until it's true or `timeout` elapses, sleeping briefly
/// between attempts. Panics with `message` on timeout.
pub fn wait_until(timeout: Duration, message: &str, mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    loop {
        if condition() {
            return;
        }
        if start.elapsed() > timeout {
            panic!("timed out waiting for: {}", message);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
