//! Fake collaborators used by this crate's own unit tests, plus whatever a
//! downstream implementation's tests would also want: a no-op `CallBehavior`
//! and deterministic doubles for `MetadataManager` and `NetworkClient`.
//!
//! Kept inline behind `#[cfg(test)]` rather than under `tests/`, since unit
//! tests in several modules (`selector`, `submission`) need these doubles
//! and a `tests/` integration binary can't see `pub(crate)` items anyway.

#![cfg(test)]

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use crate::call::{CallBehavior, DecodedResponse};
use crate::error::CoreError;
use crate::metadata::{ClusterMetadata, MetadataManager, Node};
use crate::network::{ClientResponse, NetworkClient, WireRequest};

/// A `CallBehavior` that never produces a request and is never expected to
/// be driven past construction; stands in wherever a test only cares about
/// queue/selector mechanics and not the behavior itself.
pub struct NoopBehavior;

impl CallBehavior for NoopBehavior {
    fn create_request(&mut self, _timeout_ms: i64) -> Result<Box<dyn std::any::Any + Send>, CoreError> {
        Ok(Box::new(()))
    }

    fn on_response(&mut self, _response: DecodedResponse) -> Result<(), CoreError> {
        Ok(())
    }

    fn on_failure(&mut self, _error: CoreError) {}
}

/// A `CallBehavior` that records every callback it receives, for asserting
/// on exactly what the worker delivered.
pub struct RecordingBehavior {
    pub on_create: Box<dyn FnMut(i64) -> Result<Box<dyn std::any::Any + Send>, CoreError> + Send>,
    pub responses: std::sync::Arc<Mutex<Vec<String>>>,
    pub failures: std::sync::Arc<Mutex<Vec<CoreError>>>,
    pub downgrade: bool,
}

impl CallBehavior for RecordingBehavior {
    fn create_request(&mut self, timeout_ms: i64) -> Result<Box<dyn std::any::Any + Send>, CoreError> {
        (self.on_create)(timeout_ms)
    }

    fn on_response(&mut self, response: DecodedResponse) -> Result<(), CoreError> {
        if let Ok(tag) = response.downcast::<String>() {
            self.responses.lock().unwrap().push(*tag);
            Ok(())
        } else {
            Err(CoreError::Internal("unexpected response type".into()))
        }
    }

    fn on_failure(&mut self, error: CoreError) {
        self.failures.lock().unwrap().push(error);
    }

    fn on_unsupported_version(&mut self, _err: &CoreError) -> bool {
        self.downgrade
    }
}

/// A deterministic, single-threaded `MetadataManager` double.
pub struct FakeMetadataManager {
    ready: AtomicBool,
    nodes: Mutex<Vec<Node>>,
    controller: Mutex<Option<Node>>,
    update_requested: AtomicBool,
    update_pending: AtomicBool,
    fetch_delay_ms: AtomicI64,
}

impl FakeMetadataManager {
    pub fn new() -> FakeMetadataManager {
        FakeMetadataManager {
            ready: AtomicBool::new(false),
            nodes: Mutex::new(Vec::new()),
            controller: Mutex::new(None),
            update_requested: AtomicBool::new(false),
            update_pending: AtomicBool::new(false),
            fetch_delay_ms: AtomicI64::new(i64::MAX),
        }
    }

    pub fn mark_ready_with_nodes(&self, nodes: Vec<Node>) {
        *self.nodes.lock().unwrap() = nodes;
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn set_controller(&self, node: Option<Node>) {
        *self.controller.lock().unwrap() = node;
    }

    pub fn set_fetch_delay_ms(&self, delay: i64) {
        self.fetch_delay_ms.store(delay, Ordering::SeqCst);
    }

    pub fn update_requested(&self) -> bool {
        self.update_requested.load(Ordering::SeqCst)
    }

    pub fn update_pending(&self) -> bool {
        self.update_pending.load(Ordering::SeqCst)
    }
}

impl MetadataManager for FakeMetadataManager {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
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
        self.fetch_delay_ms.load(Ordering::SeqCst)
    }

    fn request_update(&self) {
        self.update_requested.store(true, Ordering::SeqCst);
    }

    fn transition_to_update_pending(&self, _now_ms: i64) {
        self.update_pending.store(true, Ordering::SeqCst);
    }

    fn update(&self, snapshot: ClusterMetadata, _now_ms: i64) {
        *self.nodes.lock().unwrap() = snapshot.nodes;
        *self.controller.lock().unwrap() = snapshot.controller;
        self.ready.store(true, Ordering::SeqCst);
        self.update_pending.store(false, Ordering::SeqCst);
        self.update_requested.store(false, Ordering::SeqCst);
    }

    fn update_failed(&self, _now_ms: i64) {
        self.update_pending.store(false, Ordering::SeqCst);
    }
}

/// A deterministic, single-threaded `NetworkClient` double. `poll` returns
/// whatever has been queued with `push_response`; `send` records requests
/// for inspection unless `fail_send` has been armed.
pub struct FakeNetworkClient {
    least_loaded: Mutex<Option<i32>>,
    ready_nodes: Mutex<std::collections::HashSet<i32>>,
    sent: Mutex<Vec<WireRequest>>,
    responses: Mutex<Vec<ClientResponse>>,
    failed_nodes: Mutex<std::collections::HashSet<i32>>,
    auth_errors: Mutex<std::collections::HashMap<i32, CoreError>>,
    disconnected: Mutex<Vec<i32>>,
    fail_send: AtomicBool,
}

impl FakeNetworkClient {
    pub fn new() -> FakeNetworkClient {
        FakeNetworkClient {
            least_loaded: Mutex::new(None),
            ready_nodes: Mutex::new(std::collections::HashSet::new()),
            sent: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            failed_nodes: Mutex::new(std::collections::HashSet::new()),
            auth_errors: Mutex::new(std::collections::HashMap::new()),
            disconnected: Mutex::new(Vec::new()),
            fail_send: AtomicBool::new(false),
        }
    }

    pub fn set_least_loaded(&self, node: Option<i32>) {
        *self.least_loaded.lock().unwrap() = node;
    }

    pub fn mark_ready(&self, node: i32) {
        self.ready_nodes.lock().unwrap().insert(node);
    }

    pub fn push_response(&self, response: ClientResponse) {
        self.responses.lock().unwrap().push(response);
    }

    pub fn mark_connection_failed(&self, node: i32) {
        self.failed_nodes.lock().unwrap().insert(node);
    }

    pub fn set_auth_error(&self, node: i32, error: CoreError) {
        self.auth_errors.lock().unwrap().insert(node, error);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
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
        10
    }

    fn send(&self, request: WireRequest, _now_ms: i64) -> Result<(), CoreError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(CoreError::Internal("send failed".into()));
        }
        self.sent.lock().unwrap().push(request);
        Ok(())
    }

    fn poll(&self, _timeout_ms: i64, _now_ms: i64) -> Vec<ClientResponse> {
        self.responses.lock().unwrap().drain(..).collect()
    }

    fn least_loaded_node(&self, _now_ms: i64) -> Option<i32> {
        *self.least_loaded.lock().unwrap()
    }

    fn disconnect(&self, node: i32) {
        self.disconnected.lock().unwrap().push(node);
    }

    fn wakeup(&self) {}

    fn authentication_error(&self, node: i32) -> Option<CoreError> {
        self.auth_errors.lock().unwrap().get(&node).map(|e| match e {
            CoreError::Authentication(m) => CoreError::Authentication(m.clone()),
            other => CoreError::Internal(other.to_string()),
        })
    }

    fn connection_failed(&self, node: i32) -> bool {
        self.failed_nodes.lock().unwrap().remove(&node)
    }
}
