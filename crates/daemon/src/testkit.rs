//! In-process stand-in for a Kubo node.
//!
//! [`MockNode`] implements [`ControlApi`] with scriptable failures and a call
//! log, so the readiness, bootstrap and reconciliation paths can be exercised
//! without an `ipfs` binary.
//!
//! ```rust,ignore
//! let node = Arc::new(MockNode::new());
//! node.fail_pins("connection refused");
//! let companion = Companion::from_parts(node.clone(), supervisor, store);
//! ```

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::node::{ApiError, ControlApi, Identity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCall {
    Identity,
    PinAdd(String),
    PinRemove(String),
    SwarmConnect(String),
    BootstrapAdd(String),
    PeeringAdd(String),
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<NodeCall>,
    not_ready: bool,
    ready_after: Option<u32>,
    identity_calls: u32,
    probe_delay: Option<Duration>,
    // message, remaining failures (None = forever)
    swarm_failure: Option<(String, Option<u32>)>,
    pin_failure: Option<String>,
    unpin_failure: Option<String>,
    pin_delay: Option<Duration>,
    pinned: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MockNode {
    inner: Mutex<Inner>,
}

fn node_error(message: &str) -> ApiError {
    ApiError::HttpStatus(StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
}

impl MockNode {
    pub const PEER_ID: &'static str = "12D3KooWMockNodeMockNodeMockNodeMockNodeMockNode";

    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut inner)
    }

    pub fn set_ready(&self, ready: bool) {
        self.with(|i| {
            i.not_ready = !ready;
            i.ready_after = None;
        });
    }

    /// Fail identity probes until the `n`th one.
    pub fn ready_after(&self, n: u32) {
        self.with(|i| {
            i.not_ready = false;
            i.ready_after = Some(n);
        });
    }

    pub fn set_probe_delay(&self, delay: Duration) {
        self.with(|i| i.probe_delay = Some(delay));
    }

    pub fn fail_swarm_connect(&self, message: &str) {
        self.with(|i| i.swarm_failure = Some((message.to_string(), None)));
    }

    pub fn fail_swarm_connect_times(&self, times: u32, message: &str) {
        self.with(|i| i.swarm_failure = Some((message.to_string(), Some(times))));
    }

    pub fn fail_pins(&self, message: &str) {
        self.with(|i| i.pin_failure = Some(message.to_string()));
    }

    pub fn fail_unpins(&self, message: &str) {
        self.with(|i| i.unpin_failure = Some(message.to_string()));
    }

    pub fn clear_failures(&self) {
        self.with(|i| {
            i.swarm_failure = None;
            i.pin_failure = None;
            i.unpin_failure = None;
        });
    }

    /// Make every pin/unpin call take this long.
    pub fn set_pin_delay(&self, delay: Duration) {
        self.with(|i| i.pin_delay = Some(delay));
    }

    /// Paths currently pinned on the fake node, in pin order.
    pub fn pinned(&self) -> Vec<String> {
        self.with(|i| i.pinned.clone())
    }

    pub fn calls(&self) -> Vec<NodeCall> {
        self.with(|i| i.calls.clone())
    }

    pub fn count(&self, predicate: impl Fn(&NodeCall) -> bool) -> usize {
        self.with(|i| i.calls.iter().filter(|c| predicate(c)).count())
    }

    pub fn identity_calls(&self) -> u32 {
        self.with(|i| i.identity_calls)
    }
}

#[async_trait]
impl ControlApi for MockNode {
    async fn identity_self(&self) -> Result<Identity, ApiError> {
        let (delay, ready) = self.with(|i| {
            i.calls.push(NodeCall::Identity);
            i.identity_calls += 1;
            let ready = !i.not_ready && i.ready_after.map_or(true, |n| i.identity_calls >= n);
            (i.probe_delay, ready)
        });

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if ready {
            Ok(Identity {
                id: Self::PEER_ID.to_string(),
                agent_version: "kubo/mock/".to_string(),
                addresses: None,
            })
        } else {
            Err(node_error("connection refused"))
        }
    }

    async fn pin_add(&self, path: &str) -> Result<(), ApiError> {
        let (delay, failure) = self.with(|i| {
            i.calls.push(NodeCall::PinAdd(path.to_string()));
            (i.pin_delay, i.pin_failure.clone())
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = failure {
            return Err(node_error(&message));
        }

        self.with(|i| {
            if !i.pinned.iter().any(|p| p == path) {
                i.pinned.push(path.to_string());
            }
        });
        Ok(())
    }

    async fn pin_remove(&self, path: &str) -> Result<(), ApiError> {
        let (delay, failure) = self.with(|i| {
            i.calls.push(NodeCall::PinRemove(path.to_string()));
            (i.pin_delay, i.unpin_failure.clone())
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = failure {
            return Err(node_error(&message));
        }

        self.with(|i| match i.pinned.iter().position(|p| p == path) {
            Some(index) => {
                i.pinned.remove(index);
                Ok(())
            }
            None => Err(node_error("not pinned or pinned indirectly")),
        })
    }

    async fn swarm_connect(&self, address: &str) -> Result<(), ApiError> {
        self.with(|i| {
            i.calls.push(NodeCall::SwarmConnect(address.to_string()));
            match i.swarm_failure.take() {
                None => Ok(()),
                Some((message, None)) => {
                    i.swarm_failure = Some((message.clone(), None));
                    Err(node_error(&message))
                }
                Some((message, Some(remaining))) => {
                    if remaining > 1 {
                        i.swarm_failure = Some((message.clone(), Some(remaining - 1)));
                    }
                    Err(node_error(&message))
                }
            }
        })
    }

    async fn bootstrap_add(&self, address: &str) -> Result<(), ApiError> {
        self.with(|i| i.calls.push(NodeCall::BootstrapAdd(address.to_string())));
        Ok(())
    }

    async fn peering_add(&self, address: &str) -> Result<(), ApiError> {
        self.with(|i| i.calls.push(NodeCall::PeeringAdd(address.to_string())));
        Ok(())
    }
}
