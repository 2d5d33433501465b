//! Everything that talks to, or about, the local IPFS node.
//!
//! - [`Supervisor`] owns the `ipfs daemon` child process
//! - [`ReadinessProber`] waits for the RPC API to answer
//! - [`BootstrapConnector`] dials the well-known peer with bounded retries
//! - [`KuboClient`] is the production [`ControlApi`]

use std::sync::Arc;

use async_trait::async_trait;

pub mod bootstrap;
pub mod client;
pub mod error;
pub mod readiness;
pub mod supervisor;

pub use bootstrap::{
    BootstrapConnector, BootstrapError, ConnectionAttempt, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY,
};
pub use client::{Identity, KuboClient};
pub use error::ApiError;
pub use readiness::{
    ReadinessError, ReadinessProber, DEFAULT_POLL_INTERVAL, DEFAULT_READINESS_TIMEOUT,
};
pub use supervisor::{DaemonCommand, NodeStatus, Supervisor, SupervisorError};

/// The narrow slice of the node's control API the companion relies on.
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// Lightweight "who am I" query, used as the readiness probe.
    async fn identity_self(&self) -> Result<Identity, ApiError>;

    async fn pin_add(&self, path: &str) -> Result<(), ApiError>;

    async fn pin_remove(&self, path: &str) -> Result<(), ApiError>;

    async fn swarm_connect(&self, address: &str) -> Result<(), ApiError>;

    async fn bootstrap_add(&self, address: &str) -> Result<(), ApiError>;

    async fn peering_add(&self, address: &str) -> Result<(), ApiError>;
}

pub type DynControlApi = Arc<dyn ControlApi>;
