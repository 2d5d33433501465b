use std::fmt;
use std::time::Duration;

use common::prelude::BootstrapPeer;
use tokio::sync::watch;

use super::{ApiError, DynControlApi};
use crate::process::utils::cancelled;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// One try at reaching the bootstrap peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    pub peer: String,
    pub attempt: u32,
    pub outcome: Result<(), String>,
}

impl fmt::Display for ConnectionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(()) => write!(f, "attempt {}: connected to {}", self.attempt, self.peer),
            Err(e) => write!(f, "attempt {}: {}", self.attempt, e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to connect to {peer} after {} attempts", attempts.len())]
    Failed {
        peer: String,
        attempts: Vec<ConnectionAttempt>,
    },
    #[error("cancelled while connecting to bootstrap peer")]
    Cancelled,
}

impl BootstrapError {
    pub fn last_error(&self) -> Option<&str> {
        match self {
            BootstrapError::Failed { attempts, .. } => attempts
                .last()
                .and_then(|a| a.outcome.as_ref().err())
                .map(String::as_str),
            BootstrapError::Cancelled => None,
        }
    }
}

/// Registers the bootstrap peer with the node and dials it.
#[derive(Clone)]
pub struct BootstrapConnector {
    api: DynControlApi,
}

impl BootstrapConnector {
    pub fn new(api: DynControlApi) -> Self {
        Self { api }
    }

    /// Try up to `max_attempts` times, sleeping `delay` between attempts.
    ///
    /// Returns the successful attempt. Calling this again for a peer that is
    /// already registered and connected succeeds.
    pub async fn connect(
        &self,
        peer: &BootstrapPeer,
        max_attempts: u32,
        delay: Duration,
        mut cancel: watch::Receiver<()>,
    ) -> Result<ConnectionAttempt, BootstrapError> {
        let max_attempts = max_attempts.max(1);
        let mut attempts = Vec::with_capacity(max_attempts as usize);

        for attempt in 1..=max_attempts {
            let result = tokio::select! {
                result = self.attempt(peer) => result,
                _ = cancelled(&mut cancel) => return Err(BootstrapError::Cancelled),
            };

            match result {
                Ok(()) => {
                    tracing::info!(attempt, "connected to bootstrap peer {}", peer);
                    return Ok(ConnectionAttempt {
                        peer: peer.to_string(),
                        attempt,
                        outcome: Ok(()),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        "error connecting to bootstrap peer {}: {}",
                        peer,
                        e
                    );
                    attempts.push(ConnectionAttempt {
                        peer: peer.to_string(),
                        attempt,
                        outcome: Err(e.to_string()),
                    });
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancelled(&mut cancel) => return Err(BootstrapError::Cancelled),
                }
            }
        }

        Err(BootstrapError::Failed {
            peer: peer.to_string(),
            attempts,
        })
    }

    async fn attempt(&self, peer: &BootstrapPeer) -> Result<(), ApiError> {
        tolerate_existing(self.api.bootstrap_add(peer.address()).await)?;
        tolerate_existing(self.api.peering_add(peer.address()).await)?;
        tolerate_existing(self.api.swarm_connect(peer.address()).await)
    }
}

fn tolerate_existing(result: Result<(), ApiError>) -> Result<(), ApiError> {
    match result {
        Err(e) if e.is_already_satisfied() => {
            tracing::debug!("treating as success: {}", e);
            Ok(())
        }
        other => other,
    }
}
