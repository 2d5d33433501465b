use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::{DynControlApi, Identity};
use crate::process::utils::cancelled;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    #[error("node did not become ready within {waited:?} ({attempts} probes)")]
    Timeout { waited: Duration, attempts: u32 },
    #[error("cancelled while waiting for the node to become ready")]
    Cancelled,
}

/// Polls the node's identity endpoint until it answers.
#[derive(Clone)]
pub struct ReadinessProber {
    api: DynControlApi,
    poll_interval: Duration,
}

impl ReadinessProber {
    pub fn new(api: DynControlApi, poll_interval: Duration) -> Self {
        Self { api, poll_interval }
    }

    /// Probe every `poll_interval` until a probe succeeds or `timeout` elapses.
    ///
    /// Failed probes are expected while the daemon boots and are only logged
    /// at debug level. A probe that is still in flight when the deadline hits
    /// is abandoned.
    pub async fn wait_ready(
        &self,
        timeout: Duration,
        mut cancel: watch::Receiver<()>,
    ) -> Result<Identity, ReadinessError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let probe = tokio::time::timeout_at(deadline, self.api.identity_self());

            tokio::select! {
                result = probe => match result {
                    Ok(Ok(identity)) => {
                        tracing::debug!(attempts, elapsed = ?started.elapsed(), "node is ready");
                        return Ok(identity);
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(attempt = attempts, "node not ready yet: {}", e);
                    }
                    Err(_) => return Err(ReadinessError::Timeout { waited: timeout, attempts }),
                },
                _ = cancelled(&mut cancel) => return Err(ReadinessError::Cancelled),
            }

            let next_probe = (Instant::now() + self.poll_interval).min(deadline);
            tokio::select! {
                _ = tokio::time::sleep_until(next_probe) => {}
                _ = cancelled(&mut cancel) => return Err(ReadinessError::Cancelled),
            }

            if Instant::now() >= deadline {
                return Err(ReadinessError::Timeout {
                    waited: timeout,
                    attempts,
                });
            }
        }
    }
}
