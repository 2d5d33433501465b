use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::prelude::{BootstrapPeer, ContentId};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use url::Url;

use crate::node::{
    ApiError, BootstrapConnector, BootstrapError, DaemonCommand, DynControlApi, KuboClient,
    NodeStatus, ReadinessError, ReadinessProber, Supervisor, SupervisorError,
};
use crate::pins::{
    DispatchError, JobDispatcher, PinStore, PinStoreError, ReconcileOutcome, Reconciler,
};
use crate::process::utils::cancelled;

/// How long `shutdown` lets queued reconciliation finish.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
/// How long the "is a node already running" check may take before we
/// treat the API as down and spawn our own daemon.
const EXISTING_NODE_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct Config {
    // node process
    /// command used to launch the daemon when none is reachable
    pub daemon: DaemonCommand,
    /// base url of the node's RPC API
    pub api_url: Url,

    // readiness
    pub poll_interval: Duration,
    pub readiness_timeout: Duration,

    // bootstrap
    pub bootstrap_peer: BootstrapPeer,
    pub bootstrap_attempts: u32,
    pub bootstrap_delay: Duration,
    /// abort startup when the bootstrap peer cannot be reached
    pub strict_bootstrap: bool,

    // pins
    pub pin_list_path: PathBuf,
    /// pinned at every startup, independent of the pin list
    pub initial_pins: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error(transparent)]
    Readiness(#[from] ReadinessError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    PinStore(#[from] PinStoreError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl CompanionError {
    /// Startup was interrupted by a shutdown request rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            CompanionError::Readiness(ReadinessError::Cancelled)
                | CompanionError::Bootstrap(BootstrapError::Cancelled)
        )
    }
}

/// The running companion: node process, pin list and reconciliation worker.
///
/// This is the whole surface a front end gets: [`get_pin_list`],
/// [`add_cid`], [`remove_cid`] and [`shutdown`], plus a couple of read-only
/// status helpers.
///
/// [`get_pin_list`]: Companion::get_pin_list
/// [`add_cid`]: Companion::add_cid
/// [`remove_cid`]: Companion::remove_cid
/// [`shutdown`]: Companion::shutdown
pub struct Companion {
    supervisor: Mutex<Supervisor>,
    store: PinStore,
    dispatcher: JobDispatcher,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<()>,
}

impl Companion {
    /// Run the startup sequence against the configured Kubo API.
    pub async fn start(config: &Config, cancel: watch::Receiver<()>) -> Result<Self, CompanionError> {
        let api: DynControlApi = Arc::new(KuboClient::new(&config.api_url)?);
        let supervisor = Supervisor::new(config.daemon.clone());
        Self::start_with(config, api, supervisor, cancel).await
    }

    /// Startup sequence: spawn, wait for readiness, bootstrap, load pins,
    /// queue the initial set.
    ///
    /// A node that already answers is adopted instead of spawning a second
    /// daemon. Spawn and readiness failures abort startup, and a daemon we
    /// spawned is stopped before the error is returned. Every step that
    /// talks to the node is bounded and honours `cancel`; pinning itself
    /// happens on the reconcile worker after this returns.
    pub async fn start_with(
        config: &Config,
        api: DynControlApi,
        mut supervisor: Supervisor,
        cancel: watch::Receiver<()>,
    ) -> Result<Self, CompanionError> {
        let mut probe_cancel = cancel.clone();
        let existing = tokio::select! {
            probe = tokio::time::timeout(EXISTING_NODE_PROBE_TIMEOUT, api.identity_self()) => probe,
            _ = cancelled(&mut probe_cancel) => return Err(ReadinessError::Cancelled.into()),
        };
        match existing {
            Ok(Ok(identity)) => tracing::info!(
                peer_id = %identity.id,
                "IPFS node already running at {}, not spawning a daemon",
                config.api_url
            ),
            Ok(Err(_)) | Err(_) => {
                tracing::info!("starting IPFS daemon");
                supervisor.start()?;
            }
        }

        tracing::info!("waiting for IPFS node to be ready");
        let prober = ReadinessProber::new(api.clone(), config.poll_interval);
        let identity = match prober
            .wait_ready(config.readiness_timeout, cancel.clone())
            .await
        {
            Ok(identity) => identity,
            Err(e) => {
                stop_after_failed_startup(&mut supervisor).await;
                return Err(e.into());
            }
        };
        tracing::info!(
            peer_id = %identity.id,
            agent = %identity.agent_version,
            "IPFS node is ready"
        );

        let connector = BootstrapConnector::new(api.clone());
        match connector
            .connect(
                &config.bootstrap_peer,
                config.bootstrap_attempts,
                config.bootstrap_delay,
                cancel,
            )
            .await
        {
            Ok(_) => {}
            Err(e @ BootstrapError::Cancelled) => {
                stop_after_failed_startup(&mut supervisor).await;
                return Err(e.into());
            }
            Err(e) if config.strict_bootstrap => {
                stop_after_failed_startup(&mut supervisor).await;
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!("continuing without bootstrap peer: {}", e);
            }
        }

        let store = PinStore::new(&config.pin_list_path);
        if let Err(e) = store.load().await {
            tracing::warn!("continuing with in-memory pin list: {}", e);
        }

        let companion = Self::from_parts(api, supervisor, store);

        for id in &config.initial_pins {
            companion.dispatcher.dispatch_pin(&ContentId::canonicalize(id))?;
        }
        companion.resync_pins().await?;

        tracing::info!("companion ready");
        Ok(companion)
    }

    /// Assemble a companion from already-started pieces and spawn its
    /// reconcile worker. Must be called within a tokio runtime.
    pub fn from_parts(api: DynControlApi, supervisor: Supervisor, store: PinStore) -> Self {
        let reconciler = Reconciler::new(api);
        let (dispatcher, receiver) = JobDispatcher::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let worker = receiver.spawn(reconciler, shutdown_rx);

        Self {
            supervisor: Mutex::new(supervisor),
            store,
            dispatcher,
            worker: Mutex::new(Some(worker)),
            shutdown_tx,
        }
    }

    pub async fn get_pin_list(&self) -> Vec<String> {
        self.store.list().await
    }

    /// Record `id` in the pin list, persist it, then queue a pin.
    ///
    /// Returns `false` if it was already listed; the pin is queued anyway so
    /// adding again retries a pin that failed on the node.
    pub async fn add_cid(&self, id: &str) -> Result<bool, CompanionError> {
        let id = ContentId::canonicalize(id);
        let added = self.store.add(&id).await?;
        if added {
            tracing::info!("added {} to pin list", id);
        } else {
            tracing::debug!("{} already in pin list, re-pinning", id);
        }
        self.dispatcher.dispatch_pin(&id)?;
        Ok(added)
    }

    /// Drop `id` from the pin list, persist it, then queue an unpin.
    ///
    /// Returns `false` and leaves the list untouched if it was not listed; the
    /// unpin is still queued so a failed unpin can be retried.
    pub async fn remove_cid(&self, id: &str) -> Result<bool, CompanionError> {
        let id = ContentId::canonicalize(id);
        if id.is_empty() {
            return Err(PinStoreError::EmptyIdentifier.into());
        }
        let removed = self.store.remove(&id).await?;
        if removed {
            tracing::info!("removed {} from pin list", id);
        }
        self.dispatcher.dispatch_unpin(&id)?;
        Ok(removed)
    }

    /// Queue a pin for every listed identifier.
    pub async fn resync_pins(&self) -> Result<usize, CompanionError> {
        let pins = self.store.list().await;
        for id in &pins {
            self.dispatcher.dispatch_pin(id)?;
        }
        tracing::debug!("queued {} pins for reconciliation", pins.len());
        Ok(pins.len())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileOutcome> {
        self.dispatcher.subscribe()
    }

    pub async fn node_status(&self) -> NodeStatus {
        self.supervisor.lock().await.status()
    }

    pub fn pin_list_path(&self) -> &std::path::Path {
        self.store.path()
    }

    /// Let queued reconciliation finish, then stop the daemon we spawned.
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if let Some(mut worker) = self.worker.lock().await.take() {
            if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, &mut worker)
                .await
                .is_err()
            {
                tracing::warn!(
                    "reconcile worker did not drain within {} seconds",
                    WORKER_DRAIN_TIMEOUT.as_secs()
                );
                worker.abort();
            }
        }

        if let Err(e) = self.supervisor.lock().await.stop().await {
            tracing::error!("failed to stop IPFS daemon: {}", e);
        }
    }
}

async fn stop_after_failed_startup(supervisor: &mut Supervisor) {
    if let Err(e) = supervisor.stop().await {
        tracing::error!("failed to stop IPFS daemon after aborted startup: {}", e);
    }
}
