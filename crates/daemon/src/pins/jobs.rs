//! Background reconciliation queue
//!
//! Pin store mutations hand a [`ReconcileJob`] to a [`JobDispatcher`] and
//! return immediately. A single worker task drains the queue: jobs for the
//! same content (compared in canonical form) run strictly in dispatch
//! order, jobs for different identifiers run concurrently. Every finished
//! job is published as a [`ReconcileOutcome`] on a broadcast channel.

use std::collections::HashMap;

use common::prelude::ContentId;
use futures::future::join_all;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::reconciler::{ReconcileError, Reconciler};
use crate::process::utils::cancelled;

const OUTCOME_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileJob {
    /// Make sure the node pins this identifier
    Pin(String),
    /// Make sure the node no longer pins this identifier
    Unpin(String),
}

impl ReconcileJob {
    pub fn id(&self) -> &str {
        match self {
            ReconcileJob::Pin(id) | ReconcileJob::Unpin(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub job: ReconcileJob,
    pub result: Result<(), ReconcileError>,
}

#[derive(Debug, thiserror::Error)]
#[error("reconcile worker has shut down")]
pub struct DispatchError(pub ReconcileJob);

/// Cloneable handle for queueing reconciliation work.
#[derive(Debug, Clone)]
pub struct JobDispatcher {
    tx: flume::Sender<ReconcileJob>,
    outcomes: broadcast::Sender<ReconcileOutcome>,
}

impl JobDispatcher {
    /// Create a dispatcher and the receiver its worker should drain.
    pub fn new() -> (Self, JobReceiver) {
        let (tx, rx) = flume::unbounded();
        let (outcomes, _) = broadcast::channel(OUTCOME_CAPACITY);
        (
            Self {
                tx,
                outcomes: outcomes.clone(),
            },
            JobReceiver { rx, outcomes },
        )
    }

    /// Queue a job. Fails only once the worker is gone.
    pub fn dispatch(&self, job: ReconcileJob) -> Result<(), DispatchError> {
        tracing::debug!("dispatching {:?}", job);
        self.tx.send(job).map_err(|e| DispatchError(e.into_inner()))
    }

    pub fn dispatch_pin(&self, id: &str) -> Result<(), DispatchError> {
        self.dispatch(ReconcileJob::Pin(id.to_string()))
    }

    pub fn dispatch_unpin(&self, id: &str) -> Result<(), DispatchError> {
        self.dispatch(ReconcileJob::Unpin(id.to_string()))
    }

    /// Observe the results of jobs that finish after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileOutcome> {
        self.outcomes.subscribe()
    }
}

/// Worker side of the queue.
#[derive(Debug)]
pub struct JobReceiver {
    rx: flume::Receiver<ReconcileJob>,
    outcomes: broadcast::Sender<ReconcileOutcome>,
}

impl JobReceiver {
    /// Spawn the worker loop on the current runtime.
    pub fn spawn(self, reconciler: Reconciler, shutdown: watch::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(reconciler, shutdown))
    }

    /// Process jobs until every dispatcher is dropped or `shutdown` fires.
    ///
    /// On shutdown, jobs already queued are still started and all in-flight
    /// jobs are awaited before returning.
    pub async fn run(self, reconciler: Reconciler, mut shutdown: watch::Receiver<()>) {
        tracing::debug!("reconcile worker started");
        let mut in_flight: HashMap<String, JoinHandle<()>> = HashMap::new();

        loop {
            let job = tokio::select! {
                job = self.rx.recv_async() => match job {
                    Ok(job) => job,
                    Err(_) => break,
                },
                _ = cancelled(&mut shutdown) => {
                    for job in self.rx.drain() {
                        self.start(job, &reconciler, &mut in_flight);
                    }
                    break;
                }
            };
            self.start(job, &reconciler, &mut in_flight);
        }

        join_all(in_flight.into_values()).await;
        tracing::debug!("reconcile worker stopped");
    }

    fn start(
        &self,
        job: ReconcileJob,
        reconciler: &Reconciler,
        in_flight: &mut HashMap<String, JoinHandle<()>>,
    ) {
        in_flight.retain(|_, handle| !handle.is_finished());

        let id = ContentId::canonicalize(job.id());
        let previous = in_flight.remove(&id);
        let reconciler = reconciler.clone();
        let outcomes = self.outcomes.clone();

        let handle = tokio::spawn(async move {
            // serialize behind the previous job for the same identifier
            if let Some(previous) = previous {
                let _ = previous.await;
            }

            let result = reconciler.apply(&job).await;
            if let Err(e) = &result {
                tracing::warn!("reconciliation failed: {}", e);
            }
            let _ = outcomes.send(ReconcileOutcome { job, result });
        });

        in_flight.insert(id, handle);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::testkit::{MockNode, NodeCall};

    const CID_A: &str = "bafkreidtuosuw37f5xmn65b3ksdiikajy7pwjjslzj2lxxz2vc4wdy3zku";
    const CID_B: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    fn setup() -> (
        Arc<MockNode>,
        JobDispatcher,
        JoinHandle<()>,
        watch::Sender<()>,
    ) {
        let node = Arc::new(MockNode::new());
        let (dispatcher, receiver) = JobDispatcher::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let worker = receiver.spawn(Reconciler::new(node.clone()), shutdown_rx);
        (node, dispatcher, worker, shutdown_tx)
    }

    #[tokio::test]
    async fn test_outcome_is_published() {
        let (node, dispatcher, _worker, _shutdown) = setup();
        let mut outcomes = dispatcher.subscribe();

        dispatcher.dispatch_pin(CID_A).unwrap();
        let outcome = outcomes.recv().await.unwrap();

        assert_eq!(outcome.job, ReconcileJob::Pin(CID_A.to_string()));
        assert_eq!(outcome.result, Ok(()));
        assert_eq!(node.pinned(), vec![format!("/ipfs/{}", CID_A)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_id_jobs_run_in_order() {
        let (node, dispatcher, _worker, _shutdown) = setup();
        node.set_pin_delay(Duration::from_millis(50));
        let mut outcomes = dispatcher.subscribe();

        dispatcher.dispatch_pin(CID_A).unwrap();
        dispatcher.dispatch_unpin(CID_A).unwrap();
        dispatcher.dispatch_pin(CID_A).unwrap();

        let mut jobs = Vec::new();
        for _ in 0..3 {
            let outcome = outcomes.recv().await.unwrap();
            assert_eq!(outcome.result, Ok(()));
            jobs.push(outcome.job);
        }

        assert_eq!(
            jobs,
            vec![
                ReconcileJob::Pin(CID_A.to_string()),
                ReconcileJob::Unpin(CID_A.to_string()),
                ReconcileJob::Pin(CID_A.to_string()),
            ]
        );
        assert_eq!(node.pinned(), vec![format!("/ipfs/{}", CID_A)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_path_and_bare_cid_share_ordering() {
        let (node, dispatcher, _worker, _shutdown) = setup();
        let mut outcomes = dispatcher.subscribe();

        // the unpin is faster than the pin, so only ordering keeps it second
        node.set_pin_delay(Duration::from_millis(200));
        dispatcher.dispatch_pin(&format!("/ipfs/{}", CID_A)).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        node.set_pin_delay(Duration::from_millis(10));
        dispatcher.dispatch_unpin(CID_A).unwrap();

        let first = outcomes.recv().await.unwrap();
        let second = outcomes.recv().await.unwrap();
        assert_eq!(first.job, ReconcileJob::Pin(format!("/ipfs/{}", CID_A)));
        assert_eq!(second.job, ReconcileJob::Unpin(CID_A.to_string()));
        assert!(node.pinned().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_ids_run_concurrently() {
        let (node, dispatcher, _worker, _shutdown) = setup();
        node.set_pin_delay(Duration::from_secs(1));
        let mut outcomes = dispatcher.subscribe();

        let started = tokio::time::Instant::now();
        dispatcher.dispatch_pin(CID_A).unwrap();
        dispatcher.dispatch_pin(CID_B).unwrap();
        outcomes.recv().await.unwrap();
        outcomes.recv().await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(1500));
        assert_eq!(node.count(|c| matches!(c, NodeCall::PinAdd(_))), 2);
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_fatal() {
        let (node, dispatcher, _worker, _shutdown) = setup();
        let mut outcomes = dispatcher.subscribe();

        node.fail_pins("connection refused");
        dispatcher.dispatch_pin(CID_A).unwrap();
        let outcome = outcomes.recv().await.unwrap();
        assert!(matches!(outcome.result, Err(ReconcileError::Pin { .. })));

        // the worker keeps going
        node.clear_failures();
        dispatcher.dispatch_pin(CID_A).unwrap();
        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(outcome.result, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_queue() {
        let (node, dispatcher, worker, shutdown) = setup();
        node.set_pin_delay(Duration::from_millis(100));

        dispatcher.dispatch_pin(CID_A).unwrap();
        dispatcher.dispatch_pin(CID_B).unwrap();
        shutdown.send(()).unwrap();
        worker.await.unwrap();

        assert_eq!(node.pinned().len(), 2);
        assert!(dispatcher.dispatch_pin(CID_A).is_err());
    }
}
