use common::prelude::{ContentId, ContentIdError};

use super::jobs::ReconcileJob;
use crate::node::DynControlApi;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("cannot resolve {id:?} to an IPFS path: {reason}")]
    InvalidIdentifier { id: String, reason: String },
    #[error("failed to {action} {id}: {message}")]
    Pin {
        id: String,
        action: &'static str,
        message: String,
    },
}

impl ReconcileError {
    fn invalid(id: &str, err: ContentIdError) -> Self {
        ReconcileError::InvalidIdentifier {
            id: id.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Pushes pin intent to the node. Never touches the [`PinStore`]: a failed
/// remote call leaves the user's local record exactly as it was.
///
/// [`PinStore`]: super::PinStore
#[derive(Clone)]
pub struct Reconciler {
    api: DynControlApi,
}

impl Reconciler {
    pub fn new(api: DynControlApi) -> Self {
        Self { api }
    }

    pub async fn ensure_pinned(&self, id: &str) -> Result<(), ReconcileError> {
        let cid = ContentId::parse(id).map_err(|e| ReconcileError::invalid(id, e))?;
        let path = cid.ipfs_path();

        self.api
            .pin_add(&path)
            .await
            .map_err(|e| ReconcileError::Pin {
                id: id.to_string(),
                action: "pin",
                message: e.to_string(),
            })?;

        tracing::info!("pinned {}", path);
        Ok(())
    }

    /// Unpinning something the node does not have pinned counts as success.
    pub async fn ensure_unpinned(&self, id: &str) -> Result<(), ReconcileError> {
        let cid = ContentId::parse(id).map_err(|e| ReconcileError::invalid(id, e))?;
        let path = cid.ipfs_path();

        match self.api.pin_remove(&path).await {
            Ok(()) => {
                tracing::info!("unpinned {}", path);
                Ok(())
            }
            Err(e) if e.is_not_pinned() => {
                tracing::debug!("{} was not pinned on the node", path);
                Ok(())
            }
            Err(e) => Err(ReconcileError::Pin {
                id: id.to_string(),
                action: "unpin",
                message: e.to_string(),
            }),
        }
    }

    pub async fn apply(&self, job: &ReconcileJob) -> Result<(), ReconcileError> {
        match job {
            ReconcileJob::Pin(id) => self.ensure_pinned(id).await,
            ReconcileJob::Unpin(id) => self.ensure_unpinned(id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testkit::{MockNode, NodeCall};

    const CID: &str = "bafkreidtuosuw37f5xmn65b3ksdiikajy7pwjjslzj2lxxz2vc4wdy3zku";

    #[tokio::test]
    async fn test_ensure_pinned_issues_pin_add() {
        let node = Arc::new(MockNode::new());
        let reconciler = Reconciler::new(node.clone());
        reconciler.ensure_pinned(CID).await.unwrap();
        assert_eq!(node.pinned(), vec![format!("/ipfs/{}", CID)]);
    }

    #[tokio::test]
    async fn test_invalid_identifier_never_reaches_node() {
        let node = Arc::new(MockNode::new());
        let reconciler = Reconciler::new(node.clone());

        let err = reconciler.ensure_pinned("bafkreiABC").await.unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidIdentifier { ref id, .. } if id == "bafkreiABC"));
        let err = reconciler.ensure_unpinned("").await.unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidIdentifier { .. }));
        assert!(node.calls().is_empty());
    }

    #[tokio::test]
    async fn test_node_failure_is_pin_error() {
        let node = Arc::new(MockNode::new());
        node.fail_pins("connection refused");
        let reconciler = Reconciler::new(node.clone());

        let err = reconciler.ensure_pinned(CID).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Pin { action: "pin", ref message, .. } if message.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_unpin_of_unpinned_is_ok() {
        let node = Arc::new(MockNode::new());
        let reconciler = Reconciler::new(node.clone());
        reconciler.ensure_unpinned(CID).await.unwrap();
        assert_eq!(
            node.calls(),
            vec![NodeCall::PinRemove(format!("/ipfs/{}", CID))]
        );
    }

    #[tokio::test]
    async fn test_unpin_failure_is_pin_error() {
        let node = Arc::new(MockNode::new());
        node.fail_unpins("repo locked");
        let reconciler = Reconciler::new(node.clone());
        let err = reconciler.ensure_unpinned(CID).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Pin { action: "unpin", .. }));
    }
}
