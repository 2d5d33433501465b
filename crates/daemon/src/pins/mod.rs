pub mod jobs;
pub mod reconciler;
pub mod store;

pub use jobs::{DispatchError, JobDispatcher, JobReceiver, ReconcileJob, ReconcileOutcome};
pub use reconciler::{ReconcileError, Reconciler};
pub use store::{PinStore, PinStoreError};
