//! Reconcilers for engines and data stores.
//!
//! Each reconciler maps a declared spec onto client calls and reports a
//! status. Remote create/delete failures end up in the status (phase
//! `Failed`); only credential and read failures are returned as `Err`.

pub mod data_store;
pub mod engine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::DeleteResult;
use crate::poller::PollPolicy;

pub use data_store::{DataStoreReconciler, DataStoreSpec, DataStoreStatus};
pub use engine::{EngineReconciler, EngineSpec, EngineStatus};

/// Observed phase of a reconciled resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Ready,
    Failed,
}

/// Knobs shared by all reconcilers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Wait for create operations to finish before moving on.
    pub wait_for_operations: bool,
    pub poll: PollPolicy,
}

impl ReconcileOptions {
    fn wait(&self) -> Option<PollPolicy> {
        self.wait_for_operations.then_some(self.poll)
    }
}

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Desired state supplied by the caller.
    type Spec: Sync;
    /// State handed back for persistence.
    type Status: Send + Sync;

    /// Provision the resource.
    async fn create(&self, spec: &Self::Spec) -> Result<Self::Status>;

    /// Refresh `status` from the remote resource.
    async fn read(&self, status: &Self::Status) -> Result<Self::Status>;

    /// Re-provision with the same ID. There is no partial update path.
    async fn update(&self, spec: &Self::Spec) -> Result<Self::Status> {
        self.create(spec).await
    }

    /// Remove the resource. On success the caller stops tracking it.
    async fn delete(&self, id: &str) -> Result<DeleteResult>;
}
