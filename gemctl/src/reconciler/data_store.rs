//! Data store reconciler - creates data stores and imports their content.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{Phase, ReconcileOptions, Reconciler};
use crate::clients::{CreateDataStoreRequest, DiscoveryEngineClient, ImportSource};
use crate::error::Result;
use crate::model::{CreateResult, DataSchema, DeleteResult, ReconciliationMode};

/// Declared data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStoreSpec {
    pub id: String,
    pub display_name: String,
    pub source_uri: String,
    #[serde(default)]
    pub data_schema: DataSchema,
    #[serde(default)]
    pub reconciliation_mode: ReconciliationMode,
}

/// Data store state reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStoreStatus {
    pub id: String,
    pub display_name: String,
    pub source_uri: String,
    /// Deterministic resource name; unset when creation failed.
    pub name: Option<String>,
    pub content_config: Option<String>,
    pub phase: Phase,
    pub message: Option<String>,
    pub import_operation: Option<String>,
}

impl DataStoreStatus {
    /// Status of a data store known only by ID, to be filled by
    /// [`Reconciler::read`].
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: String::new(),
            source_uri: String::new(),
            name: None,
            content_config: None,
            phase: Phase::Ready,
            message: None,
            import_operation: None,
        }
    }
}

/// Data store reconciler backed by the Discovery Engine client.
pub struct DataStoreReconciler {
    client: Arc<DiscoveryEngineClient>,
    options: ReconcileOptions,
}

impl DataStoreReconciler {
    pub fn new(client: Arc<DiscoveryEngineClient>, options: ReconcileOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl Reconciler for DataStoreReconciler {
    type Spec = DataStoreSpec;
    type Status = DataStoreStatus;

    async fn create(&self, spec: &Self::Spec) -> Result<Self::Status> {
        info!("Reconciling data store {} ({})", spec.display_name, spec.id);

        let request = CreateDataStoreRequest {
            data_store_id: spec.id.clone(),
            display_name: spec.display_name.clone(),
            source: ImportSource {
                uri: spec.source_uri.clone(),
                data_schema: spec.data_schema,
                reconciliation_mode: spec.reconciliation_mode,
            },
            wait: self.options.wait(),
        };

        let status = match self.client.create_data_store(&request).await? {
            CreateResult::Success {
                data_store_name,
                import_operation,
                ..
            } => DataStoreStatus {
                id: spec.id.clone(),
                display_name: spec.display_name.clone(),
                source_uri: spec.source_uri.clone(),
                name: data_store_name,
                content_config: None,
                phase: Phase::Ready,
                message: None,
                import_operation: import_operation.map(|op| op.name),
            },
            CreateResult::Error { error } => {
                error!("Data store {} failed: {}", spec.id, error);
                DataStoreStatus {
                    id: spec.id.clone(),
                    display_name: spec.display_name.clone(),
                    source_uri: spec.source_uri.clone(),
                    name: None,
                    content_config: None,
                    phase: Phase::Failed,
                    message: Some(error),
                    import_operation: None,
                }
            }
        };
        Ok(status)
    }

    async fn read(&self, status: &Self::Status) -> Result<Self::Status> {
        let name = self.client.names().data_store(&status.id);
        let ds = self.client.get_data_store(&name).await?;
        Ok(DataStoreStatus {
            display_name: ds.display_name,
            content_config: Some(ds.content_config),
            name: Some(name),
            phase: Phase::Ready,
            message: None,
            ..status.clone()
        })
    }

    async fn delete(&self, id: &str) -> Result<DeleteResult> {
        info!("Finalizing (deleting) data store {}", id);
        let name = self.client.names().data_store(id);
        self.client.delete_data_store(&name).await
    }
}
