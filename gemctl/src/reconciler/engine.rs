//! Engine reconciler - creates search engines connected to data stores.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{Phase, ReconcileOptions, Reconciler};
use crate::clients::{
    CreateEngineRequest, DEFAULT_COMPANY_NAME, DiscoveryEngineClient, SEARCH_TIER_ENTERPRISE,
};
use crate::error::Result;
use crate::model::{CreateResult, DeleteResult};

/// Declared engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSpec {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub data_store_ids: Vec<String>,
}

/// Engine state reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub id: String,
    pub display_name: String,
    pub data_store_ids: Vec<String>,
    /// Deterministic resource name; unset when creation failed.
    pub name: Option<String>,
    pub phase: Phase,
    pub message: Option<String>,
}

impl EngineStatus {
    /// Status of an engine known only by ID, to be filled by
    /// [`Reconciler::read`].
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: String::new(),
            data_store_ids: Vec::new(),
            name: None,
            phase: Phase::Ready,
            message: None,
        }
    }
}

/// Engine reconciler backed by the Discovery Engine client.
pub struct EngineReconciler {
    client: Arc<DiscoveryEngineClient>,
    options: ReconcileOptions,
    company_name: String,
    search_tier: Option<String>,
}

impl EngineReconciler {
    pub fn new(client: Arc<DiscoveryEngineClient>, options: ReconcileOptions) -> Self {
        Self {
            client,
            options,
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            search_tier: Some(SEARCH_TIER_ENTERPRISE.to_string()),
        }
    }

    /// Organizational tag sent as `commonConfig.companyName`.
    pub fn with_company_name(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = company_name.into();
        self
    }

    pub fn with_search_tier(mut self, search_tier: Option<String>) -> Self {
        self.search_tier = search_tier;
        self
    }
}

#[async_trait]
impl Reconciler for EngineReconciler {
    type Spec = EngineSpec;
    type Status = EngineStatus;

    async fn create(&self, spec: &Self::Spec) -> Result<Self::Status> {
        info!("Reconciling engine {} ({})", spec.display_name, spec.id);

        let request = CreateEngineRequest {
            engine_id: spec.id.clone(),
            display_name: spec.display_name.clone(),
            data_store_ids: spec.data_store_ids.clone(),
            search_tier: self.search_tier.clone(),
            company_name: self.company_name.clone(),
            wait: self.options.wait(),
        };

        let (name, phase, message) = match self.client.create_engine(&request).await? {
            CreateResult::Success { engine_name, .. } => (engine_name, Phase::Ready, None),
            CreateResult::Error { error } => {
                error!("Engine {} failed: {}", spec.id, error);
                (None, Phase::Failed, Some(error))
            }
        };

        Ok(EngineStatus {
            id: spec.id.clone(),
            display_name: spec.display_name.clone(),
            data_store_ids: spec.data_store_ids.clone(),
            name,
            phase,
            message,
        })
    }

    async fn read(&self, status: &Self::Status) -> Result<Self::Status> {
        let name = self.client.names().engine(&status.id);
        let engine = self.client.get_engine(&name).await?;
        Ok(EngineStatus {
            id: status.id.clone(),
            display_name: engine.display_name,
            data_store_ids: engine.data_store_ids,
            name: Some(name),
            phase: Phase::Ready,
            message: None,
        })
    }

    async fn delete(&self, id: &str) -> Result<DeleteResult> {
        info!("Finalizing (deleting) engine {}", id);
        let name = self.client.names().engine(id);
        self.client.delete_engine(&name).await
    }
}
