//! Client for the Discovery Engine management API.
//!
//! Read and list calls return `Err` on any remote failure. Create and delete
//! calls record remote failures in a [`CreateResult`]/[`DeleteResult`] and
//! only return `Err` when no token could be obtained.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::wire::{
    DataStoreCreateBody, EngineCreateBody, GcsSource, ImportDocumentsBody, ListDataStoresResponse,
    ListDocumentsResponse, ListEnginesResponse, Page, WireCommonConfig, WireDataStore,
    WireEngine, WireSchema, WireSearchEngineConfig,
};
use crate::config::{Config, Settings};
use crate::credentials::{self, TokenProvider};
use crate::error::{Error, Result, api_error};
use crate::model::{
    CreateResult, DataSchema, DataStore, DeleteResult, Document, Engine, EngineFullConfig,
    Operation, ReconciliationMode,
};
use crate::names::{self, ResourceNames};
use crate::poller::{OperationPoller, OperationSource, PollPolicy};

pub const INDUSTRY_VERTICAL_GENERIC: &str = "GENERIC";
pub const SOLUTION_TYPE_SEARCH: &str = "SOLUTION_TYPE_SEARCH";
pub const CONTENT_REQUIRED: &str = "CONTENT_REQUIRED";
pub const APP_TYPE_INTRANET: &str = "APP_TYPE_INTRANET";
pub const SEARCH_TIER_ENTERPRISE: &str = "SEARCH_TIER_ENTERPRISE";
pub const DEFAULT_COMPANY_NAME: &str = "BCBSMA";

/// Documents to import into a new data store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSource {
    pub uri: String,
    pub data_schema: DataSchema,
    pub reconciliation_mode: ReconciliationMode,
}

impl ImportSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            data_schema: DataSchema::default(),
            reconciliation_mode: ReconciliationMode::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateDataStoreRequest {
    pub data_store_id: String,
    pub display_name: String,
    pub source: ImportSource,
    /// Wait for the create operation before importing.
    pub wait: Option<PollPolicy>,
}

#[derive(Debug, Clone)]
pub struct CreateEngineRequest {
    pub engine_id: String,
    pub display_name: String,
    pub data_store_ids: Vec<String>,
    pub search_tier: Option<String>,
    pub company_name: String,
    /// Wait for the create operation before reporting success.
    pub wait: Option<PollPolicy>,
}

/// Stateless wrapper around the REST surface, scoped to one
/// project/location/collection.
pub struct DiscoveryEngineClient {
    http: reqwest::Client,
    settings: Settings,
    names: ResourceNames,
    credentials: Arc<dyn TokenProvider>,
}

impl DiscoveryEngineClient {
    pub fn new(settings: Settings, credentials: Arc<dyn TokenProvider>) -> Self {
        let names = settings.names();
        Self {
            http: reqwest::Client::new(),
            settings,
            names,
            credentials,
        }
    }

    /// Resolves `config` and builds the credential provider it selects.
    pub async fn connect(config: Config) -> Result<Self> {
        let token_command = config.token_command.clone();
        let settings = Settings::resolve(config).await?;
        let credentials = credentials::provider_for(&settings, token_command).await?;
        Ok(Self::new(settings, credentials))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    async fn request(&self, method: Method, name: &str) -> Result<RequestBuilder> {
        let token = self.credentials.token().await?;
        let url = format!("{}/v1/{}", self.settings.endpoint, name);
        let mut builder = self.http.request(method, url).bearer_auth(token.secret());
        if !self.settings.use_service_account {
            builder = builder.header("x-goog-user-project", &self.settings.project_id);
        }
        Ok(builder)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(serde_json::from_str("{}")?);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let builder = self.request(Method::GET, name).await?;
        self.send(builder).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        name: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T> {
        let builder = self
            .request(Method::POST, name)
            .await?
            .query(query)
            .json(body);
        self.send(builder).await
    }

    async fn delete(&self, name: &str) -> Result<Value> {
        let builder = self.request(Method::DELETE, name).await?;
        self.send(builder).await
    }

    /// Fetches every page of a list call.
    async fn list_all<P: Page>(&self, collection: &str) -> Result<Vec<P::Item>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut builder = self.request(Method::GET, collection).await?;
            if let Some(token) = &page_token {
                builder = builder.query(&[("pageToken", token.as_str())]);
            }
            let page: P = self.send(builder).await?;
            let (mut batch, next) = page.into_parts();
            items.append(&mut batch);
            match next {
                Some(token) => page_token = Some(token),
                None => return Ok(items),
            }
        }
    }

    // -- data stores --

    pub async fn list_data_stores(&self) -> Result<Vec<DataStore>> {
        let parent = format!("{}/dataStores", self.names.collection());
        debug!("Listing data stores under {}", parent);
        let stores = self.list_all::<ListDataStoresResponse>(&parent).await?;
        Ok(stores.into_iter().map(DataStore::from).collect())
    }

    pub async fn get_data_store(&self, name: &str) -> Result<DataStore> {
        debug!("Getting data store {}", name);
        let ds: WireDataStore = self.get(name).await?;
        Ok(ds.into())
    }

    pub async fn get_data_store_schema(&self, data_store_name: &str) -> Result<Map<String, Value>> {
        let schema_name = names::default_schema(data_store_name);
        debug!("Getting schema {}", schema_name);
        let schema: WireSchema = self.get(&schema_name).await?;
        Ok(schema.into())
    }

    pub async fn list_documents(&self, data_store_name: &str, branch: &str) -> Result<Vec<Document>> {
        let parent = format!("{}/documents", names::branch(data_store_name, branch));
        debug!("Listing documents under {}", parent);
        let docs = self.list_all::<ListDocumentsResponse>(&parent).await?;
        Ok(docs.into_iter().map(Document::from).collect())
    }

    /// Creates the data store, then imports documents into its default branch.
    ///
    /// If the import fails the data store stays in place and the result is
    /// `error`; nothing is rolled back.
    pub async fn create_data_store(&self, request: &CreateDataStoreRequest) -> Result<CreateResult> {
        let parent = format!("{}/dataStores", self.names.collection());
        let body = DataStoreCreateBody {
            display_name: &request.display_name,
            industry_vertical: INDUSTRY_VERTICAL_GENERIC,
            solution_types: vec![SOLUTION_TYPE_SEARCH],
            content_config: CONTENT_REQUIRED,
        };

        info!("Creating data store {}", request.data_store_id);
        let operation: Operation = match self
            .post(&parent, &[("dataStoreId", request.data_store_id.as_str())], &body)
            .await
        {
            Ok(op) => op,
            Err(e @ Error::Auth(_)) => return Err(e),
            Err(e) => {
                error!("Failed to create data store {}: {}", request.data_store_id, e);
                return Ok(CreateResult::failed(format!(
                    "Failed to create data store: {}",
                    e
                )));
            }
        };

        let data_store_name = self.names.data_store(&request.data_store_id);
        if let Some(policy) = request.wait {
            if let Err(e) = self.await_creation(&operation, &data_store_name, policy).await {
                if let Error::Auth(_) = e {
                    return Err(e);
                }
                error!("Data store {} did not finish creating: {}", data_store_name, e);
                return Ok(CreateResult::failed(format!(
                    "Failed to create data store: {}",
                    e
                )));
            }
        }

        let import = match self.import_documents(&data_store_name, &request.source).await {
            Ok(op) => op,
            Err(e @ Error::Auth(_)) => return Err(e),
            Err(e) => {
                error!(
                    "Data store {} created but import from {} failed: {}",
                    data_store_name, request.source.uri, e
                );
                return Ok(CreateResult::failed(format!(
                    "Failed to import documents: {}",
                    e
                )));
            }
        };

        info!(
            "Data store {} created, import operation {}",
            data_store_name, import.name
        );
        Ok(CreateResult::data_store(data_store_name, Some(import)))
    }

    /// Starts an import into the data store's default branch.
    pub async fn import_documents(
        &self,
        data_store_name: &str,
        source: &ImportSource,
    ) -> Result<Operation> {
        let target = format!("{}/documents:import", names::default_branch(data_store_name));
        let body = ImportDocumentsBody {
            gcs_source: GcsSource {
                input_uris: vec![&source.uri],
                data_schema: source.data_schema,
            },
            reconciliation_mode: source.reconciliation_mode,
        };
        debug!("Importing {} into {}", source.uri, data_store_name);
        self.post(&target, &[], &body).await
    }

    pub async fn delete_data_store(&self, name: &str) -> Result<DeleteResult> {
        info!("Deleting data store {}", name);
        match self.delete(name).await {
            Ok(_) => Ok(DeleteResult::Success {
                message: "Data store deleted successfully".to_string(),
            }),
            Err(e @ Error::Auth(_)) => Err(e),
            Err(e) => {
                error!("Failed to delete data store {}: {}", name, e);
                Ok(DeleteResult::Error {
                    message: format!("Failed to delete data store: {}", e),
                })
            }
        }
    }

    // -- engines --

    pub async fn list_engines(&self, collection_id: &str) -> Result<Vec<Engine>> {
        let parent = format!("{}/engines", self.names.collection_named(collection_id));
        debug!("Listing engines under {}", parent);
        let engines = self.list_all::<ListEnginesResponse>(&parent).await?;
        Ok(engines.into_iter().map(Engine::from).collect())
    }

    pub async fn get_engine(&self, name: &str) -> Result<Engine> {
        debug!("Getting engine {}", name);
        let engine: WireEngine = self.get(name).await?;
        Ok(engine.into())
    }

    /// The engine plus every referenced data store that can be read.
    ///
    /// Unreadable data stores are skipped; a missing schema leaves
    /// `schema` unset. Only a failure to read the engine itself is an error.
    pub async fn get_engine_full_config(&self, engine_name: &str) -> Result<EngineFullConfig> {
        let engine = self.get_engine(engine_name).await?;
        let mut data_stores = Vec::with_capacity(engine.data_store_ids.len());

        for data_store_id in &engine.data_store_ids {
            let ds_name = self.names.data_store(data_store_id);
            let mut ds = match self.get_data_store(&ds_name).await {
                Ok(ds) => ds,
                Err(e) => {
                    warn!("Skipping data store {}: {}", ds_name, e);
                    continue;
                }
            };
            match self.get_data_store_schema(&ds_name).await {
                Ok(schema) => ds.schema = Some(schema),
                Err(e) => debug!("No schema for {}: {}", ds_name, e),
            }
            data_stores.push(ds);
        }

        Ok(EngineFullConfig {
            engine,
            data_stores,
        })
    }

    /// Creates a search engine. `data_store_ids` is only sent when non-empty.
    pub async fn create_engine(&self, request: &CreateEngineRequest) -> Result<CreateResult> {
        let parent = format!("{}/engines", self.names.collection());
        let body = EngineCreateBody {
            display_name: &request.display_name,
            solution_type: SOLUTION_TYPE_SEARCH,
            industry_vertical: INDUSTRY_VERTICAL_GENERIC,
            app_type: APP_TYPE_INTRANET,
            common_config: WireCommonConfig::with_company(&request.company_name),
            data_store_ids: &request.data_store_ids,
            search_engine_config: request
                .search_tier
                .as_deref()
                .map(WireSearchEngineConfig::with_tier),
        };

        info!(
            "Creating engine {} with {} data store(s)",
            request.engine_id,
            request.data_store_ids.len()
        );
        let operation: Operation = match self
            .post(&parent, &[("engineId", request.engine_id.as_str())], &body)
            .await
        {
            Ok(op) => op,
            Err(e @ Error::Auth(_)) => return Err(e),
            Err(e) => {
                error!("Failed to create engine {}: {}", request.engine_id, e);
                return Ok(CreateResult::failed(format!("Failed to create engine: {}", e)));
            }
        };

        let engine_name = self.names.engine(&request.engine_id);
        if let Some(policy) = request.wait {
            if let Err(e) = self.await_creation(&operation, &engine_name, policy).await {
                if let Error::Auth(_) = e {
                    return Err(e);
                }
                error!("Engine {} did not finish creating: {}", engine_name, e);
                return Ok(CreateResult::failed(format!("Failed to create engine: {}", e)));
            }
        }

        info!("Engine {} created", engine_name);
        Ok(CreateResult::engine(engine_name))
    }

    pub async fn delete_engine(&self, name: &str) -> Result<DeleteResult> {
        info!("Deleting engine {}", name);
        match self.delete(name).await {
            Ok(_) => Ok(DeleteResult::Success {
                message: "Engine deleted successfully".to_string(),
            }),
            Err(e @ Error::Auth(_)) => Err(e),
            Err(e) => {
                error!("Failed to delete engine {}: {}", name, e);
                Ok(DeleteResult::Error {
                    message: format!("Failed to delete engine: {}", e),
                })
            }
        }
    }

    // -- operations --

    pub async fn get_operation(&self, name: &str) -> Result<Operation> {
        self.get(name).await
    }

    /// Waits for a create operation. The resource keeps its deterministic
    /// name whatever the operation reports.
    async fn await_creation(
        &self,
        operation: &Operation,
        expected_name: &str,
        policy: PollPolicy,
    ) -> Result<()> {
        let resolved = OperationPoller::new(self, policy)
            .wait_for(operation, expected_name)
            .await?;
        if resolved != expected_name {
            warn!(
                "Operation {} reported {} instead of {}",
                operation.name, resolved, expected_name
            );
        }
        Ok(())
    }
}

#[async_trait]
impl OperationSource for DiscoveryEngineClient {
    async fn get_operation(&self, name: &str) -> Result<Operation> {
        DiscoveryEngineClient::get_operation(self, name).await
    }
}
