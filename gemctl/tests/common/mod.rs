//! Shared test utilities for gemctl integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use gemctl::credentials::{AccessToken, TokenProvider};
use gemctl::{DiscoveryEngineClient, Error, Settings};
use serde_json::{Value, json};
use wiremock::{MockServer, ResponseTemplate};

pub const PROJECT: &str = "p";
pub const LOCATION: &str = "us";
pub const COLLECTION: &str = "default_collection";

/// URL path prefix of the default collection.
pub const COLLECTION_PATH: &str = "/v1/projects/p/locations/us/collections/default_collection";

pub const TEST_TOKEN: &str = "test-token";

/// Hands out a fixed, long-lived token.
pub struct StaticToken;

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> gemctl::Result<AccessToken> {
        Ok(AccessToken::new(TEST_TOKEN, Utc::now() + Duration::hours(1)))
    }
}

/// Always fails, like a broken credential helper.
pub struct BrokenToken;

#[async_trait]
impl TokenProvider for BrokenToken {
    async fn token(&self) -> gemctl::Result<AccessToken> {
        Err(Error::Auth("gcloud exited with status 1".into()))
    }
}

pub fn settings(server: &MockServer) -> Settings {
    Settings::new(PROJECT, LOCATION, COLLECTION, Some(server.uri()))
}

/// Client pointed at `server` with a static token.
pub fn client(server: &MockServer) -> Arc<DiscoveryEngineClient> {
    Arc::new(DiscoveryEngineClient::new(
        settings(server),
        Arc::new(StaticToken),
    ))
}

pub fn data_store_path(id: &str) -> String {
    format!("{}/dataStores/{}", COLLECTION_PATH, id)
}

pub fn engine_path(id: &str) -> String {
    format!("{}/engines/{}", COLLECTION_PATH, id)
}

pub fn data_store_name(id: &str) -> String {
    format!(
        "projects/{}/locations/{}/collections/{}/dataStores/{}",
        PROJECT, LOCATION, COLLECTION, id
    )
}

pub fn engine_name(id: &str) -> String {
    format!(
        "projects/{}/locations/{}/collections/{}/engines/{}",
        PROJECT, LOCATION, COLLECTION, id
    )
}

/// A running long-running operation.
pub fn operation(id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "name": format!("projects/{}/locations/{}/operations/{}", PROJECT, LOCATION, id),
        "metadata": {}
    }))
}

/// Google-style error envelope.
pub fn api_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {"code": status, "message": message, "status": code}
    }))
}

pub fn data_store_json(id: &str, display_name: &str) -> Value {
    json!({
        "name": data_store_name(id),
        "displayName": display_name,
        "industryVertical": "GENERIC",
        "contentConfig": "CONTENT_REQUIRED",
        "createTime": "2025-06-01T12:00:00.000000Z",
        "solutionTypes": ["SOLUTION_TYPE_SEARCH"]
    })
}

pub fn engine_json(id: &str, display_name: &str, data_store_ids: &[&str]) -> Value {
    json!({
        "name": engine_name(id),
        "displayName": display_name,
        "solutionType": "SOLUTION_TYPE_SEARCH",
        "industryVertical": "GENERIC",
        "appType": "APP_TYPE_INTRANET",
        "dataStoreIds": data_store_ids,
        "commonConfig": {"companyName": "BCBSMA"}
    })
}
