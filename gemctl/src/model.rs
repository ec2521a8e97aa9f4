//! Internal data model shared by the client, poller and reconcilers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A search engine (app) in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engine {
    pub name: String,
    pub display_name: String,
    pub solution_type: String,
    pub industry_vertical: String,
    pub app_type: String,
    pub create_time: Option<DateTime<Utc>>,
    /// Referenced data store IDs, in the order the API reports them.
    pub data_store_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_engine_config: Option<SearchEngineConfig>,
    pub common_config: Map<String, Value>,
    pub features: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEngineConfig {
    pub search_tier: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_add_ons: Vec<String>,
}

/// A content container populated from an import source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStore {
    pub name: String,
    pub display_name: String,
    pub industry_vertical: String,
    pub content_config: String,
    pub create_time: Option<DateTime<Utc>>,
    pub solution_types: Vec<String>,
    pub acl_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_estimation: Option<BillingEstimation>,
    pub document_processing_config: Map<String, Value>,
    /// Only populated by the full-configuration resolver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingEstimation {
    pub unstructured_data_size: i64,
    pub unstructured_data_update_time: Option<DateTime<Utc>>,
}

/// Read-only projection of an ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub content: Map<String, Value>,
    pub index_time: Option<DateTime<Utc>>,
}

/// Handle to a remote long-running operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

/// `google.rpc.Status` carried by a failed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

/// An engine together with every referenced data store that could be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineFullConfig {
    pub engine: Engine,
    pub data_stores: Vec<DataStore>,
}

/// Outcome of a create call.
///
/// A failed create never carries a resource name, even when part of the
/// remote work (e.g. the container) already happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CreateResult {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        engine_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_store_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        import_operation: Option<Operation>,
    },
    Error {
        error: String,
    },
}

impl CreateResult {
    pub fn data_store(name: String, import_operation: Option<Operation>) -> Self {
        CreateResult::Success {
            engine_name: None,
            data_store_name: Some(name),
            import_operation,
        }
    }

    pub fn engine(name: String) -> Self {
        CreateResult::Success {
            engine_name: Some(name),
            data_store_name: None,
            import_operation: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        CreateResult::Error {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CreateResult::Success { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            CreateResult::Success { .. } => "success",
            CreateResult::Error { .. } => "error",
        }
    }

    /// Resulting engine or data store name on success.
    pub fn name(&self) -> Option<&str> {
        match self {
            CreateResult::Success {
                engine_name,
                data_store_name,
                ..
            } => engine_name.as_deref().or(data_store_name.as_deref()),
            CreateResult::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CreateResult::Error { error } => Some(error),
            CreateResult::Success { .. } => None,
        }
    }
}

/// Outcome of a delete call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeleteResult {
    Success { message: String },
    Error { message: String },
}

impl DeleteResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DeleteResult::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            DeleteResult::Success { message } | DeleteResult::Error { message } => message,
        }
    }
}

/// Document schema of an import source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSchema {
    #[default]
    Document,
    Custom,
    Csv,
    Content,
}

/// How imported documents are reconciled with existing ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationMode {
    #[default]
    Incremental,
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_result_success_json() {
        let result = CreateResult::data_store(
            "projects/p/locations/us/collections/default_collection/dataStores/ds1".into(),
            None,
        );
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "status": "success",
                "data_store_name": "projects/p/locations/us/collections/default_collection/dataStores/ds1",
            })
        );
        assert_eq!(result.status(), "success");
    }

    #[test]
    fn test_create_result_error_has_no_name() {
        let result = CreateResult::failed("Failed to create data store: boom");
        assert!(!result.is_success());
        assert_eq!(result.name(), None);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "error", "error": "Failed to create data store: boom"})
        );
    }

    #[test]
    fn test_delete_result_json() {
        let result: DeleteResult =
            serde_json::from_value(json!({"status": "error", "message": "nope"})).unwrap();
        assert!(!result.is_success());
        assert_eq!(result.message(), "nope");
    }

    #[test]
    fn test_import_enums_wire_values() {
        assert_eq!(serde_json::to_value(DataSchema::Document).unwrap(), json!("document"));
        assert_eq!(
            serde_json::to_value(ReconciliationMode::Incremental).unwrap(),
            json!("INCREMENTAL")
        );
    }
}
