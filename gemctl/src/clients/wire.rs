//! Discovery Engine v1 REST representations and their conversion into the
//! internal model. Absent optional fields become empty containers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::model::{
    BillingEstimation, DataSchema, DataStore, Document, Engine, ReconciliationMode,
    SearchEngineConfig,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WireEngine {
    name: String,
    display_name: String,
    solution_type: String,
    industry_vertical: String,
    app_type: String,
    create_time: Option<DateTime<Utc>>,
    data_store_ids: Vec<String>,
    search_engine_config: Option<WireSearchEngineConfig>,
    common_config: Option<WireCommonConfig>,
    features: BTreeMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WireSearchEngineConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    search_tier: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    search_add_ons: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WireCommonConfig {
    company_name: String,
}

impl From<WireEngine> for Engine {
    fn from(engine: WireEngine) -> Self {
        let mut common_config = Map::new();
        if let Some(common) = engine.common_config {
            common_config.insert("companyName".to_string(), Value::String(common.company_name));
        }
        Engine {
            name: engine.name,
            display_name: engine.display_name,
            solution_type: engine.solution_type,
            industry_vertical: engine.industry_vertical,
            app_type: engine.app_type,
            create_time: engine.create_time,
            data_store_ids: engine.data_store_ids,
            search_engine_config: engine.search_engine_config.map(|c| SearchEngineConfig {
                search_tier: c.search_tier,
                search_add_ons: c.search_add_ons,
            }),
            common_config,
            features: engine.features,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WireDataStore {
    name: String,
    display_name: String,
    industry_vertical: String,
    content_config: String,
    create_time: Option<DateTime<Utc>>,
    solution_types: Vec<String>,
    acl_enabled: bool,
    billing_estimation: Option<WireBillingEstimation>,
    document_processing_config: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WireBillingEstimation {
    #[serde(deserialize_with = "int64")]
    unstructured_data_size: i64,
    unstructured_data_update_time: Option<DateTime<Utc>>,
}

impl From<WireDataStore> for DataStore {
    fn from(ds: WireDataStore) -> Self {
        DataStore {
            name: ds.name,
            display_name: ds.display_name,
            industry_vertical: ds.industry_vertical,
            content_config: ds.content_config,
            create_time: ds.create_time,
            solution_types: ds.solution_types,
            acl_enabled: ds.acl_enabled,
            billing_estimation: ds.billing_estimation.map(|b| BillingEstimation {
                unstructured_data_size: b.unstructured_data_size,
                unstructured_data_update_time: b.unstructured_data_update_time,
            }),
            document_processing_config: ds.document_processing_config.unwrap_or_default(),
            schema: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WireDocument {
    id: String,
    struct_data: Option<Map<String, Value>>,
    json_data: Option<String>,
    index_time: Option<DateTime<Utc>>,
}

impl From<WireDocument> for Document {
    fn from(doc: WireDocument) -> Self {
        let content = match (doc.struct_data, doc.json_data) {
            (Some(data), _) => data,
            (None, Some(json)) => match serde_json::from_str(&json) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
            (None, None) => Map::new(),
        };
        Document {
            id: doc.id,
            content,
            index_time: doc.index_time,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WireSchema {
    name: String,
    struct_schema: Option<Map<String, Value>>,
    json_schema: Option<String>,
}

impl From<WireSchema> for Map<String, Value> {
    fn from(schema: WireSchema) -> Self {
        let mut map = Map::new();
        if !schema.name.is_empty() {
            map.insert("name".to_string(), Value::String(schema.name));
        }
        if let Some(struct_schema) = schema.struct_schema {
            map.insert("structSchema".to_string(), Value::Object(struct_schema));
        }
        if let Some(json_schema) = schema.json_schema {
            map.insert("jsonSchema".to_string(), Value::String(json_schema));
        }
        map
    }
}

/// One page of a list call.
pub(crate) trait Page: serde::de::DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

macro_rules! list_response {
    ($name:ident, $field:ident, $item:ty) => {
        #[derive(Debug, Default, Deserialize)]
        #[serde(default, rename_all = "camelCase")]
        pub(crate) struct $name {
            $field: Vec<$item>,
            next_page_token: Option<String>,
        }

        impl Page for $name {
            type Item = $item;

            fn into_parts(self) -> (Vec<$item>, Option<String>) {
                (
                    self.$field,
                    self.next_page_token.filter(|t| !t.is_empty()),
                )
            }
        }
    };
}

list_response!(ListDataStoresResponse, data_stores, WireDataStore);
list_response!(ListEnginesResponse, engines, WireEngine);
list_response!(ListDocumentsResponse, documents, WireDocument);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DataStoreCreateBody<'a> {
    pub display_name: &'a str,
    pub industry_vertical: &'a str,
    pub solution_types: Vec<&'a str>,
    pub content_config: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImportDocumentsBody<'a> {
    pub gcs_source: GcsSource<'a>,
    pub reconciliation_mode: ReconciliationMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GcsSource<'a> {
    pub input_uris: Vec<&'a str>,
    pub data_schema: DataSchema,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EngineCreateBody<'a> {
    pub display_name: &'a str,
    pub solution_type: &'a str,
    pub industry_vertical: &'a str,
    pub app_type: &'a str,
    pub common_config: WireCommonConfig,
    /// Omitted rather than sent empty.
    #[serde(skip_serializing_if = "no_ids")]
    pub data_store_ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_engine_config: Option<WireSearchEngineConfig>,
}

impl WireCommonConfig {
    pub fn with_company(company_name: &str) -> Self {
        Self {
            company_name: company_name.to_string(),
        }
    }
}

impl WireSearchEngineConfig {
    pub fn with_tier(search_tier: &str) -> Self {
        Self {
            search_tier: search_tier.to_string(),
            search_add_ons: Vec::new(),
        }
    }
}

fn no_ids(ids: &&[String]) -> bool {
    ids.is_empty()
}

/// int64 fields arrive as JSON strings; accept numbers too.
fn int64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
