//! Deterministic resource names.
//!
//! Every resource path is a pure function of project, location, collection
//! and resource ID. Nothing here looks at a remote response.

/// Name builder scoped to one project/location/collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    project: String,
    location: String,
    collection: String,
}

impl ResourceNames {
    pub fn new(
        project: impl Into<String>,
        location: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
            collection: collection.into(),
        }
    }

    pub fn collection_id(&self) -> &str {
        &self.collection
    }

    /// `projects/{p}/locations/{l}`
    pub fn location(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.location)
    }

    /// `projects/{p}/locations/{l}/collections/{c}`
    pub fn collection(&self) -> String {
        self.collection_named(&self.collection)
    }

    /// Collection path for an arbitrary collection in the same project/location.
    pub fn collection_named(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.location(), collection)
    }

    pub fn data_store(&self, data_store_id: &str) -> String {
        format!("{}/dataStores/{}", self.collection(), data_store_id)
    }

    pub fn engine(&self, engine_id: &str) -> String {
        format!("{}/engines/{}", self.collection(), engine_id)
    }
}

/// Branch under a data store, e.g. `default_branch`.
pub fn branch(data_store_name: &str, branch: &str) -> String {
    format!("{}/branches/{}", data_store_name, branch)
}

pub fn default_branch(data_store_name: &str) -> String {
    branch(data_store_name, DEFAULT_BRANCH)
}

pub fn default_schema(data_store_name: &str) -> String {
    format!("{}/schemas/default_schema", data_store_name)
}

pub const DEFAULT_BRANCH: &str = "default_branch";
