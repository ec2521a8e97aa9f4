//! Client configuration and environment-derived defaults.

use tokio::process::Command;
use tracing::{debug, info};

use crate::credentials;
use crate::error::{Error, Result};
use crate::names::ResourceNames;

pub const DEFAULT_LOCATION: &str = "us";
pub const DEFAULT_COLLECTION: &str = "default_collection";
pub const GLOBAL_LOCATION: &str = "global";
pub const GLOBAL_ENDPOINT: &str = "https://discoveryengine.googleapis.com";

const PROJECT_ENV_VARS: &[&str] = &["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];
const LOCATION_ENV_VARS: &[&str] = &["AGENTSPACE_LOCATION", "GCLOUD_LOCATION"];

/// Caller-supplied configuration. Unset fields fall back to the environment.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub collection: Option<String>,
    /// Use the ambient credential chain instead of the local credential helper.
    pub use_service_account: bool,
    /// Override for the API base URL (private endpoints, tests).
    pub endpoint: Option<String>,
    /// Credential helper command; defaults to `gcloud auth print-access-token`.
    pub token_command: Option<Vec<String>>,
}

/// Fully resolved, immutable client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub project_id: String,
    pub location: String,
    pub collection: String,
    pub endpoint: String,
    pub use_service_account: bool,
}

impl Settings {
    /// Builds settings without consulting the environment. Used when every
    /// component is known, e.g. in tests against a mock endpoint.
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        collection: impl Into<String>,
        endpoint: Option<String>,
    ) -> Self {
        let location = location.into();
        let endpoint = endpoint.unwrap_or_else(|| endpoint_for_location(&location));
        Self {
            project_id: project_id.into(),
            location,
            collection: collection.into(),
            endpoint,
            use_service_account: false,
        }
    }

    /// Resolves a [`Config`] against the process environment.
    pub async fn resolve(config: Config) -> Result<Self> {
        Self::resolve_with(config, |key| std::env::var(key).ok()).await
    }

    /// Resolves a [`Config`] using `env` for variable lookups.
    pub async fn resolve_with<F>(config: Config, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let location = resolve_location(config.location.as_deref(), &env);
        let project_id = match project_from_env(config.project_id.as_deref(), &env) {
            Some(project) => project,
            None => discover_project().await.ok_or_else(|| {
                Error::Config(
                    "no project ID found in environment variables, gcloud config, or credentials"
                        .to_string(),
                )
            })?,
        };
        let collection = non_empty(config.collection.as_deref())
            .unwrap_or(DEFAULT_COLLECTION)
            .to_string();
        let endpoint = match non_empty(config.endpoint.as_deref()) {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => endpoint_for_location(&location),
        };

        info!(
            project = %project_id,
            location = %location,
            collection = %collection,
            endpoint = %endpoint,
            "Resolved client settings"
        );

        Ok(Self {
            project_id,
            location,
            collection,
            endpoint,
            use_service_account: config.use_service_account,
        })
    }

    pub fn names(&self) -> ResourceNames {
        ResourceNames::new(&self.project_id, &self.location, &self.collection)
    }
}

/// API base URL for a location.
///
/// `global` uses the default authority; anything else uses the regional
/// authority named by the part before the first hyphen (`us-central1` -> `us`).
pub fn endpoint_for_location(location: &str) -> String {
    if location == GLOBAL_LOCATION {
        return GLOBAL_ENDPOINT.to_string();
    }
    let region = location.split('-').next().unwrap_or(location);
    format!("https://{}-discoveryengine.googleapis.com", region)
}

/// Location: explicit, then environment, then [`DEFAULT_LOCATION`].
pub fn resolve_location<F>(explicit: Option<&str>, env: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(explicit)
        .map(str::to_string)
        .or_else(|| first_env(LOCATION_ENV_VARS, env))
        .unwrap_or_else(|| DEFAULT_LOCATION.to_string())
}

/// Project from the explicit value or environment variables only.
pub fn project_from_env<F>(explicit: Option<&str>, env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(explicit)
        .map(str::to_string)
        .or_else(|| first_env(PROJECT_ENV_VARS, env))
}

/// Project from gcloud config, then from the ambient credential.
async fn discover_project() -> Option<String> {
    if let Some(project) = gcloud_config_project().await {
        return Some(project);
    }
    credentials::ambient_project().await
}

async fn gcloud_config_project() -> Option<String> {
    let output = Command::new("gcloud")
        .args(["config", "get-value", "project"])
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        debug!("gcloud config get-value project exited with {}", output.status);
        return None;
    }
    let project = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!project.is_empty()).then_some(project)
}

fn first_env<F>(keys: &[&str], env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| env(key))
        .find(|value| !value.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
