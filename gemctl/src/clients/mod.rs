//! Clients for remote services.
//!
//! - [`DiscoveryEngineClient`]: engines, data stores, documents and operations

mod discovery;
mod wire;

pub use discovery::{
    APP_TYPE_INTRANET, CONTENT_REQUIRED, CreateDataStoreRequest, CreateEngineRequest,
    DEFAULT_COMPANY_NAME, DiscoveryEngineClient, INDUSTRY_VERTICAL_GENERIC, ImportSource,
    SEARCH_TIER_ENTERPRISE, SOLUTION_TYPE_SEARCH,
};
