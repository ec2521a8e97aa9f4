//! gemctl: reconciles declared search engines and data stores against the
//! Discovery Engine management API.
//!
//! - [`clients`]: REST client for engines, data stores, documents and operations
//! - [`poller`]: waits on long-running operations
//! - [`reconciler`]: create/read/update/delete per resource kind
//! - [`credentials`]: bearer tokens from a local helper or ambient credentials

pub mod clients;
pub mod config;
pub mod credentials;
pub mod error;
pub mod model;
pub mod names;
pub mod poller;
pub mod reconciler;

pub use clients::DiscoveryEngineClient;
pub use config::{Config, Settings};
pub use error::{Error, Result};
