//! Bearer-token acquisition for outbound API calls.
//!
//! Two sources are available:
//! - [`CommandTokenSource`]: runs a local helper (`gcloud auth print-access-token`)
//! - [`ManagedTokenSource`]: ambient credentials (ADC file or metadata server)
//!
//! Both are wrapped in [`CachedToken`] so a token is reused until it expires.

mod cache;
mod command;
mod managed;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::config::Settings;
use crate::error::Result;

pub use cache::CachedToken;
pub use command::{CommandTokenSource, TOKEN_LIFETIME_MINUTES};
pub use managed::{ManagedTokenSource, ambient_project};

/// An access token and the instant after which it must not be used.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True when the token expires within `margin` from now.
    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Produces bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<AccessToken>;
}

#[async_trait]
impl<T: TokenProvider + ?Sized> TokenProvider for Arc<T> {
    async fn token(&self) -> Result<AccessToken> {
        (**self).token().await
    }
}

/// Builds the cached token provider selected by `settings`.
///
/// In managed mode the ambient chain is discovered here; a missing credential
/// fails construction.
pub async fn provider_for(
    settings: &Settings,
    token_command: Option<Vec<String>>,
) -> Result<Arc<dyn TokenProvider>> {
    if settings.use_service_account {
        let source = ManagedTokenSource::discover().await?;
        info!("Using ambient credentials: {}", source.describe());
        Ok(Arc::new(CachedToken::new(source)))
    } else {
        let source = match token_command {
            Some(command) => CommandTokenSource::new(command)?,
            None => CommandTokenSource::gcloud(),
        };
        info!("Using delegated credentials from `{}`", source.describe());
        Ok(Arc::new(CachedToken::new(source)))
    }
}
