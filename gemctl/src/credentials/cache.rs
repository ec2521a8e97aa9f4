//! Token reuse until expiry.

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::{AccessToken, TokenProvider};
use crate::error::Result;

/// Tokens this close to expiry are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Reuses the last token from `source` until it is about to expire.
///
/// Readers share the read lock. A refresh takes the write lock and re-checks
/// the cache, so concurrent callers see a single refresh.
pub struct CachedToken<S> {
    source: S,
    cached: RwLock<Option<AccessToken>>,
}

impl<S> CachedToken<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }
}

#[async_trait]
impl<S: TokenProvider> TokenProvider for CachedToken<S> {
    async fn token(&self) -> Result<AccessToken> {
        {
            let cache = self.cached.read().await;
            if let Some(token) = cache.as_ref().filter(|t| is_fresh(t)) {
                return Ok(token.clone());
            }
        }

        let mut cache = self.cached.write().await;
        if let Some(token) = cache.as_ref().filter(|t| is_fresh(t)) {
            return Ok(token.clone());
        }

        debug!("Refreshing access token");
        let token = self.source.token().await?;
        debug!("Access token valid until {}", token.expires_at());
        *cache = Some(token.clone());
        Ok(token)
    }
}

fn is_fresh(token: &AccessToken) -> bool {
    !token.expires_within(Duration::seconds(REFRESH_MARGIN_SECS))
}
