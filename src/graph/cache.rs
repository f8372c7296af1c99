//! In-memory cache for the client-credentials token.

use super::AppAccessToken;
use secrecy::{ExposeSecret, SecretString};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

// Refresh this long before the provider-declared expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);
// Used when the token response omits `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug)]
struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

impl CachedToken {
    fn is_expired(&self, margin: Duration) -> bool {
        Instant::now() + margin >= self.expires_at
    }
}

#[derive(Debug)]
pub struct AppTokenCache {
    slot: RwLock<Option<CachedToken>>,
    margin: Duration,
}

impl Default for AppTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AppTokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
            margin: REFRESH_MARGIN,
        }
    }

    #[cfg(test)]
    fn with_margin(margin: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            margin,
        }
    }

    /// Cached token, unless it is missing or inside the refresh margin.
    pub async fn get(&self) -> Option<AppAccessToken> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|cached| !cached.is_expired(self.margin))
            .map(|cached| AppAccessToken::new(cached.token.expose_secret()))
    }

    pub async fn store(&self, token: &AppAccessToken, expires_in: Option<u64>) {
        let lifetime = expires_in.map_or(DEFAULT_LIFETIME, Duration::from_secs);
        let mut slot = self.slot.write().await;
        *slot = Some(CachedToken {
            token: SecretString::from(token.bearer().to_string()),
            expires_at: Instant::now() + lifetime,
        });
    }

    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_cache_misses() {
        let cache = AppTokenCache::new();
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_store_then_hit() {
        let cache = AppTokenCache::new();
        cache.store(&AppAccessToken::new("t1"), Some(3600)).await;

        let token = cache.get().await;
        assert_eq!(token.as_ref().map(AppAccessToken::bearer), Some("t1"));
    }

    #[tokio::test]
    async fn test_token_inside_margin_is_stale() {
        let cache = AppTokenCache::new();
        // expires in 60s, margin is 300s
        cache.store(&AppAccessToken::new("t1"), Some(60)).await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_expiry_uses_default_lifetime() {
        let cache = AppTokenCache::new();
        cache.store(&AppAccessToken::new("t1"), None).await;
        assert!(cache.get().await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = AppTokenCache::with_margin(Duration::ZERO);
        cache.store(&AppAccessToken::new("t1"), Some(3600)).await;
        cache.invalidate().await;
        assert!(cache.get().await.is_none());
    }

    #[test]
    fn test_cached_token_expiry() {
        let token = CachedToken {
            token: SecretString::from("t".to_string()),
            expires_at: Instant::now() + Duration::from_secs(600),
        };

        assert!(!token.is_expired(Duration::from_secs(300)));
        assert!(token.is_expired(Duration::from_secs(900)));
    }
}
