use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use docwell_application::IdentityCache;
use docwell_core::{AppResult, UserId};
use docwell_domain::ResolvedIdentity;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct IdentityCacheEntry {
    identity: ResolvedIdentity,
    expires_at: Instant,
}

/// In-memory TTL cache for resolved identities.
///
/// Entries expire on read and are dropped eagerly by explicit invalidation
/// when an administrative change touches a user's assignments.
#[derive(Default)]
pub struct InMemoryIdentityCache {
    entries: RwLock<HashMap<UserId, IdentityCacheEntry>>,
}

impl InMemoryIdentityCache {
    /// Creates an empty identity cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityCache for InMemoryIdentityCache {
    async fn get(&self, user_id: UserId) -> AppResult<Option<ResolvedIdentity>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&user_id) {
                if entry.expires_at > Instant::now() {
                    return Ok(Some(entry.identity.clone()));
                }
            } else {
                return Ok(None);
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(&user_id)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(&user_id);
        }

        Ok(None)
    }

    async fn set(
        &self,
        user_id: UserId,
        identity: ResolvedIdentity,
        ttl_seconds: u32,
    ) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(ttl_seconds)))
            .unwrap_or(now);

        self.entries.write().await.insert(
            user_id,
            IdentityCacheEntry {
                identity,
                expires_at,
            },
        );

        Ok(())
    }

    async fn invalidate(&self, user_id: UserId) -> AppResult<()> {
        self.entries.write().await.remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use docwell_application::IdentityCache;
    use docwell_core::UserId;
    use docwell_domain::{AccessLevel, CapabilitySet, ResolvedIdentity};

    use super::InMemoryIdentityCache;

    fn identity(user_id: UserId) -> ResolvedIdentity {
        ResolvedIdentity::from_parts(user_id, AccessLevel::EDITOR, CapabilitySet::new())
    }

    #[tokio::test]
    async fn set_then_get_returns_entry() {
        let cache = InMemoryIdentityCache::new();
        let user_id = UserId::new();

        let stored = cache.set(user_id, identity(user_id), 60).await;
        assert!(stored.is_ok());

        let fetched = cache.get(user_id).await;
        assert!(fetched.is_ok_and(|entry| entry.is_some()));
    }

    #[tokio::test]
    async fn zero_ttl_stores_nothing() {
        let cache = InMemoryIdentityCache::new();
        let user_id = UserId::new();

        let stored = cache.set(user_id, identity(user_id), 0).await;
        assert!(stored.is_ok());

        let fetched = cache.get(user_id).await;
        assert!(fetched.is_ok_and(|entry| entry.is_none()));
    }

    #[tokio::test]
    async fn invalidation_drops_the_entry() {
        let cache = InMemoryIdentityCache::new();
        let user_id = UserId::new();

        let _ = cache.set(user_id, identity(user_id), 60).await;
        let invalidated = cache.invalidate(user_id).await;
        assert!(invalidated.is_ok());

        let fetched = cache.get(user_id).await;
        assert!(fetched.is_ok_and(|entry| entry.is_none()));
    }
}
