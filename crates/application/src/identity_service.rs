use std::sync::Arc;

use async_trait::async_trait;
use docwell_core::{AppResult, UserId};
use docwell_domain::{ResolvedIdentity, RoleAssignment, ViewerContext};

/// Repository port for loading identity-resolution inputs.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Lists a user's active role assignments with role snapshots.
    ///
    /// Assignments pointing at deleted roles are excluded by the adapter
    /// and logged there; the resolver only ever sees consistent rows.
    async fn list_active_assignments(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>>;

    /// Lists the organizational groups a user belongs to.
    async fn list_group_memberships(&self, user_id: UserId) -> AppResult<Vec<String>>;
}

/// Cache port for resolved identities.
///
/// Entries carry a short TTL and are explicitly invalidated when role
/// assignments or grants change; administrative edits therefore take effect
/// for subsequently-resolved identities, never retroactively mid-request.
#[async_trait]
pub trait IdentityCache: Send + Sync {
    /// Returns a cached identity when present and fresh.
    async fn get(&self, user_id: UserId) -> AppResult<Option<ResolvedIdentity>>;

    /// Stores a resolved identity for the TTL.
    async fn set(
        &self,
        user_id: UserId,
        identity: ResolvedIdentity,
        ttl_seconds: u32,
    ) -> AppResult<()>;

    /// Drops the cached entry for a user.
    async fn invalidate(&self, user_id: UserId) -> AppResult<()>;
}

/// Application service resolving per-request identities.
///
/// This is the single read path for role and capability data; handlers and
/// services never walk raw assignment rows themselves.
#[derive(Clone)]
pub struct IdentityService {
    repository: Arc<dyn IdentityRepository>,
    cache: Option<Arc<dyn IdentityCache>>,
    cache_ttl_seconds: u32,
}

impl IdentityService {
    /// Creates an uncached identity service.
    #[must_use]
    pub fn new(repository: Arc<dyn IdentityRepository>) -> Self {
        Self {
            repository,
            cache: None,
            cache_ttl_seconds: 0,
        }
    }

    /// Attaches a cache with the given TTL.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn IdentityCache>, ttl_seconds: u32) -> Self {
        self.cache = Some(cache);
        self.cache_ttl_seconds = ttl_seconds;
        self
    }

    /// Resolves a user's effective identity from active role assignments.
    ///
    /// A user with zero active assignments resolves to the minimal-privilege
    /// identity; that is not an error condition.
    pub async fn resolve(&self, user_id: UserId) -> AppResult<ResolvedIdentity> {
        if let Some(cache) = &self.cache
            && let Some(identity) = cache.get(user_id).await?
        {
            return Ok(identity);
        }

        let assignments = self.repository.list_active_assignments(user_id).await?;
        let identity = ResolvedIdentity::resolve(user_id, &assignments);

        if let Some(cache) = &self.cache {
            cache
                .set(user_id, identity.clone(), self.cache_ttl_seconds)
                .await?;
        }

        Ok(identity)
    }

    /// Resolves the identity together with the visibility viewer context.
    pub async fn resolve_viewer(
        &self,
        user_id: UserId,
    ) -> AppResult<(ResolvedIdentity, ViewerContext)> {
        let identity = self.resolve(user_id).await?;
        let groups = self.repository.list_group_memberships(user_id).await?;
        let viewer = ViewerContext::new(&identity, groups);

        Ok((identity, viewer))
    }

    /// Drops any cached identity for a user after an administrative change.
    pub async fn invalidate(&self, user_id: UserId) -> AppResult<()> {
        if let Some(cache) = &self.cache {
            cache.invalidate(user_id).await?;
        }

        Ok(())
    }
}
