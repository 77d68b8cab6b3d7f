use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docwell_core::{AppError, AppResult, RoleId, UserId, UserIdentity};
use docwell_domain::{AccessLevel, AuditAction, Capability};

use crate::{AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository};
use crate::identity_service::IdentityService;

/// Role definition returned to administrative callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    /// Stable role identifier.
    pub role_id: RoleId,
    /// Unique role name.
    pub name: String,
    /// Human-readable role label.
    pub label: String,
    /// Authority level granted by the role.
    pub level: AccessLevel,
    /// Indicates a system-managed role.
    pub is_system: bool,
    /// Effective capability grants.
    pub capabilities: Vec<Capability>,
}

/// Assignment projection mapping a user to a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignmentRecord {
    /// Assigned user.
    pub user_id: UserId,
    /// Role identifier.
    pub role_id: RoleId,
    /// Role name.
    pub role_name: String,
    /// Whether the assignment currently counts toward authorization.
    pub is_active: bool,
    /// Assignment timestamp.
    pub assigned_at: DateTime<Utc>,
}

/// Input payload for creating custom roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role name.
    pub name: String,
    /// Human-readable role label.
    pub label: String,
    /// Authority level granted by the role.
    pub level: AccessLevel,
    /// Capabilities to grant to the role.
    pub capabilities: Vec<Capability>,
}

/// Repository port for role and assignment administration.
///
/// This is the only writer of role, capability-grant, and assignment data;
/// the engine's read paths never mutate it.
#[async_trait]
pub trait SecurityAdminRepository: Send + Sync {
    /// Lists all roles with effective grants.
    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>>;

    /// Creates a custom role and attaches grants.
    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition>;

    /// Assigns an existing role to a user.
    async fn assign_role_to_user(&self, user_id: UserId, role_name: &str) -> AppResult<()>;

    /// Deactivates a role assignment for a user.
    async fn unassign_role_from_user(&self, user_id: UserId, role_name: &str) -> AppResult<()>;

    /// Lists current role assignments.
    async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignmentRecord>>;
}

/// Application service for security administration workflows.
#[derive(Clone)]
pub struct SecurityAdminService {
    identity_service: IdentityService,
    repository: Arc<dyn SecurityAdminRepository>,
    audit_log_repository: Arc<dyn AuditLogRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl SecurityAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        identity_service: IdentityService,
        repository: Arc<dyn SecurityAdminRepository>,
        audit_log_repository: Arc<dyn AuditLogRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            identity_service,
            repository,
            audit_log_repository,
            audit_repository,
        }
    }

    /// Returns all roles for administrative users.
    pub async fn list_roles(&self, actor: &UserIdentity) -> AppResult<Vec<RoleDefinition>> {
        self.require_capability(actor, Capability::SecurityRoleManage)
            .await?;
        self.repository.list_roles().await
    }

    /// Creates a custom role and emits an audit event.
    pub async fn create_role(
        &self,
        actor: &UserIdentity,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition> {
        self.require_capability(actor, Capability::SecurityRoleManage)
            .await?;

        let role = self.repository.create_role(input).await?;

        self.audit_repository
            .append_event(AuditEvent {
                actor: actor.user_id(),
                action: AuditAction::SecurityRoleCreated,
                resource_type: "role".to_owned(),
                resource_id: role.name.clone(),
                detail: Some(format!(
                    "created role '{}' at level {}",
                    role.name, role.level
                )),
            })
            .await?;

        Ok(role)
    }

    /// Assigns a role to a user, invalidating their cached identity.
    pub async fn assign_role(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        role_name: &str,
    ) -> AppResult<()> {
        self.require_capability(actor, Capability::SecurityRoleManage)
            .await?;

        self.repository.assign_role_to_user(user_id, role_name).await?;
        self.identity_service.invalidate(user_id).await?;

        self.audit_repository
            .append_event(AuditEvent {
                actor: actor.user_id(),
                action: AuditAction::SecurityRoleAssigned,
                resource_type: "role_assignment".to_owned(),
                resource_id: role_name.to_owned(),
                detail: Some(format!("assigned role '{role_name}' to user '{user_id}'")),
            })
            .await
    }

    /// Deactivates a user's role assignment, invalidating their cached
    /// identity.
    pub async fn unassign_role(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        role_name: &str,
    ) -> AppResult<()> {
        self.require_capability(actor, Capability::SecurityRoleManage)
            .await?;

        self.repository
            .unassign_role_from_user(user_id, role_name)
            .await?;
        self.identity_service.invalidate(user_id).await?;

        self.audit_repository
            .append_event(AuditEvent {
                actor: actor.user_id(),
                action: AuditAction::SecurityRoleUnassigned,
                resource_type: "role_assignment".to_owned(),
                resource_id: role_name.to_owned(),
                detail: Some(format!(
                    "removed role '{role_name}' from user '{user_id}'"
                )),
            })
            .await
    }

    /// Lists current role assignments for administrative users.
    pub async fn list_role_assignments(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<Vec<RoleAssignmentRecord>> {
        self.require_capability(actor, Capability::SecurityRoleManage)
            .await?;
        self.repository.list_role_assignments().await
    }

    /// Lists recent audit log entries.
    pub async fn list_audit_log(
        &self,
        actor: &UserIdentity,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        self.require_capability(actor, Capability::SecurityAuditRead)
            .await?;
        self.audit_log_repository.list_recent_entries(query).await
    }

    async fn require_capability(
        &self,
        actor: &UserIdentity,
        capability: Capability,
    ) -> AppResult<()> {
        let identity = self.identity_service.resolve(actor.user_id()).await?;
        if identity.has_capability(capability) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user '{}' is missing capability '{}'",
            actor.user_id(),
            capability.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use docwell_core::{AppError, AppResult, RoleId, UserId, UserIdentity};
    use docwell_domain::{AccessLevel, Capability, ResolvedIdentity, RoleAssignment};
    use tokio::sync::Mutex;

    use super::{
        CreateRoleInput, RoleAssignmentRecord, RoleDefinition, SecurityAdminRepository,
        SecurityAdminService,
    };
    use crate::identity_service::{IdentityCache, IdentityRepository, IdentityService};
    use crate::{AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository};

    #[derive(Default)]
    struct FakeSecurityAdminRepository {
        roles: Mutex<Vec<RoleDefinition>>,
        assignments: Mutex<Vec<RoleAssignmentRecord>>,
    }

    #[async_trait]
    impl SecurityAdminRepository for FakeSecurityAdminRepository {
        async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
            Ok(self.roles.lock().await.clone())
        }

        async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition> {
            let role = RoleDefinition {
                role_id: RoleId::new(),
                name: input.name,
                label: input.label,
                level: input.level,
                is_system: false,
                capabilities: input.capabilities,
            };
            self.roles.lock().await.push(role.clone());
            Ok(role)
        }

        async fn assign_role_to_user(&self, user_id: UserId, role_name: &str) -> AppResult<()> {
            self.assignments.lock().await.push(RoleAssignmentRecord {
                user_id,
                role_id: RoleId::new(),
                role_name: role_name.to_owned(),
                is_active: true,
                assigned_at: Utc::now(),
            });
            Ok(())
        }

        async fn unassign_role_from_user(&self, user_id: UserId, role_name: &str) -> AppResult<()> {
            let mut assignments = self.assignments.lock().await;
            for assignment in assignments
                .iter_mut()
                .filter(|record| record.user_id == user_id && record.role_name == role_name)
            {
                assignment.is_active = false;
            }
            Ok(())
        }

        async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignmentRecord>> {
            Ok(self.assignments.lock().await.clone())
        }
    }

    #[derive(Default)]
    struct FakeAuditRepository {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditRepository for FakeAuditRepository {
        async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
            self.events.lock().await.push(event);
            Ok(())
        }
    }

    struct FakeAuditLogRepository;

    #[async_trait]
    impl AuditLogRepository for FakeAuditLogRepository {
        async fn list_recent_entries(
            &self,
            _query: AuditLogQuery,
        ) -> AppResult<Vec<AuditLogEntry>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct FakeIdentityRepository {
        assignments: HashMap<UserId, Vec<RoleAssignment>>,
    }

    #[async_trait]
    impl IdentityRepository for FakeIdentityRepository {
        async fn list_active_assignments(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>> {
            Ok(self.assignments.get(&user_id).cloned().unwrap_or_default())
        }

        async fn list_group_memberships(&self, _user_id: UserId) -> AppResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct FakeIdentityCache {
        entries: Mutex<HashMap<UserId, ResolvedIdentity>>,
        invalidations: Mutex<Vec<UserId>>,
    }

    #[async_trait]
    impl IdentityCache for FakeIdentityCache {
        async fn get(&self, user_id: UserId) -> AppResult<Option<ResolvedIdentity>> {
            Ok(self.entries.lock().await.get(&user_id).cloned())
        }

        async fn set(
            &self,
            user_id: UserId,
            identity: ResolvedIdentity,
            _ttl_seconds: u32,
        ) -> AppResult<()> {
            self.entries.lock().await.insert(user_id, identity);
            Ok(())
        }

        async fn invalidate(&self, user_id: UserId) -> AppResult<()> {
            self.entries.lock().await.remove(&user_id);
            self.invalidations.lock().await.push(user_id);
            Ok(())
        }
    }

    fn manager_assignment() -> RoleAssignment {
        RoleAssignment {
            role_id: RoleId::new(),
            role_name: "security_admin".to_owned(),
            level: AccessLevel::MANAGER,
            capabilities: vec![Capability::SecurityRoleManage],
            is_active: true,
            assigned_at: Utc::now(),
        }
    }

    fn service_with(
        assignments: HashMap<UserId, Vec<RoleAssignment>>,
        cache: Arc<FakeIdentityCache>,
    ) -> (SecurityAdminService, Arc<FakeAuditRepository>) {
        let identity_service = IdentityService::new(Arc::new(FakeIdentityRepository {
            assignments,
        }))
        .with_cache(cache, 60);
        let audit = Arc::new(FakeAuditRepository::default());
        let service = SecurityAdminService::new(
            identity_service,
            Arc::new(FakeSecurityAdminRepository::default()),
            Arc::new(FakeAuditLogRepository),
            audit.clone(),
        );

        (service, audit)
    }

    fn actor(user_id: UserId) -> UserIdentity {
        UserIdentity::new(user_id, "Admin", None)
    }

    #[tokio::test]
    async fn role_creation_requires_manage_capability() {
        let unprivileged = UserId::new();
        let (service, _) = service_with(HashMap::new(), Arc::new(FakeIdentityCache::default()));

        let result = service
            .create_role(
                &actor(unprivileged),
                CreateRoleInput {
                    name: "reviewer".to_owned(),
                    label: "Reviewer".to_owned(),
                    level: AccessLevel::EDITOR,
                    capabilities: vec![Capability::DocumentRead],
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn assignment_invalidates_the_target_identity_cache() {
        let admin = UserId::new();
        let target = UserId::new();
        let cache = Arc::new(FakeIdentityCache::default());
        let (service, audit) = service_with(
            HashMap::from([(admin, vec![manager_assignment()])]),
            cache.clone(),
        );

        let result = service.assign_role(&actor(admin), target, "editor").await;
        assert!(result.is_ok());

        assert_eq!(*cache.invalidations.lock().await, vec![target]);
        assert_eq!(audit.events.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn admin_access_satisfies_the_manage_gate() {
        let admin = UserId::new();
        let assignment = RoleAssignment {
            role_id: RoleId::new(),
            role_name: "administrator".to_owned(),
            level: AccessLevel::ADMINISTRATOR,
            capabilities: vec![Capability::AdminAccess],
            is_active: true,
            assigned_at: Utc::now(),
        };
        let (service, _) = service_with(
            HashMap::from([(admin, vec![assignment])]),
            Arc::new(FakeIdentityCache::default()),
        );

        let roles = service.list_roles(&actor(admin)).await;
        assert!(roles.is_ok());
    }
}
