use docwell_application::{AuditLogEntry, RoleAssignmentRecord, RoleDefinition};
use docwell_core::UserIdentity;
use docwell_domain::{
    AccessLevel, Capability, Document, ResolvedIdentity, TransitionRejection, TransitionRule,
};
use serde::{Deserialize, Serialize};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Incoming login payload.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Incoming bootstrap payload for the first administrator account.
#[derive(Debug, Deserialize)]
pub struct BootstrapRequest {
    pub token: String,
    pub email: String,
    pub display_name: String,
    pub password: String,
}

/// API representation of the authenticated user with resolved authority.
#[derive(Debug, Serialize)]
pub struct UserIdentityResponse {
    pub user_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub level: u8,
    pub capabilities: Vec<String>,
    pub current_role: Option<String>,
}

impl UserIdentityResponse {
    pub fn from_identity(identity: UserIdentity, resolved: &ResolvedIdentity) -> Self {
        Self {
            user_id: identity.user_id().to_string(),
            display_name: identity.display_name().to_owned(),
            email: identity.email().map(str::to_owned),
            level: resolved.level().value(),
            capabilities: resolved
                .capabilities()
                .iter()
                .map(|capability| capability.as_str().to_owned())
                .collect(),
            current_role: resolved.current_role().map(|role| role.name.clone()),
        }
    }
}

/// Incoming payload for document creation.
#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub access_groups: Vec<String>,
}

/// Incoming payload for a status change.
#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

/// Listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// API representation of a document.
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub title: String,
    pub owner_id: String,
    pub status: String,
    pub is_public: bool,
    pub access_groups: Vec<String>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    pub approved_by: Option<String>,
    pub approved_at: Option<String>,
    pub published_at: Option<String>,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            id: document.id().to_string(),
            title: document.title().as_str().to_owned(),
            owner_id: document.owner_id().to_string(),
            status: document.status().as_str().to_owned(),
            is_public: document.is_public(),
            access_groups: document.access_groups().to_vec(),
            version: document.version(),
            created_at: document.created_at().to_rfc3339(),
            updated_at: document.updated_at().to_rfc3339(),
            approved_by: document.approved_by().map(|user| user.to_string()),
            approved_at: document.approved_at().map(|at| at.to_rfc3339()),
            published_at: document.published_at().map(|at| at.to_rfc3339()),
        }
    }
}

/// API representation of one transition rule.
#[derive(Debug, Serialize)]
pub struct TransitionRuleResponse {
    pub from: String,
    pub to: String,
    pub min_level: u8,
    pub required_capability: Option<String>,
    pub description: String,
}

impl From<&TransitionRule> for TransitionRuleResponse {
    fn from(rule: &TransitionRule) -> Self {
        Self {
            from: rule.from.as_str().to_owned(),
            to: rule.to.as_str().to_owned(),
            min_level: rule.min_level.value(),
            required_capability: rule
                .required_capability
                .map(|capability| capability.as_str().to_owned()),
            description: rule.description.clone(),
        }
    }
}

/// API representation of a rejected status change with alternatives.
#[derive(Debug, Serialize)]
pub struct TransitionRejectionResponse {
    pub current_status: String,
    pub attempted_status: String,
    pub user_level: u8,
    pub allowed_transitions: Vec<TransitionRuleResponse>,
}

impl From<TransitionRejection> for TransitionRejectionResponse {
    fn from(rejection: TransitionRejection) -> Self {
        Self {
            current_status: rejection.current_status.as_str().to_owned(),
            attempted_status: rejection.attempted_status.as_str().to_owned(),
            user_level: rejection.user_level.value(),
            allowed_transitions: rejection
                .allowed
                .iter()
                .map(TransitionRuleResponse::from)
                .collect(),
        }
    }
}

/// Incoming payload for custom role creation.
#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub label: String,
    pub level: u8,
    pub capabilities: Vec<String>,
}

impl CreateRoleRequest {
    pub fn parsed_capabilities(&self) -> Result<Vec<Capability>, docwell_core::AppError> {
        self.capabilities
            .iter()
            .map(|value| Capability::from_transport(value.as_str()))
            .collect()
    }

    pub fn parsed_level(&self) -> Result<AccessLevel, docwell_core::AppError> {
        AccessLevel::new(self.level)
    }
}

/// API representation of a role.
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role_id: String,
    pub name: String,
    pub label: String,
    pub level: u8,
    pub is_system: bool,
    pub capabilities: Vec<String>,
}

impl From<RoleDefinition> for RoleResponse {
    fn from(role: RoleDefinition) -> Self {
        Self {
            role_id: role.role_id.to_string(),
            name: role.name,
            label: role.label,
            level: role.level.value(),
            is_system: role.is_system,
            capabilities: role
                .capabilities
                .iter()
                .map(|capability| capability.as_str().to_owned())
                .collect(),
        }
    }
}

/// Incoming payload for role assignment.
#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: String,
    pub role_name: String,
}

/// API representation of a role assignment.
#[derive(Debug, Serialize)]
pub struct RoleAssignmentResponse {
    pub user_id: String,
    pub role_id: String,
    pub role_name: String,
    pub is_active: bool,
    pub assigned_at: String,
}

impl From<RoleAssignmentRecord> for RoleAssignmentResponse {
    fn from(record: RoleAssignmentRecord) -> Self {
        Self {
            user_id: record.user_id.to_string(),
            role_id: record.role_id.to_string(),
            role_name: record.role_name,
            is_active: record.is_active,
            assigned_at: record.assigned_at.to_rfc3339(),
        }
    }
}

/// API representation of one audit log entry.
#[derive(Debug, Serialize)]
pub struct AuditLogEntryResponse {
    pub event_id: String,
    pub actor: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub detail: Option<String>,
    pub created_at: String,
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(entry: AuditLogEntry) -> Self {
        Self {
            event_id: entry.event_id,
            actor: entry.actor.to_string(),
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            detail: entry.detail,
            created_at: entry.created_at,
        }
    }
}

/// Audit log query parameters.
#[derive(Debug, Deserialize)]
pub struct AuditLogQueryParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub action: Option<String>,
}
