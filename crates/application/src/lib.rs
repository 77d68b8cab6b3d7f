//! Application services and ports for the Docwell engine.

#![forbid(unsafe_code)]

mod audit;
mod document_service;
mod identity_service;
mod security_admin_service;
mod user_service;

pub use audit::{AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository};
pub use document_service::{
    CreateDocumentInput, DocumentHistoryEntry, DocumentHistoryRepository, DocumentNotification,
    DocumentPage, DocumentRepository, DocumentService, NotificationRepository, StatusChangeOutcome,
    StatusWrite,
};
pub use identity_service::{IdentityCache, IdentityRepository, IdentityService};
pub use security_admin_service::{
    CreateRoleInput, RoleAssignmentRecord, RoleDefinition, SecurityAdminRepository,
    SecurityAdminService,
};
pub use user_service::{NewUserInput, PasswordHasher, UserAccount, UserRepository, UserService};
