//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod in_memory_document_repository;
mod in_memory_identity_cache;
mod postgres_audit_log_repository;
mod postgres_audit_repository;
mod postgres_document_history_repository;
mod postgres_document_repository;
mod postgres_identity_repository;
mod postgres_notification_repository;
mod postgres_security_admin_repository;
mod postgres_user_repository;

pub use argon2_password_hasher::Argon2PasswordHasher;
pub use in_memory_document_repository::InMemoryDocumentRepository;
pub use in_memory_identity_cache::InMemoryIdentityCache;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_document_history_repository::PostgresDocumentHistoryRepository;
pub use postgres_document_repository::PostgresDocumentRepository;
pub use postgres_identity_repository::PostgresIdentityRepository;
pub use postgres_notification_repository::PostgresNotificationRepository;
pub use postgres_security_admin_repository::PostgresSecurityAdminRepository;
pub use postgres_user_repository::PostgresUserRepository;
