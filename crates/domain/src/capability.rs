use std::collections::BTreeSet;
use std::str::FromStr;

use docwell_core::AppError;
use serde::{Deserialize, Serialize};

/// Functional grouping of capability atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityCategory {
    /// Document lifecycle capabilities.
    Document,
    /// Security administration capabilities.
    Security,
    /// Global administrative capabilities.
    Admin,
}

/// Atomic permission grants assignable to roles.
///
/// Capabilities are never hierarchical among themselves; any hierarchy is
/// expressed through which roles hold which capabilities, or through the
/// single `ADMIN_ACCESS` super-capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    /// Allows creating documents.
    DocumentCreate,
    /// Allows reading documents outside the caller's own scope.
    DocumentRead,
    /// Allows editing documents and moving them through editorial states.
    DocumentUpdate,
    /// Allows deleting documents.
    DocumentDelete,
    /// Allows approving or rejecting documents pending approval.
    DocumentApprove,
    /// Allows publishing approved documents.
    DocumentPublish,
    /// Allows archiving or expiring documents.
    DocumentArchive,
    /// Allows managing roles, capability grants, and assignments.
    SecurityRoleManage,
    /// Allows reading the audit log.
    SecurityAuditRead,
    /// Global override: a holder is treated as having every capability.
    AdminAccess,
}

impl Capability {
    /// Returns a stable storage value for this capability.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentCreate => "DOCUMENT_CREATE",
            Self::DocumentRead => "DOCUMENT_READ",
            Self::DocumentUpdate => "DOCUMENT_UPDATE",
            Self::DocumentDelete => "DOCUMENT_DELETE",
            Self::DocumentApprove => "DOCUMENT_APPROVE",
            Self::DocumentPublish => "DOCUMENT_PUBLISH",
            Self::DocumentArchive => "DOCUMENT_ARCHIVE",
            Self::SecurityRoleManage => "SECURITY_ROLE_MANAGE",
            Self::SecurityAuditRead => "SECURITY_AUDIT_READ",
            Self::AdminAccess => "ADMIN_ACCESS",
        }
    }

    /// Returns the functional category of this capability.
    #[must_use]
    pub fn category(&self) -> CapabilityCategory {
        match self {
            Self::DocumentCreate
            | Self::DocumentRead
            | Self::DocumentUpdate
            | Self::DocumentDelete
            | Self::DocumentApprove
            | Self::DocumentPublish
            | Self::DocumentArchive => CapabilityCategory::Document,
            Self::SecurityRoleManage | Self::SecurityAuditRead => CapabilityCategory::Security,
            Self::AdminAccess => CapabilityCategory::Admin,
        }
    }

    /// Returns all known capabilities.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Capability] = &[
            Capability::DocumentCreate,
            Capability::DocumentRead,
            Capability::DocumentUpdate,
            Capability::DocumentDelete,
            Capability::DocumentApprove,
            Capability::DocumentPublish,
            Capability::DocumentArchive,
            Capability::SecurityRoleManage,
            Capability::SecurityAuditRead,
            Capability::AdminAccess,
        ];

        ALL
    }

    /// Parses a transport value into a capability.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

impl FromStr for Capability {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DOCUMENT_CREATE" => Ok(Self::DocumentCreate),
            "DOCUMENT_READ" => Ok(Self::DocumentRead),
            "DOCUMENT_UPDATE" => Ok(Self::DocumentUpdate),
            "DOCUMENT_DELETE" => Ok(Self::DocumentDelete),
            "DOCUMENT_APPROVE" => Ok(Self::DocumentApprove),
            "DOCUMENT_PUBLISH" => Ok(Self::DocumentPublish),
            "DOCUMENT_ARCHIVE" => Ok(Self::DocumentArchive),
            "SECURITY_ROLE_MANAGE" => Ok(Self::SecurityRoleManage),
            "SECURITY_AUDIT_READ" => Ok(Self::SecurityAuditRead),
            "ADMIN_ACCESS" => Ok(Self::AdminAccess),
            _ => Err(AppError::Validation(format!(
                "unknown capability value '{value}'"
            ))),
        }
    }
}

/// Immutable set of capabilities resolved for one identity.
///
/// The `ADMIN_ACCESS` override lives here and nowhere else: every check in
/// the engine goes through [`CapabilitySet::grants`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the set literally contains the capability.
    #[must_use]
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Returns true when the capability is granted, including the
    /// `ADMIN_ACCESS` global override.
    #[must_use]
    pub fn grants(&self, capability: Capability) -> bool {
        self.contains(Capability::AdminAccess) || self.contains(capability)
    }

    /// Returns true when the holder has the legacy full-document-access
    /// bundle: `ADMIN_ACCESS`, or create+read+update+approve held together.
    #[must_use]
    pub fn has_full_document_access(&self) -> bool {
        self.contains(Capability::AdminAccess)
            || (self.contains(Capability::DocumentCreate)
                && self.contains(Capability::DocumentRead)
                && self.contains(Capability::DocumentUpdate)
                && self.contains(Capability::DocumentApprove))
    }

    /// Merges another set into this one.
    pub fn extend(&mut self, other: impl IntoIterator<Item = Capability>) {
        self.0.extend(other);
    }

    /// Returns true when no capability is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates held capabilities in stable order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a document is created.
    DocumentCreated,
    /// Emitted when a document status transition is applied.
    DocumentStatusChanged,
    /// Emitted when a custom role is created.
    SecurityRoleCreated,
    /// Emitted when a role is assigned to a user.
    SecurityRoleAssigned,
    /// Emitted when a role is removed from a user.
    SecurityRoleUnassigned,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentCreated => "document.created",
            Self::DocumentStatusChanged => "document.status_changed",
            Self::SecurityRoleCreated => "security.role.created",
            Self::SecurityRoleAssigned => "security.role.assigned",
            Self::SecurityRoleUnassigned => "security.role.unassigned",
        }
    }
}
