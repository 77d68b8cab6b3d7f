use std::str::FromStr;

use chrono::{DateTime, Utc};
use docwell_core::{AppError, AppResult, DocumentId, NonEmptyString, UserId};
use serde::{Deserialize, Serialize};

use crate::workflow::TransitionEffects;

/// Lifecycle states a document moves through.
///
/// A document is never in an undefined status; transitions are only legal
/// along edges of the active transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// Initial state on creation; owner-editable.
    Draft,
    /// Under editorial review.
    InReview,
    /// Waiting for an approval decision.
    PendingApproval,
    /// Approved but not yet published.
    Approved,
    /// Published and generally visible.
    Published,
    /// Rejected during approval.
    Rejected,
    /// Archived and retired from circulation.
    Archived,
    /// Expired after publication.
    Expired,
}

impl DocumentStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::InReview => "IN_REVIEW",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Published => "PUBLISHED",
            Self::Rejected => "REJECTED",
            Self::Archived => "ARCHIVED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Returns all known statuses.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[DocumentStatus] = &[
            DocumentStatus::Draft,
            DocumentStatus::InReview,
            DocumentStatus::PendingApproval,
            DocumentStatus::Approved,
            DocumentStatus::Published,
            DocumentStatus::Rejected,
            DocumentStatus::Archived,
            DocumentStatus::Expired,
        ];

        ALL
    }

    /// Parses a transport value into a status.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

impl FromStr for DocumentStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DRAFT" => Ok(Self::Draft),
            "IN_REVIEW" => Ok(Self::InReview),
            "PENDING_APPROVAL" => Ok(Self::PendingApproval),
            "APPROVED" => Ok(Self::Approved),
            "PUBLISHED" => Ok(Self::Published),
            "REJECTED" => Ok(Self::Rejected),
            "ARCHIVED" => Ok(Self::Archived),
            "EXPIRED" => Ok(Self::Expired),
            _ => Err(AppError::Validation(format!(
                "unknown document status '{value}'"
            ))),
        }
    }
}

/// A managed document with its access-control relevant attributes.
///
/// File content, rendering, and comments live elsewhere; this entity carries
/// exactly what the lifecycle engine and visibility predicate decide over,
/// plus an optimistic-concurrency version guarding status writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    title: NonEmptyString,
    owner_id: UserId,
    status: DocumentStatus,
    is_public: bool,
    access_groups: Vec<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    updated_by: Option<UserId>,
    approved_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
}

/// Input payload used to construct a validated new document.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    /// Document title.
    pub title: String,
    /// Creating user; becomes the owner.
    pub owner_id: UserId,
    /// Whether the document is generally visible once published.
    pub is_public: bool,
    /// Organizational group names scoping explicit access.
    pub access_groups: Vec<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Stored document row as loaded from persistence.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    /// Stable document identifier.
    pub id: DocumentId,
    /// Document title.
    pub title: String,
    /// Owning user.
    pub owner_id: UserId,
    /// Current lifecycle status.
    pub status: DocumentStatus,
    /// Public visibility flag.
    pub is_public: bool,
    /// Organizational group scoping.
    pub access_groups: Vec<String>,
    /// Optimistic-concurrency version.
    pub version: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Last updating user, if any update happened.
    pub updated_by: Option<UserId>,
    /// Approving user, once approved.
    pub approved_by: Option<UserId>,
    /// Approval timestamp, once approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// Publication timestamp, once published.
    pub published_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Creates a new document in `Draft` owned by its creator.
    pub fn create(input: DocumentInput) -> AppResult<Self> {
        let DocumentInput {
            title,
            owner_id,
            is_public,
            access_groups,
            created_at,
        } = input;

        let access_groups = normalized_groups(access_groups)?;

        Ok(Self {
            id: DocumentId::new(),
            title: NonEmptyString::new(title)?,
            owner_id,
            status: DocumentStatus::Draft,
            is_public,
            access_groups,
            version: 1,
            created_at,
            updated_at: created_at,
            updated_by: None,
            approved_by: None,
            approved_at: None,
            published_at: None,
        })
    }

    /// Rehydrates a document from a stored record.
    pub fn from_record(record: DocumentRecord) -> AppResult<Self> {
        Ok(Self {
            id: record.id,
            title: NonEmptyString::new(record.title)?,
            owner_id: record.owner_id,
            status: record.status,
            is_public: record.is_public,
            access_groups: record.access_groups,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
            updated_by: record.updated_by,
            approved_by: record.approved_by,
            approved_at: record.approved_at,
            published_at: record.published_at,
        })
    }

    /// Returns the stable document identifier.
    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Returns the document title.
    #[must_use]
    pub fn title(&self) -> &NonEmptyString {
        &self.title
    }

    /// Returns the owning user.
    #[must_use]
    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    /// Returns the current lifecycle status.
    #[must_use]
    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    /// Returns whether the document is flagged public.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Returns the organizational groups scoping explicit access.
    #[must_use]
    pub fn access_groups(&self) -> &[String] {
        &self.access_groups
    }

    /// Returns the optimistic-concurrency version.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the last updating user.
    #[must_use]
    pub fn updated_by(&self) -> Option<UserId> {
        self.updated_by
    }

    /// Returns the approving user, once approved.
    #[must_use]
    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    /// Returns the approval timestamp, once approved.
    #[must_use]
    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    /// Returns the publication timestamp, once published.
    #[must_use]
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    /// Applies the stamp effects of an authorized transition, bumping the
    /// concurrency version.
    pub fn apply_effects(&mut self, effects: &TransitionEffects) {
        self.status = effects.to_status;
        self.updated_by = Some(effects.actor);
        self.updated_at = effects.at;
        self.version += 1;

        if effects.stamp_approval {
            self.approved_by = Some(effects.actor);
            self.approved_at = Some(effects.at);
        }

        if effects.stamp_publication {
            self.published_at = Some(effects.at);
            self.is_public = true;
        }
    }
}

fn normalized_groups(groups: Vec<String>) -> AppResult<Vec<String>> {
    let mut normalized = Vec::with_capacity(groups.len());
    for group in groups {
        let trimmed = group.trim().to_owned();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "access group names must not be empty".to_owned(),
            ));
        }
        if !normalized.contains(&trimmed) {
            normalized.push(trimmed);
        }
    }

    Ok(normalized)
}
