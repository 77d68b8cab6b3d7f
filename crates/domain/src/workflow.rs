use chrono::{DateTime, Utc};
use docwell_core::{AppError, AppResult, UserId};
use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::document::DocumentStatus;
use crate::role::{AccessLevel, ResolvedIdentity};

/// One configured, gated edge in the document status graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRule {
    /// Source status.
    pub from: DocumentStatus,
    /// Target status.
    pub to: DocumentStatus,
    /// Minimum authority level for the legacy level path.
    pub min_level: AccessLevel,
    /// Capability whose holders may take this edge regardless of level.
    pub required_capability: Option<Capability>,
    /// Human-readable edge description.
    pub description: String,
    /// Inactive rules deny for every caller.
    pub is_active: bool,
}

/// Which of the two independent authorization paths granted an edge.
///
/// Capability and level are alternatives, not a conjunction: satisfying
/// either one is sufficient, so the legacy level path stays usable while
/// capabilities roll out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum AccessPath {
    /// Granted by holding the rule's required capability.
    Capability {
        /// The capability that satisfied the rule.
        capability: Capability,
    },
    /// Granted by the caller's resolved level meeting the rule minimum.
    Level {
        /// The rule minimum that the caller's level met.
        min_level: AccessLevel,
    },
}

impl TransitionRule {
    /// Returns the path granting this edge to the identity, if any.
    ///
    /// Inactive rules grant nothing. The capability path is checked first
    /// and is sufficient by itself; the level path is the independent
    /// alternative.
    #[must_use]
    pub fn grant_path(&self, identity: &ResolvedIdentity) -> Option<AccessPath> {
        if !self.is_active {
            return None;
        }

        if let Some(capability) = self.required_capability
            && identity.has_capability(capability)
        {
            return Some(AccessPath::Capability { capability });
        }

        if identity.level() >= self.min_level {
            return Some(AccessPath::Level {
                min_level: self.min_level,
            });
        }

        None
    }

    /// Returns whether the identity may take this edge.
    #[must_use]
    pub fn permits(&self, identity: &ResolvedIdentity) -> bool {
        self.grant_path(identity).is_some()
    }
}

/// Structured rejection returned for a disallowed transition.
///
/// Carries the transitions actually available to the caller so the calling
/// layer can present actionable alternatives instead of a bare denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRejection {
    /// Status the document currently has.
    pub current_status: DocumentStatus,
    /// Status the caller attempted to move to.
    pub attempted_status: DocumentStatus,
    /// The caller's resolved authority level.
    pub user_level: AccessLevel,
    /// Full detail of every transition the caller could take instead.
    pub allowed: Vec<TransitionRule>,
}

/// The configured document status state machine.
///
/// Terminality is data-driven: a status with zero active outgoing edges is
/// terminal, with no explicit flag on the status itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    rules: Vec<TransitionRule>,
}

impl TransitionTable {
    /// Creates a validated transition table.
    ///
    /// Duplicate `(from, to)` pairs are a configuration error, never a
    /// runtime case to silently resolve.
    pub fn new(rules: Vec<TransitionRule>) -> AppResult<Self> {
        for (index, rule) in rules.iter().enumerate() {
            let duplicate = rules[..index]
                .iter()
                .any(|existing| existing.from == rule.from && existing.to == rule.to);
            if duplicate {
                return Err(AppError::Validation(format!(
                    "duplicate transition rule {} -> {}",
                    rule.from.as_str(),
                    rule.to.as_str()
                )));
            }
        }

        Ok(Self { rules })
    }

    /// Builds the standard production transition graph.
    #[must_use]
    pub fn standard() -> Self {
        use Capability::{DocumentApprove, DocumentArchive, DocumentPublish, DocumentUpdate};
        use DocumentStatus::{
            Approved, Archived, Draft, Expired, InReview, PendingApproval, Published, Rejected,
        };

        let edge = |from, to, min_level, capability, description: &str| TransitionRule {
            from,
            to,
            min_level,
            required_capability: Some(capability),
            description: description.to_owned(),
            is_active: true,
        };

        // The static graph has no duplicate (from, to) pairs.
        Self {
            rules: vec![
                edge(
                    Draft,
                    InReview,
                    AccessLevel::EDITOR,
                    DocumentUpdate,
                    "Submit for review",
                ),
                edge(
                    InReview,
                    Draft,
                    AccessLevel::EDITOR,
                    DocumentUpdate,
                    "Return to draft",
                ),
                edge(
                    InReview,
                    PendingApproval,
                    AccessLevel::EDITOR,
                    DocumentUpdate,
                    "Request approval",
                ),
                edge(
                    PendingApproval,
                    InReview,
                    AccessLevel::EDITOR,
                    DocumentUpdate,
                    "Return for changes",
                ),
                edge(
                    PendingApproval,
                    Approved,
                    AccessLevel::MANAGER,
                    DocumentApprove,
                    "Approve",
                ),
                edge(
                    PendingApproval,
                    Rejected,
                    AccessLevel::MANAGER,
                    DocumentApprove,
                    "Reject",
                ),
                edge(
                    Approved,
                    Published,
                    AccessLevel::MANAGER,
                    DocumentPublish,
                    "Publish",
                ),
                edge(
                    Approved,
                    Archived,
                    AccessLevel::MANAGER,
                    DocumentArchive,
                    "Archive without publishing",
                ),
                edge(
                    Published,
                    Archived,
                    AccessLevel::MANAGER,
                    DocumentArchive,
                    "Archive",
                ),
                edge(
                    Published,
                    Expired,
                    AccessLevel::MANAGER,
                    DocumentArchive,
                    "Expire",
                ),
                edge(
                    Rejected,
                    Draft,
                    AccessLevel::EDITOR,
                    DocumentUpdate,
                    "Rework",
                ),
            ],
        }
    }

    /// Returns the configured rule for an edge, active or not.
    #[must_use]
    pub fn rule_for(&self, from: DocumentStatus, to: DocumentStatus) -> Option<&TransitionRule> {
        self.rules
            .iter()
            .find(|rule| rule.from == from && rule.to == to)
    }

    /// Returns all configured rules.
    #[must_use]
    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    /// Returns whether the identity may move a document along the edge.
    #[must_use]
    pub fn is_transition_allowed(
        &self,
        from: DocumentStatus,
        to: DocumentStatus,
        identity: &ResolvedIdentity,
    ) -> bool {
        self.rule_for(from, to)
            .is_some_and(|rule| rule.permits(identity))
    }

    /// Authorizes an edge for the identity, or explains the denial.
    ///
    /// A missing or inactive rule denies for every caller; the rejection
    /// always lists the transitions the caller could take instead.
    pub fn authorize(
        &self,
        from: DocumentStatus,
        to: DocumentStatus,
        identity: &ResolvedIdentity,
    ) -> Result<&TransitionRule, TransitionRejection> {
        if let Some(rule) = self.rule_for(from, to)
            && rule.permits(identity)
        {
            return Ok(rule);
        }

        Err(TransitionRejection {
            current_status: from,
            attempted_status: to,
            user_level: identity.level(),
            allowed: self
                .allowed_transitions(from, identity)
                .into_iter()
                .cloned()
                .collect(),
        })
    }

    /// Returns the full detail of every edge the identity may take from a
    /// status.
    #[must_use]
    pub fn allowed_transitions(
        &self,
        from: DocumentStatus,
        identity: &ResolvedIdentity,
    ) -> Vec<&TransitionRule> {
        self.rules
            .iter()
            .filter(|rule| rule.from == from && rule.permits(identity))
            .collect()
    }

    /// Returns whether a status has zero active outgoing edges.
    #[must_use]
    pub fn is_terminal(&self, status: DocumentStatus) -> bool {
        !self
            .rules
            .iter()
            .any(|rule| rule.from == status && rule.is_active)
    }
}

/// Deterministic stamp effects of an authorized transition.
///
/// Stamps are a function of the target status only, independent of the
/// source: every transition stamps `updated_by`/`updated_at`; moving to
/// `Approved` also stamps the approval pair; moving to `Published` also
/// stamps `published_at` and forces the public flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEffects {
    /// Target status being applied.
    pub to_status: DocumentStatus,
    /// User applying the transition.
    pub actor: UserId,
    /// Timestamp of the change.
    pub at: DateTime<Utc>,
    /// Whether to stamp `approved_by`/`approved_at`.
    pub stamp_approval: bool,
    /// Whether to stamp `published_at` and force `is_public`.
    pub stamp_publication: bool,
}

impl TransitionEffects {
    /// Computes the stamps for a move to the target status.
    #[must_use]
    pub fn for_target(to: DocumentStatus, actor: UserId, at: DateTime<Utc>) -> Self {
        Self {
            to_status: to,
            actor,
            at,
            stamp_approval: to == DocumentStatus::Approved,
            stamp_publication: to == DocumentStatus::Published,
        }
    }
}
