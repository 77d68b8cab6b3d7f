use std::collections::BTreeSet;

use docwell_core::UserId;
use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilitySet};
use crate::document::{Document, DocumentStatus};
use crate::role::{AccessLevel, ResolvedIdentity};

/// Everything the visibility predicate needs to know about a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    user_id: UserId,
    level: AccessLevel,
    capabilities: CapabilitySet,
    groups: BTreeSet<String>,
}

impl ViewerContext {
    /// Builds a viewer context from a resolved identity and the viewer's
    /// organizational group memberships.
    #[must_use]
    pub fn new(identity: &ResolvedIdentity, groups: impl IntoIterator<Item = String>) -> Self {
        Self {
            user_id: identity.user_id(),
            level: identity.level(),
            capabilities: identity.capabilities().clone(),
            groups: groups.into_iter().collect(),
        }
    }

    /// Builds a viewer context directly from parts.
    #[must_use]
    pub fn from_parts(
        user_id: UserId,
        level: AccessLevel,
        capabilities: CapabilitySet,
        groups: BTreeSet<String>,
    ) -> Self {
        Self {
            user_id,
            level,
            capabilities,
            groups,
        }
    }

    /// Returns the viewing user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the viewer's resolved authority level.
    #[must_use]
    pub fn level(&self) -> AccessLevel {
        self.level
    }

    /// Returns the viewer's resolved capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Returns the viewer's organizational groups.
    #[must_use]
    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    fn in_any_group(&self, document_groups: &[String]) -> bool {
        document_groups
            .iter()
            .any(|group| self.groups.contains(group))
    }
}

/// Returns the visibility floor for a status.
///
/// This ladder is independent of the transition table's minimum levels;
/// the two are configured separately and are not forced to stay aligned.
#[must_use]
pub fn status_floor(status: DocumentStatus) -> AccessLevel {
    match status {
        DocumentStatus::Draft
        | DocumentStatus::InReview
        | DocumentStatus::Rejected
        | DocumentStatus::Archived
        | DocumentStatus::Expired => AccessLevel::EDITOR,
        DocumentStatus::PendingApproval => AccessLevel::MANAGER,
        DocumentStatus::Approved | DocumentStatus::Published => AccessLevel::READER,
    }
}

/// Status sub-check applied after a visibility gate passes.
///
/// Below the reader floor, only published-and-public remains visible.
#[must_use]
pub fn status_visible(level: AccessLevel, status: DocumentStatus, is_public: bool) -> bool {
    level >= status_floor(status) || (status == DocumentStatus::Published && is_public)
}

/// Decides whether a viewer may see a document.
///
/// Evaluated as an ordered short-circuit chain; the first gate that passes
/// hands off to the status sub-check (or allows outright), and falling
/// through every gate denies.
#[must_use]
pub fn can_view(viewer: &ViewerContext, document: &Document) -> bool {
    // 1. Full document access: ADMIN_ACCESS or the legacy bundle sees
    //    everything, status sub-check included.
    if viewer.capabilities.has_full_document_access() {
        return true;
    }

    // 2. Ownership, regardless of status or group.
    if document.owner_id() == viewer.user_id {
        return true;
    }

    // 3. Explicit group scoping. Non-members at manager level may still see
    //    near-final content, never drafts.
    if !document.access_groups().is_empty() {
        if viewer.in_any_group(document.access_groups()) {
            return status_visible(viewer.level, document.status(), document.is_public());
        }

        return viewer.level >= AccessLevel::MANAGER
            && matches!(
                document.status(),
                DocumentStatus::Approved | DocumentStatus::Published
            );
    }

    // 4. Unscoped public documents.
    if document.is_public() {
        return status_visible(viewer.level, document.status(), document.is_public());
    }

    // 5. Unscoped private documents need editor level or an explicit read
    //    capability before the status sub-check applies.
    if viewer.level >= AccessLevel::EDITOR || viewer.capabilities.grants(Capability::DocumentRead) {
        return status_visible(viewer.level, document.status(), document.is_public());
    }

    false
}

/// Status sub-check in declarative form, with the viewer's level baked in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusGate {
    /// Statuses whose floor the viewer's level meets.
    pub visible_statuses: BTreeSet<DocumentStatus>,
}

impl StatusGate {
    /// Builds the gate for a viewer level.
    #[must_use]
    pub fn for_level(level: AccessLevel) -> Self {
        Self {
            visible_statuses: DocumentStatus::all()
                .iter()
                .copied()
                .filter(|status| level >= status_floor(*status))
                .collect(),
        }
    }

    /// Evaluates the gate against a document's status and public flag.
    #[must_use]
    pub fn matches(&self, status: DocumentStatus, is_public: bool) -> bool {
        self.visible_statuses.contains(&status)
            || (status == DocumentStatus::Published && is_public)
    }
}

/// One disjunct of the declarative visibility filter.
///
/// Viewer attributes are baked in at construction; every clause constrains
/// document attributes only, so a storage adapter can translate the clause
/// list into a single native query predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisibilityClause {
    /// The viewer owns the document.
    Owner {
        /// Owning user to match.
        user_id: UserId,
    },
    /// The document is scoped to a group the viewer belongs to, and the
    /// status sub-check passes.
    GroupMember {
        /// The viewer's groups; matches on any intersection.
        groups: BTreeSet<String>,
        /// Status sub-check conjoined with the membership test.
        gate: StatusGate,
    },
    /// The document is scoped to groups the viewer does not belong to, but
    /// the viewer's level allows peeking at near-final content.
    GroupOutsiderPeek {
        /// The viewer's groups; matches when the intersection is empty.
        groups: BTreeSet<String>,
    },
    /// The document is unscoped and public, and the sub-check passes.
    PublicUnscoped {
        /// Status sub-check conjoined with the public test.
        gate: StatusGate,
    },
    /// The document is unscoped and private; the viewer qualified for
    /// private access and the sub-check passes.
    PrivateUnscoped {
        /// Status sub-check conjoined with the private test.
        gate: StatusGate,
    },
}

impl VisibilityClause {
    /// Evaluates this clause against one document.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::Owner { user_id } => document.owner_id() == *user_id,
            Self::GroupMember { groups, gate } => {
                !document.access_groups().is_empty()
                    && document
                        .access_groups()
                        .iter()
                        .any(|group| groups.contains(group))
                    && gate.matches(document.status(), document.is_public())
            }
            Self::GroupOutsiderPeek { groups } => {
                !document.access_groups().is_empty()
                    && !document
                        .access_groups()
                        .iter()
                        .any(|group| groups.contains(group))
                    && matches!(
                        document.status(),
                        DocumentStatus::Approved | DocumentStatus::Published
                    )
            }
            Self::PublicUnscoped { gate } => {
                document.access_groups().is_empty()
                    && document.is_public()
                    && gate.matches(document.status(), document.is_public())
            }
            Self::PrivateUnscoped { gate } => {
                document.access_groups().is_empty()
                    && !document.is_public()
                    && gate.matches(document.status(), document.is_public())
            }
        }
    }
}

/// Declarative form of the visibility predicate for bulk listing queries.
///
/// A disjunction of clauses mirroring the row-by-row chain; the two
/// representations are kept equivalent by property tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisibilityFilter {
    /// No restriction: the viewer holds full document access.
    All,
    /// The viewer sees rows matching any clause.
    Any(Vec<VisibilityClause>),
}

impl VisibilityFilter {
    /// Builds the filter for a viewer.
    #[must_use]
    pub fn for_viewer(viewer: &ViewerContext) -> Self {
        if viewer.capabilities.has_full_document_access() {
            return Self::All;
        }

        let gate = StatusGate::for_level(viewer.level);
        let mut clauses = vec![
            VisibilityClause::Owner {
                user_id: viewer.user_id,
            },
            VisibilityClause::GroupMember {
                groups: viewer.groups.clone(),
                gate: gate.clone(),
            },
            VisibilityClause::PublicUnscoped { gate: gate.clone() },
        ];

        if viewer.level >= AccessLevel::MANAGER {
            clauses.push(VisibilityClause::GroupOutsiderPeek {
                groups: viewer.groups.clone(),
            });
        }

        if viewer.level >= AccessLevel::EDITOR
            || viewer.capabilities.grants(Capability::DocumentRead)
        {
            clauses.push(VisibilityClause::PrivateUnscoped { gate });
        }

        Self::Any(clauses)
    }

    /// Evaluates the filter against one document.
    ///
    /// Storage adapters translate the clause list instead of calling this;
    /// in-memory listing uses it directly.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Any(clauses) => clauses.iter().any(|clause| clause.matches(document)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use docwell_core::UserId;

    use super::{ViewerContext, VisibilityFilter, can_view, status_visible};
    use crate::capability::{Capability, CapabilitySet};
    use crate::document::{Document, DocumentInput, DocumentStatus};
    use crate::role::AccessLevel;
    use crate::workflow::TransitionEffects;

    fn viewer(level: u8, capabilities: Vec<Capability>, groups: &[&str]) -> ViewerContext {
        ViewerContext::from_parts(
            UserId::new(),
            AccessLevel::new(level).unwrap_or(AccessLevel::NONE),
            CapabilitySet::from_iter(capabilities),
            groups.iter().map(|group| (*group).to_owned()).collect(),
        )
    }

    fn document(
        owner: UserId,
        status: DocumentStatus,
        is_public: bool,
        groups: &[&str],
    ) -> Document {
        let created = match Document::create(DocumentInput {
            title: "Handbook".to_owned(),
            owner_id: owner,
            is_public,
            access_groups: groups.iter().map(|group| (*group).to_owned()).collect(),
            created_at: Utc::now(),
        }) {
            Ok(document) => document,
            Err(error) => panic!("document construction failed: {error}"),
        };

        // Force the target status without walking the graph; visibility is
        // independent of how the document got there.
        let mut document = created;
        if status != DocumentStatus::Draft {
            let mut effects = TransitionEffects::for_target(status, owner, Utc::now());
            effects.stamp_publication = false;
            document.apply_effects(&effects);
        }
        document
    }

    #[test]
    fn owner_sees_own_draft() {
        let owner = UserId::new();
        let doc = document(owner, DocumentStatus::Draft, false, &[]);

        let context = ViewerContext::from_parts(
            owner,
            AccessLevel::NONE,
            CapabilitySet::new(),
            BTreeSet::new(),
        );
        assert!(can_view(&context, &doc));
    }

    #[test]
    fn low_level_stranger_cannot_see_private_draft() {
        let doc = document(UserId::new(), DocumentStatus::Draft, false, &[]);
        assert!(!can_view(&viewer(10, Vec::new(), &[]), &doc));
    }

    #[test]
    fn editor_level_stranger_sees_private_draft() {
        let doc = document(UserId::new(), DocumentStatus::Draft, false, &[]);
        assert!(can_view(&viewer(50, Vec::new(), &[]), &doc));
    }

    #[test]
    fn guest_sees_published_public_document() {
        let doc = document(UserId::new(), DocumentStatus::Published, true, &[]);
        assert!(can_view(&viewer(0, Vec::new(), &[]), &doc));
        assert!(can_view(&viewer(10, Vec::new(), &[]), &doc));
    }

    #[test]
    fn guest_cannot_see_published_private_document() {
        let doc = document(UserId::new(), DocumentStatus::Published, false, &[]);
        assert!(!can_view(&viewer(0, Vec::new(), &[]), &doc));
    }

    #[test]
    fn group_member_sees_approved_content() {
        let doc = document(UserId::new(), DocumentStatus::Approved, false, &["finance"]);
        assert!(can_view(&viewer(10, Vec::new(), &["finance"]), &doc));
    }

    #[test]
    fn group_member_still_needs_status_floor_for_drafts() {
        let doc = document(UserId::new(), DocumentStatus::Draft, false, &["finance"]);
        assert!(!can_view(&viewer(10, Vec::new(), &["finance"]), &doc));
        assert!(can_view(&viewer(50, Vec::new(), &["finance"]), &doc));
    }

    #[test]
    fn manager_outside_group_peeks_at_near_final_only() {
        let approved = document(UserId::new(), DocumentStatus::Approved, false, &["legal"]);
        let draft = document(UserId::new(), DocumentStatus::Draft, false, &["legal"]);

        let manager = viewer(70, Vec::new(), &["finance"]);
        assert!(can_view(&manager, &approved));
        assert!(!can_view(&manager, &draft));

        let editor = viewer(50, Vec::new(), &["finance"]);
        assert!(!can_view(&editor, &approved));
    }

    #[test]
    fn read_capability_substitutes_for_private_level_gate() {
        let doc = document(UserId::new(), DocumentStatus::Published, false, &[]);
        assert!(can_view(
            &viewer(10, vec![Capability::DocumentRead], &[]),
            &doc
        ));
    }

    #[test]
    fn full_bundle_bypasses_every_gate() {
        let doc = document(UserId::new(), DocumentStatus::Draft, false, &["legal"]);
        let bundled = viewer(
            0,
            vec![
                Capability::DocumentCreate,
                Capability::DocumentRead,
                Capability::DocumentUpdate,
                Capability::DocumentApprove,
            ],
            &[],
        );
        assert!(can_view(&bundled, &doc));
    }

    #[test]
    fn pending_approval_needs_manager_floor() {
        let doc = document(UserId::new(), DocumentStatus::PendingApproval, true, &[]);
        assert!(!can_view(&viewer(50, Vec::new(), &[]), &doc));
        assert!(can_view(&viewer(70, Vec::new(), &[]), &doc));
    }

    #[test]
    fn sub_check_floors_match_ladder() {
        assert!(!status_visible(
            AccessLevel::READER,
            DocumentStatus::Draft,
            false
        ));
        assert!(status_visible(
            AccessLevel::EDITOR,
            DocumentStatus::Draft,
            false
        ));
        assert!(status_visible(
            AccessLevel::NONE,
            DocumentStatus::Published,
            true
        ));
        assert!(!status_visible(
            AccessLevel::NONE,
            DocumentStatus::Published,
            false
        ));
    }

    #[test]
    fn filter_matches_predicate_on_fixed_cases() {
        let owner = UserId::new();
        let documents = vec![
            document(owner, DocumentStatus::Draft, false, &[]),
            document(UserId::new(), DocumentStatus::Published, true, &[]),
            document(UserId::new(), DocumentStatus::Approved, false, &["legal"]),
            document(UserId::new(), DocumentStatus::Draft, false, &["legal"]),
            document(UserId::new(), DocumentStatus::PendingApproval, true, &[]),
        ];

        for context in [
            viewer(0, Vec::new(), &[]),
            viewer(10, Vec::new(), &["legal"]),
            viewer(50, Vec::new(), &[]),
            viewer(70, Vec::new(), &["finance"]),
            viewer(100, vec![Capability::AdminAccess], &[]),
        ] {
            let filter = VisibilityFilter::for_viewer(&context);
            for doc in &documents {
                assert_eq!(
                    can_view(&context, doc),
                    filter.matches(doc),
                    "diverged for level {} on {:?}",
                    context.level(),
                    doc.status()
                );
            }
        }
    }
}
