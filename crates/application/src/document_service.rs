use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docwell_core::{AppError, AppResult, DocumentId, UserId, UserIdentity};
use docwell_domain::{
    AccessLevel, AuditAction, Capability, Document, DocumentInput, DocumentStatus,
    TransitionEffects, TransitionRejection, TransitionRule, TransitionTable, VisibilityFilter,
    can_view,
};
use tracing::warn;

use crate::{AuditEvent, AuditRepository, IdentityService};

/// Pagination window for document listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentPage {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped.
    pub offset: usize,
}

/// Atomic status write: transition check outcome applied under a version
/// guard so two concurrent transitions can never both succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWrite {
    /// Target document.
    pub document_id: DocumentId,
    /// Version the caller read before authorizing; a mismatch is a conflict.
    pub expected_version: i64,
    /// Stamps to apply together with the status.
    pub effects: TransitionEffects,
}

/// Repository port for document rows.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Persists a new document.
    async fn insert(&self, document: &Document) -> AppResult<()>;

    /// Loads one document by id.
    async fn find_by_id(&self, document_id: DocumentId) -> AppResult<Option<Document>>;

    /// Applies a status change atomically under the version guard.
    ///
    /// Returns `Conflict` when the stored version differs from
    /// `expected_version`, leaving the row untouched.
    async fn apply_status_write(&self, write: StatusWrite) -> AppResult<Document>;

    /// Lists documents matching the visibility filter, newest first.
    async fn list_visible(
        &self,
        filter: &VisibilityFilter,
        page: DocumentPage,
    ) -> AppResult<Vec<Document>>;
}

/// One row of a document's status history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHistoryEntry {
    /// Document the entry belongs to.
    pub document_id: DocumentId,
    /// Status before the change.
    pub from_status: DocumentStatus,
    /// Status after the change.
    pub to_status: DocumentStatus,
    /// User who applied the change.
    pub changed_by: UserId,
    /// Rule description captured for display.
    pub description: String,
    /// Change timestamp.
    pub changed_at: DateTime<Utc>,
}

/// Repository port for the append-only status history.
#[async_trait]
pub trait DocumentHistoryRepository: Send + Sync {
    /// Appends one history entry.
    async fn append(&self, entry: DocumentHistoryEntry) -> AppResult<()>;
}

/// Notification row written for a document's owner after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNotification {
    /// Receiving user.
    pub recipient: UserId,
    /// Document the notification refers to.
    pub document_id: DocumentId,
    /// Human-readable notification text.
    pub message: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Repository port for owner notifications.
///
/// Rows only; delivery is somebody else's concern.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Records one notification.
    async fn notify(&self, notification: DocumentNotification) -> AppResult<()>;
}

/// Input payload for document creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDocumentInput {
    /// Document title.
    pub title: String,
    /// Whether the document is generally visible once published.
    pub is_public: bool,
    /// Organizational group names scoping explicit access.
    pub access_groups: Vec<String>,
}

/// Outcome of a status-change request.
///
/// A denial is an expected, frequent outcome and carries the full list of
/// transitions actually available to the caller, never a bare refusal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChangeOutcome {
    /// The transition was authorized and applied.
    Applied(Document),
    /// The transition was rejected; alternatives are listed.
    Denied(TransitionRejection),
}

/// Application service for document use-cases.
#[derive(Clone)]
pub struct DocumentService {
    identity_service: IdentityService,
    repository: Arc<dyn DocumentRepository>,
    history_repository: Arc<dyn DocumentHistoryRepository>,
    notification_repository: Arc<dyn NotificationRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    transitions: Arc<TransitionTable>,
}

impl DocumentService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        identity_service: IdentityService,
        repository: Arc<dyn DocumentRepository>,
        history_repository: Arc<dyn DocumentHistoryRepository>,
        notification_repository: Arc<dyn NotificationRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        transitions: Arc<TransitionTable>,
    ) -> Self {
        Self {
            identity_service,
            repository,
            history_repository,
            notification_repository,
            audit_repository,
            transitions,
        }
    }

    /// Creates a document in `Draft` owned by the actor.
    pub async fn create_document(
        &self,
        actor: &UserIdentity,
        input: CreateDocumentInput,
    ) -> AppResult<Document> {
        let identity = self.identity_service.resolve(actor.user_id()).await?;

        let may_create = identity.has_capability(Capability::DocumentCreate)
            || identity.level() >= AccessLevel::EDITOR;
        if !may_create {
            return Err(AppError::Forbidden(format!(
                "user '{}' may not create documents (level {})",
                actor.user_id(),
                identity.level()
            )));
        }

        let document = Document::create(DocumentInput {
            title: input.title,
            owner_id: actor.user_id(),
            is_public: input.is_public,
            access_groups: input.access_groups,
            created_at: Utc::now(),
        })?;

        self.repository.insert(&document).await?;

        self.append_audit_best_effort(AuditEvent {
            actor: actor.user_id(),
            action: AuditAction::DocumentCreated,
            resource_type: "document".to_owned(),
            resource_id: document.id().to_string(),
            detail: Some(format!("created document '{}'", document.title().as_str())),
        })
        .await;

        Ok(document)
    }

    /// Loads one document, enforcing the visibility predicate.
    pub async fn get_document(
        &self,
        actor: &UserIdentity,
        document_id: DocumentId,
    ) -> AppResult<Document> {
        let (_, viewer) = self.identity_service.resolve_viewer(actor.user_id()).await?;

        let document = self
            .repository
            .find_by_id(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document '{document_id}'")))?;

        if !can_view(&viewer, &document) {
            return Err(AppError::Forbidden(format!(
                "document '{document_id}' is not visible to user '{}'",
                actor.user_id()
            )));
        }

        Ok(document)
    }

    /// Lists documents visible to the actor, newest first.
    ///
    /// Filtering happens in the store through the declarative form of the
    /// visibility predicate, never by post-filtering rows in memory.
    pub async fn list_documents(
        &self,
        actor: &UserIdentity,
        page: DocumentPage,
    ) -> AppResult<Vec<Document>> {
        let (_, viewer) = self.identity_service.resolve_viewer(actor.user_id()).await?;
        let filter = VisibilityFilter::for_viewer(&viewer);

        self.repository.list_visible(&filter, page).await
    }

    /// Returns the transitions the actor may take on a document.
    pub async fn allowed_transitions(
        &self,
        actor: &UserIdentity,
        document_id: DocumentId,
    ) -> AppResult<Vec<TransitionRule>> {
        let (identity, viewer) = self.identity_service.resolve_viewer(actor.user_id()).await?;

        let document = self
            .repository
            .find_by_id(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document '{document_id}'")))?;

        if !can_view(&viewer, &document) {
            return Err(AppError::Forbidden(format!(
                "document '{document_id}' is not visible to user '{}'",
                actor.user_id()
            )));
        }

        Ok(self
            .transitions
            .allowed_transitions(document.status(), &identity)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Attempts a status transition on a document.
    ///
    /// The identity is re-resolved here; a caller-supplied capability list is
    /// never trusted for the decision. The check and the write are applied
    /// under the document's version guard, and history/audit/notification
    /// rows are appended afterwards best-effort.
    pub async fn change_status(
        &self,
        actor: &UserIdentity,
        document_id: DocumentId,
        target: DocumentStatus,
    ) -> AppResult<StatusChangeOutcome> {
        let (identity, viewer) = self.identity_service.resolve_viewer(actor.user_id()).await?;

        let document = self
            .repository
            .find_by_id(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document '{document_id}'")))?;

        if !can_view(&viewer, &document) {
            return Err(AppError::Forbidden(format!(
                "document '{document_id}' is not visible to user '{}'",
                actor.user_id()
            )));
        }

        let rule = match self
            .transitions
            .authorize(document.status(), target, &identity)
        {
            Ok(rule) => rule.clone(),
            Err(rejection) => return Ok(StatusChangeOutcome::Denied(rejection)),
        };

        let effects = TransitionEffects::for_target(target, actor.user_id(), Utc::now());
        let updated = self
            .repository
            .apply_status_write(StatusWrite {
                document_id,
                expected_version: document.version(),
                effects,
            })
            .await?;

        self.record_transition_side_effects(actor, &document, &updated, &rule)
            .await;

        Ok(StatusChangeOutcome::Applied(updated))
    }

    /// Appends history, audit, and owner-notification rows for an applied
    /// transition. Failures here never roll back the status change.
    async fn record_transition_side_effects(
        &self,
        actor: &UserIdentity,
        before: &Document,
        after: &Document,
        rule: &TransitionRule,
    ) {
        let history = self
            .history_repository
            .append(DocumentHistoryEntry {
                document_id: after.id(),
                from_status: before.status(),
                to_status: after.status(),
                changed_by: actor.user_id(),
                description: rule.description.clone(),
                changed_at: after.updated_at(),
            })
            .await;
        if let Err(error) = history {
            warn!(document_id = %after.id(), %error, "failed to append status history");
        }

        self.append_audit_best_effort(AuditEvent {
            actor: actor.user_id(),
            action: AuditAction::DocumentStatusChanged,
            resource_type: "document".to_owned(),
            resource_id: after.id().to_string(),
            detail: Some(format!(
                "moved document from '{}' to '{}'",
                before.status().as_str(),
                after.status().as_str()
            )),
        })
        .await;

        if after.owner_id() != actor.user_id() {
            let notification = self
                .notification_repository
                .notify(DocumentNotification {
                    recipient: after.owner_id(),
                    document_id: after.id(),
                    message: format!(
                        "'{}' moved to {}",
                        after.title().as_str(),
                        after.status().as_str()
                    ),
                    created_at: after.updated_at(),
                })
                .await;
            if let Err(error) = notification {
                warn!(document_id = %after.id(), %error, "failed to record owner notification");
            }
        }
    }

    async fn append_audit_best_effort(&self, event: AuditEvent) {
        if let Err(error) = self.audit_repository.append_event(event).await {
            warn!(%error, "failed to append audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use docwell_core::{AppError, AppResult, DocumentId, RoleId, UserId, UserIdentity};
    use docwell_domain::{
        AccessLevel, Capability, Document, DocumentInput, DocumentStatus, RoleAssignment,
        TransitionTable, VisibilityFilter,
    };
    use tokio::sync::Mutex;

    use super::{
        CreateDocumentInput, DocumentHistoryEntry, DocumentHistoryRepository, DocumentNotification,
        DocumentPage, DocumentRepository, DocumentService, NotificationRepository,
        StatusChangeOutcome, StatusWrite,
    };
    use crate::identity_service::{IdentityRepository, IdentityService};
    use crate::{AuditEvent, AuditRepository};

    #[derive(Default)]
    struct FakeDocumentRepository {
        documents: Mutex<HashMap<DocumentId, Document>>,
    }

    impl FakeDocumentRepository {
        async fn seed(&self, document: Document) {
            self.documents.lock().await.insert(document.id(), document);
        }
    }

    #[async_trait]
    impl DocumentRepository for FakeDocumentRepository {
        async fn insert(&self, document: &Document) -> AppResult<()> {
            self.documents
                .lock()
                .await
                .insert(document.id(), document.clone());
            Ok(())
        }

        async fn find_by_id(&self, document_id: DocumentId) -> AppResult<Option<Document>> {
            Ok(self.documents.lock().await.get(&document_id).cloned())
        }

        async fn apply_status_write(&self, write: StatusWrite) -> AppResult<Document> {
            let mut documents = self.documents.lock().await;
            let document = documents
                .get_mut(&write.document_id)
                .ok_or_else(|| AppError::NotFound(format!("document '{}'", write.document_id)))?;

            if document.version() != write.expected_version {
                return Err(AppError::Conflict(format!(
                    "document '{}' changed concurrently",
                    write.document_id
                )));
            }

            document.apply_effects(&write.effects);
            Ok(document.clone())
        }

        async fn list_visible(
            &self,
            filter: &VisibilityFilter,
            page: DocumentPage,
        ) -> AppResult<Vec<Document>> {
            let documents = self.documents.lock().await;
            let mut visible: Vec<Document> = documents
                .values()
                .filter(|document| filter.matches(document))
                .cloned()
                .collect();
            visible.sort_by_key(|document| std::cmp::Reverse(document.created_at()));

            Ok(visible
                .into_iter()
                .skip(page.offset)
                .take(page.limit)
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeHistoryRepository {
        entries: Mutex<Vec<DocumentHistoryEntry>>,
        fail: bool,
    }

    #[async_trait]
    impl DocumentHistoryRepository for FakeHistoryRepository {
        async fn append(&self, entry: DocumentHistoryEntry) -> AppResult<()> {
            if self.fail {
                return Err(AppError::Internal("history store offline".to_owned()));
            }
            self.entries.lock().await.push(entry);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeNotificationRepository {
        notifications: Mutex<Vec<DocumentNotification>>,
    }

    #[async_trait]
    impl NotificationRepository for FakeNotificationRepository {
        async fn notify(&self, notification: DocumentNotification) -> AppResult<()> {
            self.notifications.lock().await.push(notification);
            Ok(())
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

    struct Harness {
        service: DocumentService,
        documents: Arc<FakeDocumentRepository>,
        history: Arc<FakeHistoryRepository>,
        notifications: Arc<FakeNotificationRepository>,
        audit: Arc<FakeAuditRepository>,
    }

    fn harness(assignments: HashMap<UserId, Vec<RoleAssignment>>, history_fails: bool) -> Harness {
        let documents = Arc::new(FakeDocumentRepository::default());
        let history = Arc::new(FakeHistoryRepository {
            fail: history_fails,
            ..FakeHistoryRepository::default()
        });
        let notifications = Arc::new(FakeNotificationRepository::default());
        let audit = Arc::new(FakeAuditRepository::default());

        let identity_service =
            IdentityService::new(Arc::new(FakeIdentityRepository { assignments }));
        let service = DocumentService::new(
            identity_service,
            documents.clone(),
            history.clone(),
            notifications.clone(),
            audit.clone(),
            Arc::new(TransitionTable::standard()),
        );

        Harness {
            service,
            documents,
            history,
            notifications,
            audit,
        }
    }

    fn assignment(level: u8, capabilities: Vec<Capability>) -> RoleAssignment {
        RoleAssignment {
            role_id: RoleId::new(),
            role_name: "role".to_owned(),
            level: AccessLevel::new(level).unwrap_or(AccessLevel::NONE),
            capabilities,
            is_active: true,
            assigned_at: Utc::now(),
        }
    }

    fn actor(user_id: UserId) -> UserIdentity {
        UserIdentity::new(user_id, "Test User", None)
    }

    fn draft_document(owner: UserId) -> Document {
        match Document::create(DocumentInput {
            title: "Launch plan".to_owned(),
            owner_id: owner,
            is_public: false,
            access_groups: Vec::new(),
            created_at: Utc::now(),
        }) {
            Ok(document) => document,
            Err(error) => panic!("document construction failed: {error}"),
        }
    }

    #[tokio::test]
    async fn owner_submits_draft_for_review() {
        let owner = UserId::new();
        let harness = harness(
            HashMap::from([(owner, vec![assignment(50, Vec::new())])]),
            false,
        );
        let document = draft_document(owner);
        let document_id = document.id();
        harness.documents.seed(document).await;

        let outcome = harness
            .service
            .change_status(&actor(owner), document_id, DocumentStatus::InReview)
            .await;

        match outcome {
            Ok(StatusChangeOutcome::Applied(updated)) => {
                assert_eq!(updated.status(), DocumentStatus::InReview);
                assert_eq!(updated.updated_by(), Some(owner));
                assert_eq!(updated.version(), 2);
            }
            other => panic!("expected applied outcome, got {other:?}"),
        }

        assert_eq!(harness.history.entries.lock().await.len(), 1);
        assert_eq!(harness.audit.events.lock().await.len(), 1);
        // The actor owns the document; no self-notification.
        assert!(harness.notifications.notifications.lock().await.is_empty());
    }

    #[tokio::test]
    async fn denial_returns_structured_alternatives() {
        let owner = UserId::new();
        let harness = harness(
            HashMap::from([(owner, vec![assignment(50, Vec::new())])]),
            false,
        );
        let document = draft_document(owner);
        let document_id = document.id();
        harness.documents.seed(document).await;

        // An editor cannot jump a draft straight to published.
        let outcome = harness
            .service
            .change_status(&actor(owner), document_id, DocumentStatus::Published)
            .await;

        match outcome {
            Ok(StatusChangeOutcome::Denied(rejection)) => {
                assert_eq!(rejection.current_status, DocumentStatus::Draft);
                assert_eq!(rejection.attempted_status, DocumentStatus::Published);
                let targets: Vec<_> = rejection.allowed.iter().map(|rule| rule.to).collect();
                assert_eq!(targets, vec![DocumentStatus::InReview]);
            }
            other => panic!("expected denial, got {other:?}"),
        }

        assert!(harness.history.entries.lock().await.is_empty());
    }

    #[tokio::test]
    async fn approval_stamps_approver_and_notifies_owner() {
        let owner = UserId::new();
        let approver = UserId::new();
        let harness = harness(
            HashMap::from([
                (owner, vec![assignment(50, Vec::new())]),
                (
                    approver,
                    vec![assignment(70, vec![Capability::DocumentApprove])],
                ),
            ]),
            false,
        );

        let mut document = draft_document(owner);
        let document_id = document.id();
        // Walk to pending approval through the sanctioned edges.
        for target in [DocumentStatus::InReview, DocumentStatus::PendingApproval] {
            let effects =
                docwell_domain::TransitionEffects::for_target(target, owner, Utc::now());
            document.apply_effects(&effects);
        }
        harness.documents.seed(document).await;

        let outcome = harness
            .service
            .change_status(&actor(approver), document_id, DocumentStatus::Approved)
            .await;

        match outcome {
            Ok(StatusChangeOutcome::Applied(updated)) => {
                assert_eq!(updated.status(), DocumentStatus::Approved);
                assert_eq!(updated.approved_by(), Some(approver));
                assert!(updated.approved_at().is_some());
            }
            other => panic!("expected applied outcome, got {other:?}"),
        }

        let notifications = harness.notifications.notifications.lock().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].recipient, owner);
    }

    #[tokio::test]
    async fn publishing_forces_public_flag() {
        let owner = UserId::new();
        let publisher = UserId::new();
        let harness = harness(
            HashMap::from([(
                publisher,
                vec![assignment(
                    70,
                    vec![Capability::DocumentPublish, Capability::DocumentRead],
                )],
            )]),
            false,
        );

        let mut document = draft_document(owner);
        let document_id = document.id();
        for target in [
            DocumentStatus::InReview,
            DocumentStatus::PendingApproval,
            DocumentStatus::Approved,
        ] {
            let effects =
                docwell_domain::TransitionEffects::for_target(target, owner, Utc::now());
            document.apply_effects(&effects);
        }
        harness.documents.seed(document).await;

        let outcome = harness
            .service
            .change_status(&actor(publisher), document_id, DocumentStatus::Published)
            .await;

        match outcome {
            Ok(StatusChangeOutcome::Applied(updated)) => {
                assert!(updated.is_public());
                assert!(updated.published_at().is_some());
            }
            other => panic!("expected applied outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn history_failure_does_not_roll_back_the_change() {
        let owner = UserId::new();
        let harness = harness(
            HashMap::from([(owner, vec![assignment(50, Vec::new())])]),
            true,
        );
        let document = draft_document(owner);
        let document_id = document.id();
        harness.documents.seed(document).await;

        let outcome = harness
            .service
            .change_status(&actor(owner), document_id, DocumentStatus::InReview)
            .await;

        assert!(matches!(outcome, Ok(StatusChangeOutcome::Applied(_))));

        let stored = harness.documents.documents.lock().await;
        let stored = stored.values().next();
        assert!(stored.is_some_and(|document| document.status() == DocumentStatus::InReview));
    }

    #[tokio::test]
    async fn invisible_documents_cannot_be_transitioned() {
        let owner = UserId::new();
        let stranger = UserId::new();
        let harness = harness(
            HashMap::from([(stranger, vec![assignment(10, Vec::new())])]),
            false,
        );
        let document = draft_document(owner);
        let document_id = document.id();
        harness.documents.seed(document).await;

        let outcome = harness
            .service
            .change_status(&actor(stranger), document_id, DocumentStatus::InReview)
            .await;

        assert!(matches!(outcome, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn create_requires_capability_or_editor_level() {
        let creator = UserId::new();
        let harness = harness(
            HashMap::from([(creator, vec![assignment(10, Vec::new())])]),
            false,
        );

        let denied = harness
            .service
            .create_document(
                &actor(creator),
                CreateDocumentInput {
                    title: "Notes".to_owned(),
                    is_public: false,
                    access_groups: Vec::new(),
                },
            )
            .await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn listing_uses_the_declarative_filter() {
        let owner = UserId::new();
        let guest = UserId::new();
        let harness = harness(HashMap::new(), false);

        let private_draft = draft_document(owner);
        harness.documents.seed(private_draft).await;

        let mut published = draft_document(owner);
        for target in [
            DocumentStatus::InReview,
            DocumentStatus::PendingApproval,
            DocumentStatus::Approved,
            DocumentStatus::Published,
        ] {
            let effects =
                docwell_domain::TransitionEffects::for_target(target, owner, Utc::now());
            published.apply_effects(&effects);
        }
        harness.documents.seed(published).await;

        let listed = harness
            .service
            .list_documents(
                &actor(guest),
                DocumentPage {
                    limit: 10,
                    offset: 0,
                },
            )
            .await;

        match listed {
            Ok(listed) => {
                assert_eq!(listed.len(), 1);
                assert_eq!(listed[0].status(), DocumentStatus::Published);
            }
            Err(error) => panic!("listing failed: {error}"),
        }
    }
}
