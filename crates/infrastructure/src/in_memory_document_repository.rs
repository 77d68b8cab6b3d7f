use std::collections::HashMap;

use async_trait::async_trait;
use docwell_application::{DocumentPage, DocumentRepository, StatusWrite};
use docwell_core::{AppError, AppResult, DocumentId};
use docwell_domain::{Document, VisibilityFilter};
use tokio::sync::RwLock;

/// In-memory document repository for tests and local development.
///
/// Listing evaluates the declarative visibility filter directly, exercising
/// the same clause logic the Postgres adapter renders into SQL.
#[derive(Default)]
pub struct InMemoryDocumentRepository {
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl InMemoryDocumentRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn insert(&self, document: &Document) -> AppResult<()> {
        self.documents
            .write()
            .await
            .insert(document.id(), document.clone());
        Ok(())
    }

    async fn find_by_id(&self, document_id: DocumentId) -> AppResult<Option<Document>> {
        Ok(self.documents.read().await.get(&document_id).cloned())
    }

    async fn apply_status_write(&self, write: StatusWrite) -> AppResult<Document> {
        let mut documents = self.documents.write().await;
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
        let documents = self.documents.read().await;
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
