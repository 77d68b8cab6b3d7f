use async_trait::async_trait;
use docwell_application::{DocumentHistoryEntry, DocumentHistoryRepository};
use docwell_core::{AppError, AppResult};
use sqlx::PgPool;

/// PostgreSQL-backed writer for the append-only status history.
#[derive(Clone)]
pub struct PostgresDocumentHistoryRepository {
    pool: PgPool,
}

impl PostgresDocumentHistoryRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentHistoryRepository for PostgresDocumentHistoryRepository {
    async fn append(&self, entry: DocumentHistoryEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO document_status_history (
                document_id, from_status, to_status, changed_by, description, changed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.document_id.as_uuid())
        .bind(entry.from_status.as_str())
        .bind(entry.to_status.as_str())
        .bind(entry.changed_by.as_uuid())
        .bind(entry.description.as_str())
        .bind(entry.changed_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append status history: {error}")))?;

        Ok(())
    }
}
