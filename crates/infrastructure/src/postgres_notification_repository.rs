use async_trait::async_trait;
use docwell_application::{DocumentNotification, NotificationRepository};
use docwell_core::{AppError, AppResult};
use sqlx::PgPool;

/// PostgreSQL-backed writer for owner notification rows.
///
/// Delivery is out of scope; consumers poll or join this table.
#[derive(Clone)]
pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn notify(&self, notification: DocumentNotification) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (recipient, document_id, message, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(notification.recipient.as_uuid())
        .bind(notification.document_id.as_uuid())
        .bind(notification.message.as_str())
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to record notification: {error}")))?;

        Ok(())
    }
}
