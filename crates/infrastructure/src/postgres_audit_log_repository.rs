use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docwell_application::{AuditLogEntry, AuditLogQuery, AuditLogRepository};
use docwell_core::{AppError, AppResult, UserId};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

/// PostgreSQL-backed reader for administrative audit log views.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    event_id: uuid::Uuid,
    actor: uuid::Uuid,
    action: String,
    resource_type: String,
    resource_id: String,
    detail: Option<String>,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn list_recent_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT event_id, actor, action, resource_type, resource_id, detail, created_at \
             FROM audit_log WHERE TRUE",
        );

        if let Some(action) = &query.action {
            builder.push(" AND action = ");
            builder.push_bind(action.clone());
        }
        if let Some(actor) = query.actor {
            builder.push(" AND actor = ");
            builder.push_bind(actor.as_uuid());
        }

        builder.push(" ORDER BY created_at DESC");
        builder.push(" LIMIT ");
        builder.push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
        builder.push(" OFFSET ");
        builder.push_bind(i64::try_from(query.offset).unwrap_or(0));

        let rows = builder
            .build_query_as::<AuditLogRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list audit log: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|row| AuditLogEntry {
                event_id: row.event_id.to_string(),
                actor: UserId::from_uuid(row.actor),
                action: row.action,
                resource_type: row.resource_type,
                resource_id: row.resource_id,
                detail: row.detail,
                created_at: row.created_at.to_rfc3339(),
            })
            .collect())
    }
}
