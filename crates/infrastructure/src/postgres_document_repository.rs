use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docwell_application::{DocumentPage, DocumentRepository, StatusWrite};
use docwell_core::{AppError, AppResult, DocumentId, UserId};
use docwell_domain::{
    Document, DocumentRecord, DocumentStatus, StatusGate, VisibilityClause, VisibilityFilter,
};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

/// PostgreSQL-backed repository for document rows.
///
/// Listing translates the declarative visibility filter into one SQL
/// predicate; rows are never post-filtered in application memory.
#[derive(Clone)]
pub struct PostgresDocumentRepository {
    pool: PgPool,
}

impl PostgresDocumentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: uuid::Uuid,
    title: String,
    owner_id: uuid::Uuid,
    status: String,
    is_public: bool,
    access_groups: Vec<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    updated_by: Option<uuid::Uuid>,
    approved_by: Option<uuid::Uuid>,
    approved_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
}

impl DocumentRow {
    fn into_document(self) -> AppResult<Document> {
        let status = DocumentStatus::from_str(self.status.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "failed to decode status for document '{}': {error}",
                self.id
            ))
        })?;

        Document::from_record(DocumentRecord {
            id: DocumentId::from_uuid(self.id),
            title: self.title,
            owner_id: UserId::from_uuid(self.owner_id),
            status,
            is_public: self.is_public,
            access_groups: self.access_groups,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            updated_by: self.updated_by.map(UserId::from_uuid),
            approved_by: self.approved_by.map(UserId::from_uuid),
            approved_at: self.approved_at,
            published_at: self.published_at,
        })
    }
}

const DOCUMENT_COLUMNS: &str = "id, title, owner_id, status, is_public, access_groups, \
    version, created_at, updated_at, updated_by, approved_by, approved_at, published_at";

#[async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    async fn insert(&self, document: &Document) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (
                id, title, owner_id, status, is_public, access_groups,
                version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(document.id().as_uuid())
        .bind(document.title().as_str())
        .bind(document.owner_id().as_uuid())
        .bind(document.status().as_str())
        .bind(document.is_public())
        .bind(document.access_groups())
        .bind(document.version())
        .bind(document.created_at())
        .bind(document.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert document: {error}")))?;

        Ok(())
    }

    async fn find_by_id(&self, document_id: DocumentId) -> AppResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(document_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load document: {error}")))?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn apply_status_write(&self, write: StatusWrite) -> AppResult<Document> {
        let effects = write.effects;

        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            r#"
            UPDATE documents SET
                status = $1,
                updated_by = $2,
                updated_at = $3,
                version = version + 1,
                approved_by = CASE WHEN $4 THEN $2 ELSE approved_by END,
                approved_at = CASE WHEN $4 THEN $3 ELSE approved_at END,
                published_at = CASE WHEN $5 THEN $3 ELSE published_at END,
                is_public = CASE WHEN $5 THEN TRUE ELSE is_public END
            WHERE id = $6 AND version = $7
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(effects.to_status.as_str())
        .bind(effects.actor.as_uuid())
        .bind(effects.at)
        .bind(effects.stamp_approval)
        .bind(effects.stamp_publication)
        .bind(write.document_id.as_uuid())
        .bind(write.expected_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update document: {error}")))?;

        if let Some(row) = row {
            return row.into_document();
        }

        // Distinguish a lost-update race from a missing row.
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents WHERE id = $1")
            .bind(write.document_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to check document: {error}")))?;

        if exists > 0 {
            Err(AppError::Conflict(format!(
                "document '{}' changed concurrently",
                write.document_id
            )))
        } else {
            Err(AppError::NotFound(format!(
                "document '{}'",
                write.document_id
            )))
        }
    }

    async fn list_visible(
        &self,
        filter: &VisibilityFilter,
        page: DocumentPage,
    ) -> AppResult<Vec<Document>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE "));
        push_filter_predicate(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC");
        builder.push(" LIMIT ");
        builder.push_bind(i64::try_from(page.limit).unwrap_or(i64::MAX));
        builder.push(" OFFSET ");
        builder.push_bind(i64::try_from(page.offset).unwrap_or(0));

        let rows = builder
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list documents: {error}")))?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }
}

/// Renders the declarative visibility filter as one SQL predicate.
///
/// Each clause mirrors `VisibilityClause::matches` exactly; the property
/// tests on the domain side keep the two representations equivalent.
fn push_filter_predicate(builder: &mut QueryBuilder<'_, Postgres>, filter: &VisibilityFilter) {
    let clauses = match filter {
        VisibilityFilter::All => {
            builder.push("TRUE");
            return;
        }
        VisibilityFilter::Any(clauses) => clauses,
    };

    if clauses.is_empty() {
        builder.push("FALSE");
        return;
    }

    builder.push("(");
    for (index, clause) in clauses.iter().enumerate() {
        if index > 0 {
            builder.push(" OR ");
        }
        push_clause(builder, clause);
    }
    builder.push(")");
}

fn push_clause(builder: &mut QueryBuilder<'_, Postgres>, clause: &VisibilityClause) {
    match clause {
        VisibilityClause::Owner { user_id } => {
            builder.push("owner_id = ");
            builder.push_bind(user_id.as_uuid());
        }
        VisibilityClause::GroupMember { groups, gate } => {
            builder.push("(access_groups && ");
            builder.push_bind(group_vec(groups));
            builder.push(" AND ");
            push_gate(builder, gate);
            builder.push(")");
        }
        VisibilityClause::GroupOutsiderPeek { groups } => {
            builder.push("(cardinality(access_groups) > 0 AND NOT (access_groups && ");
            builder.push_bind(group_vec(groups));
            builder.push(") AND status = ANY(");
            builder.push_bind(vec![
                DocumentStatus::Approved.as_str().to_owned(),
                DocumentStatus::Published.as_str().to_owned(),
            ]);
            builder.push("))");
        }
        VisibilityClause::PublicUnscoped { gate } => {
            builder.push("(cardinality(access_groups) = 0 AND is_public AND ");
            push_gate(builder, gate);
            builder.push(")");
        }
        VisibilityClause::PrivateUnscoped { gate } => {
            builder.push("(cardinality(access_groups) = 0 AND NOT is_public AND ");
            push_gate(builder, gate);
            builder.push(")");
        }
    }
}

fn push_gate(builder: &mut QueryBuilder<'_, Postgres>, gate: &StatusGate) {
    builder.push("(status = ANY(");
    builder.push_bind(
        gate.visible_statuses
            .iter()
            .map(|status| status.as_str().to_owned())
            .collect::<Vec<String>>(),
    );
    builder.push(") OR (status = ");
    builder.push_bind(DocumentStatus::Published.as_str());
    builder.push(" AND is_public))");
}

fn group_vec(groups: &std::collections::BTreeSet<String>) -> Vec<String> {
    groups.iter().cloned().collect()
}
