use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docwell_application::IdentityRepository;
use docwell_core::{AppError, AppResult, RoleId, UserId};
use docwell_domain::{AccessLevel, Capability, RoleAssignment};
use sqlx::{FromRow, PgPool};
use tracing::warn;

/// PostgreSQL-backed repository for identity resolution inputs.
#[derive(Clone)]
pub struct PostgresIdentityRepository {
    pool: PgPool,
}

impl PostgresIdentityRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    role_id: uuid::Uuid,
    role_name: String,
    level: i16,
    assigned_at: DateTime<Utc>,
    capabilities: Vec<String>,
}

#[derive(Debug, FromRow)]
struct GroupRow {
    group_name: String,
}

#[async_trait]
impl IdentityRepository for PostgresIdentityRepository {
    async fn list_active_assignments(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT roles.id AS role_id,
                roles.name AS role_name,
                roles.level,
                assignments.assigned_at,
                COALESCE(
                    array_agg(grants.capability)
                        FILTER (WHERE grants.capability IS NOT NULL),
                    '{}'
                ) AS capabilities
            FROM role_assignments AS assignments
            INNER JOIN roles
                ON roles.id = assignments.role_id
            LEFT JOIN role_capabilities AS grants
                ON grants.role_id = roles.id
            WHERE assignments.user_id = $1
                AND assignments.is_active = TRUE
            GROUP BY roles.id, roles.name, roles.level, assignments.assigned_at
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role assignments: {error}")))?;

        self.warn_on_orphaned_assignments(user_id).await;

        rows.into_iter()
            .map(|row| {
                let level = u8::try_from(row.level)
                    .ok()
                    .and_then(|value| AccessLevel::new(value).ok())
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "role '{}' has out-of-range level {}",
                            row.role_name, row.level
                        ))
                    })?;

                let capabilities = row
                    .capabilities
                    .iter()
                    .map(|value| {
                        Capability::from_str(value).map_err(|error| {
                            AppError::Internal(format!(
                                "failed to decode capability '{value}' on role '{}': {error}",
                                row.role_name
                            ))
                        })
                    })
                    .collect::<AppResult<Vec<_>>>()?;

                Ok(RoleAssignment {
                    role_id: RoleId::from_uuid(row.role_id),
                    role_name: row.role_name,
                    level,
                    capabilities,
                    is_active: true,
                    assigned_at: row.assigned_at,
                })
            })
            .collect()
    }

    async fn list_group_memberships(&self, user_id: UserId) -> AppResult<Vec<String>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT group_name
            FROM user_groups
            WHERE user_id = $1
            ORDER BY group_name
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load group memberships: {error}"))
        })?;

        Ok(rows.into_iter().map(|row| row.group_name).collect())
    }
}

impl PostgresIdentityRepository {
    /// Active assignments pointing at deleted roles are excluded from
    /// resolution (conservative deny) but must not pass silently.
    async fn warn_on_orphaned_assignments(&self, user_id: UserId) {
        let orphaned = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM role_assignments AS assignments
            LEFT JOIN roles
                ON roles.id = assignments.role_id
            WHERE assignments.user_id = $1
                AND assignments.is_active = TRUE
                AND roles.id IS NULL
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await;

        match orphaned {
            Ok(count) if count > 0 => {
                warn!(%user_id, count, "active role assignments reference deleted roles");
            }
            Ok(_) => {}
            Err(error) => {
                warn!(%user_id, %error, "failed to check for orphaned role assignments");
            }
        }
    }
}
