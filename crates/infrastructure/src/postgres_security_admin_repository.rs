use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docwell_application::{
    CreateRoleInput, RoleAssignmentRecord, RoleDefinition, SecurityAdminRepository,
};
use docwell_core::{AppError, AppResult, RoleId, UserId};
use docwell_domain::{AccessLevel, Capability};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed repository for role and assignment administration.
#[derive(Clone)]
pub struct PostgresSecurityAdminRepository {
    pool: PgPool,
}

impl PostgresSecurityAdminRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: uuid::Uuid,
    name: String,
    label: String,
    level: i16,
    is_system: bool,
    capabilities: Vec<String>,
}

impl RoleRow {
    fn into_definition(self) -> AppResult<RoleDefinition> {
        let level = u8::try_from(self.level)
            .ok()
            .and_then(|value| AccessLevel::new(value).ok())
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "role '{}' has out-of-range level {}",
                    self.name, self.level
                ))
            })?;

        let capabilities = self
            .capabilities
            .iter()
            .map(|value| {
                Capability::from_str(value).map_err(|error| {
                    AppError::Internal(format!(
                        "failed to decode capability '{value}' on role '{}': {error}",
                        self.name
                    ))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(RoleDefinition {
            role_id: RoleId::from_uuid(self.id),
            name: self.name,
            label: self.label,
            level,
            is_system: self.is_system,
            capabilities,
        })
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    user_id: uuid::Uuid,
    role_id: uuid::Uuid,
    role_name: String,
    is_active: bool,
    assigned_at: DateTime<Utc>,
}

const ROLE_QUERY: &str = r#"
    SELECT roles.id,
        roles.name,
        roles.label,
        roles.level,
        roles.is_system,
        COALESCE(
            array_agg(grants.capability)
                FILTER (WHERE grants.capability IS NOT NULL),
            '{}'
        ) AS capabilities
    FROM roles
    LEFT JOIN role_capabilities AS grants
        ON grants.role_id = roles.id
    GROUP BY roles.id, roles.name, roles.label, roles.level, roles.is_system
    ORDER BY roles.level DESC, roles.name
"#;

#[async_trait]
impl SecurityAdminRepository for PostgresSecurityAdminRepository {
    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(ROLE_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter().map(RoleRow::into_definition).collect()
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition> {
        let role_id = RoleId::new();

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO roles (id, name, label, level, is_system)
            VALUES ($1, $2, $3, $4, FALSE)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(input.name.as_str())
        .bind(input.label.as_str())
        .bind(i16::from(input.level.value()))
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create role: {error}")))?;

        if inserted.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                input.name
            )));
        }

        for capability in &input.capabilities {
            sqlx::query(
                r#"
                INSERT INTO role_capabilities (role_id, capability)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(role_id.as_uuid())
            .bind(capability.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to attach capability grant: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit role creation: {error}"))
        })?;

        Ok(RoleDefinition {
            role_id,
            name: input.name,
            label: input.label,
            level: input.level,
            is_system: false,
            capabilities: input.capabilities,
        })
    }

    async fn assign_role_to_user(&self, user_id: UserId, role_name: &str) -> AppResult<()> {
        let role_id = self.role_id_by_name(role_name).await?;

        sqlx::query(
            r#"
            INSERT INTO role_assignments (user_id, role_id, is_active, assigned_at)
            VALUES ($1, $2, TRUE, NOW())
            ON CONFLICT (user_id, role_id)
                DO UPDATE SET is_active = TRUE, assigned_at = NOW()
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to assign role: {error}")))?;

        Ok(())
    }

    async fn unassign_role_from_user(&self, user_id: UserId, role_name: &str) -> AppResult<()> {
        let role_id = self.role_id_by_name(role_name).await?;

        let updated = sqlx::query(
            r#"
            UPDATE role_assignments
            SET is_active = FALSE
            WHERE user_id = $1 AND role_id = $2 AND is_active = TRUE
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to unassign role: {error}")))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "active assignment of role '{role_name}' for user '{user_id}'"
            )));
        }

        Ok(())
    }

    async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignmentRecord>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT assignments.user_id,
                assignments.role_id,
                roles.name AS role_name,
                assignments.is_active,
                assignments.assigned_at
            FROM role_assignments AS assignments
            INNER JOIN roles
                ON roles.id = assignments.role_id
            ORDER BY assignments.assigned_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list assignments: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|row| RoleAssignmentRecord {
                user_id: UserId::from_uuid(row.user_id),
                role_id: RoleId::from_uuid(row.role_id),
                role_name: row.role_name,
                is_active: row.is_active,
                assigned_at: row.assigned_at,
            })
            .collect())
    }
}

impl PostgresSecurityAdminRepository {
    async fn role_id_by_name(&self, role_name: &str) -> AppResult<RoleId> {
        let role_id = sqlx::query_scalar::<_, uuid::Uuid>("SELECT id FROM roles WHERE name = $1")
            .bind(role_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to look up role: {error}")))?;

        role_id
            .map(RoleId::from_uuid)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_name}'")))
    }
}
