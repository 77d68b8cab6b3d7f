//! Development-only demo data: accounts, group memberships, and documents
//! across the status graph. Idempotent; gated behind `DEV_SEED=true`.

use docwell_application::NewUserInput;
use docwell_core::{AppError, AppResult, UserId};
use docwell_domain::DocumentStatus;
use sqlx::PgPool;
use tracing::info;

use crate::state::AppState;

const DEMO_PASSWORD: &str = "docwell-demo-password";

struct DemoUser {
    email: &'static str,
    display_name: &'static str,
    role: &'static str,
    groups: &'static [&'static str],
}

const DEMO_USERS: &[DemoUser] = &[
    DemoUser {
        email: "admin@docwell.dev",
        display_name: "Ada Admin",
        role: "administrator",
        groups: &[],
    },
    DemoUser {
        email: "manager@docwell.dev",
        display_name: "Morgan Manager",
        role: "manager",
        groups: &["finance"],
    },
    DemoUser {
        email: "editor@docwell.dev",
        display_name: "Eli Editor",
        role: "editor",
        groups: &["finance", "engineering"],
    },
    DemoUser {
        email: "contributor@docwell.dev",
        display_name: "Casey Contributor",
        role: "contributor",
        groups: &["engineering"],
    },
    DemoUser {
        email: "viewer@docwell.dev",
        display_name: "Val Viewer",
        role: "viewer",
        groups: &[],
    },
];

struct DemoDocument {
    title: &'static str,
    owner_email: &'static str,
    status: DocumentStatus,
    is_public: bool,
    access_groups: &'static [&'static str],
}

const DEMO_DOCUMENTS: &[DemoDocument] = &[
    DemoDocument {
        title: "Engineering onboarding guide",
        owner_email: "editor@docwell.dev",
        status: DocumentStatus::Published,
        is_public: true,
        access_groups: &[],
    },
    DemoDocument {
        title: "Quarterly budget draft",
        owner_email: "editor@docwell.dev",
        status: DocumentStatus::Draft,
        is_public: false,
        access_groups: &["finance"],
    },
    DemoDocument {
        title: "Compensation review",
        owner_email: "manager@docwell.dev",
        status: DocumentStatus::PendingApproval,
        is_public: false,
        access_groups: &["finance"],
    },
    DemoDocument {
        title: "Incident response runbook",
        owner_email: "contributor@docwell.dev",
        status: DocumentStatus::InReview,
        is_public: false,
        access_groups: &["engineering"],
    },
    DemoDocument {
        title: "Company handbook",
        owner_email: "editor@docwell.dev",
        status: DocumentStatus::Approved,
        is_public: true,
        access_groups: &[],
    },
];

/// Seeds demo accounts and documents, skipping anything already present.
pub async fn seed_demo_data(state: &AppState, pool: &PgPool) -> AppResult<()> {
    for user in DEMO_USERS {
        let user_id = ensure_demo_user(state, user).await?;
        for group in user.groups {
            sqlx::query(
                r#"
                INSERT INTO user_groups (user_id, group_name)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id.as_uuid())
            .bind(*group)
            .execute(pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to seed group: {error}")))?;
        }
    }

    for document in DEMO_DOCUMENTS {
        ensure_demo_document(state, pool, document).await?;
    }

    info!("dev seed complete");
    Ok(())
}

async fn ensure_demo_user(state: &AppState, user: &DemoUser) -> AppResult<UserId> {
    if let Ok(identity) = state
        .user_service
        .authenticate(user.email, DEMO_PASSWORD)
        .await
    {
        return Ok(identity.user_id());
    }

    let account = state
        .user_service
        .create_user(NewUserInput {
            email: user.email.to_owned(),
            display_name: user.display_name.to_owned(),
            password: DEMO_PASSWORD.to_owned(),
        })
        .await?;

    state
        .security_admin_repository
        .assign_role_to_user(account.id, user.role)
        .await?;
    state.identity_service.invalidate(account.id).await?;

    info!(email = user.email, role = user.role, "seeded demo user");
    Ok(account.id)
}

async fn ensure_demo_document(
    state: &AppState,
    pool: &PgPool,
    document: &DemoDocument,
) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents WHERE title = $1")
        .bind(document.title)
        .fetch_one(pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check demo document: {error}")))?;
    if exists > 0 {
        return Ok(());
    }

    let owner = state
        .user_service
        .authenticate(document.owner_email, DEMO_PASSWORD)
        .await?;

    let access_groups: Vec<String> = document
        .access_groups
        .iter()
        .map(|group| (*group).to_owned())
        .collect();

    sqlx::query(
        r#"
        INSERT INTO documents (
            id, title, owner_id, status, is_public, access_groups,
            version, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, 1, NOW(), NOW())
        "#,
    )
    .bind(uuid::Uuid::new_v4())
    .bind(document.title)
    .bind(owner.user_id().as_uuid())
    .bind(document.status.as_str())
    .bind(document.is_public)
    .bind(&access_groups)
    .execute(pool)
    .await
    .map_err(|error| AppError::Internal(format!("failed to seed demo document: {error}")))?;

    info!(title = document.title, "seeded demo document");
    Ok(())
}
