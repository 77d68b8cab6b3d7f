use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use docwell_application::NewUserInput;
use docwell_core::{AppError, UserIdentity};
use tower_sessions::Session;
use tracing::info;

use crate::dto::{BootstrapRequest, LoginRequest, UserIdentityResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// Session key holding the authenticated identity.
pub const SESSION_USER_KEY: &str = "docwell.user";

const ADMINISTRATOR_ROLE: &str = "administrator";

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<UserIdentityResponse>> {
    let identity = state
        .user_service
        .authenticate(payload.email.as_str(), payload.password.as_str())
        .await?;

    store_session_identity(&session, &identity).await?;

    let resolved = state.identity_service.resolve(identity.user_id()).await?;
    Ok(Json(UserIdentityResponse::from_identity(identity, &resolved)))
}

pub async fn logout_handler(session: Session) -> ApiResult<StatusCode> {
    session
        .delete()
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete session: {error}")))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn me_handler(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<UserIdentityResponse>> {
    let identity = session
        .get::<UserIdentity>(SESSION_USER_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session identity: {error}")))?
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    let resolved = state.identity_service.resolve(identity.user_id()).await?;
    Ok(Json(UserIdentityResponse::from_identity(identity, &resolved)))
}

/// Creates the first administrator account, guarded by the bootstrap token.
pub async fn bootstrap_handler(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<BootstrapRequest>,
) -> ApiResult<(StatusCode, Json<UserIdentityResponse>)> {
    if payload.token != state.bootstrap_token {
        return Err(AppError::Unauthorized("invalid bootstrap token".to_owned()).into());
    }

    if state.user_service.has_accounts().await? {
        return Err(AppError::Conflict(
            "bootstrap is only available before the first account exists".to_owned(),
        )
        .into());
    }

    let account = state
        .user_service
        .create_user(NewUserInput {
            email: payload.email,
            display_name: payload.display_name,
            password: payload.password,
        })
        .await?;

    state
        .security_admin_repository
        .assign_role_to_user(account.id, ADMINISTRATOR_ROLE)
        .await?;
    state.identity_service.invalidate(account.id).await?;

    info!(user_id = %account.id, "bootstrapped first administrator account");

    let identity = account.identity();
    store_session_identity(&session, &identity).await?;

    let resolved = state.identity_service.resolve(identity.user_id()).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserIdentityResponse::from_identity(identity, &resolved)),
    ))
}

async fn store_session_identity(
    session: &Session,
    identity: &UserIdentity,
) -> Result<(), AppError> {
    // Rotate the session id on privilege change.
    session
        .cycle_id()
        .await
        .map_err(|error| AppError::Internal(format!("failed to cycle session id: {error}")))?;

    session
        .insert(SESSION_USER_KEY, identity)
        .await
        .map_err(|error| AppError::Internal(format!("failed to persist session: {error}")))
}
