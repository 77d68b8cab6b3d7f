use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docwell_application::{CreateDocumentInput, DocumentPage, StatusChangeOutcome};
use docwell_core::{DocumentId, UserIdentity};
use docwell_domain::DocumentStatus;
use uuid::Uuid;

use crate::dto::{
    ChangeStatusRequest, CreateDocumentRequest, DocumentResponse, ListQuery,
    TransitionRejectionResponse, TransitionRuleResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_PAGE_LIMIT: usize = 50;
const MAX_PAGE_LIMIT: usize = 200;

pub async fn list_documents_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<DocumentResponse>>> {
    let page = DocumentPage {
        limit: query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT),
        offset: query.offset.unwrap_or(0),
    };

    let documents = state
        .document_service
        .list_documents(&user, page)
        .await?
        .into_iter()
        .map(DocumentResponse::from)
        .collect();

    Ok(Json(documents))
}

pub async fn create_document_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<DocumentResponse>)> {
    let document = state
        .document_service
        .create_document(
            &user,
            CreateDocumentInput {
                title: payload.title,
                is_public: payload.is_public,
                access_groups: payload.access_groups,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

pub async fn get_document_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<DocumentResponse>> {
    let document = state
        .document_service
        .get_document(&user, DocumentId::from_uuid(document_id))
        .await?;

    Ok(Json(DocumentResponse::from(document)))
}

pub async fn allowed_transitions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TransitionRuleResponse>>> {
    let rules = state
        .document_service
        .allowed_transitions(&user, DocumentId::from_uuid(document_id))
        .await?;

    Ok(Json(rules.iter().map(TransitionRuleResponse::from).collect()))
}

/// Applies a status transition, or answers 403 with the full list of
/// transitions the caller could take instead.
pub async fn change_status_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<ChangeStatusRequest>,
) -> ApiResult<Response> {
    let target = DocumentStatus::from_transport(payload.status.as_str())?;

    let outcome = state
        .document_service
        .change_status(&user, DocumentId::from_uuid(document_id), target)
        .await?;

    Ok(match outcome {
        StatusChangeOutcome::Applied(document) => {
            Json(DocumentResponse::from(document)).into_response()
        }
        StatusChangeOutcome::Denied(rejection) => (
            StatusCode::FORBIDDEN,
            Json(TransitionRejectionResponse::from(rejection)),
        )
            .into_response(),
    })
}
