/// Message threads
///
/// - `GET /v1/threads?project_id=` (worker)
/// - `POST /v1/threads` (worker): optional first message in `body`
/// - `GET /v1/threads/:id/messages` (worker)
/// - `POST /v1/threads/:id/messages` (worker)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{Dated, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::{
        message::{CreateThread, Message, MessageThread},
        project::Project,
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateThreadRequest {
    pub project_id: Option<Uuid>,

    #[validate(length(min = 1, max = 255, message = "Subject must be 1-255 characters"))]
    pub subject: String,

    pub body: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PostMessageRequest {
    #[validate(length(min = 1, max = 10000, message = "Message must be 1-10000 characters"))]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ThreadListQuery {
    pub project_id: Option<Uuid>,
}

pub async fn list_threads(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
    Query(query): Query<ThreadListQuery>,
) -> ApiResult<Json<Vec<MessageThread>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let threads =
        MessageThread::list(&state.db, auth.org_id, query.project_id, page.limit(), page.offset()).await?;
    Ok(Json(threads))
}

pub async fn create_thread(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateThreadRequest>,
) -> ApiResult<(StatusCode, Json<MessageThread>)> {
    req.validate()?;

    require_permission(&state.db, &auth, ResourcePermission::Contribute).await?;

    if let Some(project_id) = req.project_id {
        if !Project::exists(&state.db, auth.org_id, project_id).await? {
            return Err(ApiError::invalid("project_id", "project_id does not exist"));
        }
    }

    let thread = MessageThread::create(
        &state.db,
        auth.org_id,
        auth.user_id,
        CreateThread {
            project_id: req.project_id,
            subject: req.subject.trim().to_string(),
            body: req.body.filter(|b| !b.trim().is_empty()),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(thread)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(thread_id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Dated<Message>>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    if MessageThread::find(&state.db, auth.org_id, thread_id).await?.is_none() {
        return Err(ApiError::not_found("Thread"));
    }

    let messages =
        Message::list_by_thread(&state.db, auth.org_id, thread_id, page.limit(), page.offset()).await?;

    let now = Utc::now();
    Ok(Json(
        messages
            .into_iter()
            .map(|m| {
                let at = m.created_at;
                Dated::new(m, at, now)
            })
            .collect(),
    ))
}

pub async fn post_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(thread_id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<Dated<Message>>)> {
    req.validate()?;

    require_permission(&state.db, &auth, ResourcePermission::Contribute).await?;

    if MessageThread::find(&state.db, auth.org_id, thread_id).await?.is_none() {
        return Err(ApiError::not_found("Thread"));
    }

    let message = Message::post(&state.db, auth.org_id, thread_id, auth.user_id, &req.body).await?;
    let at = message.created_at;
    Ok((StatusCode::CREATED, Json(Dated::new(message, at, Utc::now()))))
}
