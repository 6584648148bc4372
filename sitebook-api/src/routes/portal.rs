/// Client portal
///
/// Routes for members with the `client` role. A client only sees projects
/// where they are the recorded client; anything else is reported as not
/// found.
///
/// - `GET /v1/portal/projects`
/// - `GET /v1/portal/projects/:id/invoices`: everything but drafts
/// - `GET /v1/portal/projects/:id/messages`
/// - `POST /v1/portal/projects/:id/messages`: posts to the project's
///   client thread, creating it on first use

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{messages::PostMessageRequest, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use sitebook_shared::{
    auth::{authorization::require_client, middleware::AuthContext},
    models::{
        invoice::Invoice,
        message::{Message, MessageThread},
        project::Project,
    },
};
use uuid::Uuid;
use validator::Validate;

async fn client_project(state: &AppState, auth: &AuthContext, project_id: Uuid) -> ApiResult<Project> {
    require_client(&state.db, auth).await?;

    Project::find_for_client(&state.db, auth.org_id, project_id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Project>>> {
    require_client(&state.db, &auth).await?;

    Ok(Json(Project::list_for_client(&state.db, auth.org_id, auth.user_id).await?))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let project = client_project(&state, &auth, project_id).await?;

    Ok(Json(Invoice::list_for_portal(&state.db, auth.org_id, project.id).await?))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Message>>> {
    let project = client_project(&state, &auth, project_id).await?;

    let messages =
        Message::list_by_project(&state.db, auth.org_id, project.id, page.limit(), page.offset()).await?;
    Ok(Json(messages))
}

pub async fn post_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    req.validate()?;

    let project = client_project(&state, &auth, project_id).await?;

    let thread = MessageThread::find_or_create_for_project(
        &state.db,
        auth.org_id,
        project.id,
        &project.name,
        auth.user_id,
    )
    .await?;

    let message = Message::post(&state.db, auth.org_id, thread.id, auth.user_id, &req.body).await?;

    tracing::debug!(
        project_id = %project.id,
        thread_id = %thread.id,
        client_id = %auth.user_id,
        "Client posted portal message"
    );

    Ok((StatusCode::CREATED, Json(message)))
}
