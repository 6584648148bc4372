/// Projects
///
/// - `GET /v1/projects?status=&limit=&offset=` (worker)
/// - `POST /v1/projects` (manager)
/// - `GET /v1/projects/:id` (worker)
/// - `PATCH /v1/projects/:id` (manager)
/// - `DELETE /v1/projects/:id` (manager)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{ensure_date_order, ensure_non_negative, ensure_not_blank, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::{
        activity::{self, NewActivity},
        membership::{Membership, MembershipRole},
        project::{CreateProject, Project, ProjectStatus, UpdateProject},
    },
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    pub description: Option<String>,
    pub address: Option<String>,

    /// Must be a member with the `client` role
    pub client_id: Option<Uuid>,

    pub status: Option<ProjectStatus>,
    pub budget: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    pub status: Option<ProjectStatus>,
}

/// Client must be a portal client of the same organization
async fn ensure_client(pool: &PgPool, org_id: Uuid, client_id: Option<Uuid>) -> ApiResult<()> {
    let Some(client_id) = client_id else {
        return Ok(());
    };

    match Membership::get_role(pool, org_id, client_id).await? {
        Some(MembershipRole::Client) => Ok(()),
        _ => Err(ApiError::invalid("client_id", "client_id must be a client of this organization")),
    }
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
    Query(query): Query<ProjectListQuery>,
) -> ApiResult<Json<Vec<Project>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let projects =
        Project::list(&state.db, auth.org_id, query.status, page.limit(), page.offset()).await?;
    Ok(Json(projects))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    req.validate()?;
    ensure_non_negative("budget", req.budget)?;
    ensure_date_order(req.start_date, req.end_date)?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;
    ensure_client(&state.db, auth.org_id, req.client_id).await?;

    let project = Project::create(
        &state.db,
        auth.org_id,
        CreateProject {
            name: req.name.trim().to_string(),
            description: req.description,
            address: req.address,
            client_id: req.client_id,
            status: req.status,
            budget: req.budget,
            start_date: req.start_date,
            end_date: req.end_date,
        },
    )
    .await?;

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "project.created", "project")
            .entity(project.id)
            .details(serde_json::json!({ "name": project.name })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let project = Project::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    Ok(Json(project))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProject>,
) -> ApiResult<Json<Project>> {
    ensure_not_blank("name", req.name.as_deref())?;
    ensure_non_negative("budget", req.budget)?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;
    ensure_client(&state.db, auth.org_id, req.client_id).await?;

    let current = Project::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    ensure_date_order(
        req.start_date.or(current.start_date),
        req.end_date.or(current.end_date),
    )?;

    let status_change = req.status.filter(|s| *s != current.status);

    let project = Project::update(&state.db, auth.org_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    if let Some(status) = status_change {
        activity::record(
            &state.db,
            NewActivity::new(auth.org_id, auth.user_id, "project.status_changed", "project")
                .entity(project.id)
                .details(serde_json::json!({ "from": current.status, "to": status })),
        )
        .await;
    }

    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    if !Project::delete(&state.db, auth.org_id, id).await? {
        return Err(ApiError::not_found("Project"));
    }

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "project.deleted", "project").entity(id),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
