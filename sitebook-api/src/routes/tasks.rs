/// Kanban tasks
///
/// - `GET /v1/projects/:id/tasks` (worker)
/// - `POST /v1/projects/:id/tasks` (worker)
/// - `PATCH /v1/tasks/:id` (worker)
/// - `DELETE /v1/tasks/:id` (worker)
/// - `POST /v1/tasks/:id/move` (worker): `{ "status": "review", "position": 0 }`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{ensure_not_blank, ensure_staff},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::{
        activity::{self, NewActivity},
        project::Project,
        task::{CreateTask, Task, TaskStatus, UpdateTask},
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MoveTaskRequest {
    pub status: TaskStatus,

    /// Zero-based slot in the target column; bottom when absent
    #[validate(range(min = 0, message = "Position cannot be negative"))]
    pub position: Option<i32>,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Task>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    if !Project::exists(&state.db, auth.org_id, project_id).await? {
        return Err(ApiError::not_found("Project"));
    }

    Ok(Json(Task::list_by_project(&state.db, auth.org_id, project_id).await?))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;

    require_permission(&state.db, &auth, ResourcePermission::Contribute).await?;

    if !Project::exists(&state.db, auth.org_id, project_id).await? {
        return Err(ApiError::not_found("Project"));
    }
    ensure_staff(&state.db, auth.org_id, "assignee_id", req.assignee_id).await?;

    let task = Task::create(
        &state.db,
        auth.org_id,
        project_id,
        CreateTask {
            title: req.title.trim().to_string(),
            description: req.description,
            status: req.status,
            assignee_id: req.assignee_id,
            due_date: req.due_date,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTask>,
) -> ApiResult<Json<Task>> {
    ensure_not_blank("title", req.title.as_deref())?;

    require_permission(&state.db, &auth, ResourcePermission::Contribute).await?;
    ensure_staff(&state.db, auth.org_id, "assignee_id", req.assignee_id).await?;

    let task = Task::update(&state.db, auth.org_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    Ok(Json(task))
}

pub async fn move_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveTaskRequest>,
) -> ApiResult<Json<Task>> {
    req.validate()?;

    require_permission(&state.db, &auth, ResourcePermission::Contribute).await?;

    let before = Task::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    let task = Task::move_to(&state.db, auth.org_id, id, req.status, req.position)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    if before.status != task.status && task.status.is_done() {
        activity::record(
            &state.db,
            NewActivity::new(auth.org_id, auth.user_id, "task.completed", "task")
                .entity(task.id)
                .details(serde_json::json!({ "title": task.title, "project_id": task.project_id })),
        )
        .await;
    }

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, ResourcePermission::Contribute).await?;

    if !Task::delete(&state.db, auth.org_id, id).await? {
        return Err(ApiError::not_found("Task"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_request_rejects_negative_position() {
        let req: MoveTaskRequest =
            serde_json::from_str(r#"{"status":"in_progress","position":-1}"#).unwrap();
        assert!(req.validate().is_err());

        let req: MoveTaskRequest = serde_json::from_str(r#"{"status":"done"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.status, TaskStatus::Done);
    }
}
