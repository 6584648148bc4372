/// Requests for information
///
/// - `GET /v1/projects/:id/rfis` (worker): filter with `status`, `priority`,
///   `assigned_to`, `search`, `overdue`; order with `sort` (`number`,
///   `due_date`, `created_at`, `priority`) and `desc`
/// - `POST /v1/projects/:id/rfis` (worker): numbered `RFI-00001`
/// - `GET /v1/rfis/:id` (worker)
/// - `PATCH /v1/rfis/:id` (worker)
/// - `DELETE /v1/rfis/:id` (manager)
/// - `POST /v1/rfis/:id/answer` (worker)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{ensure_not_blank, ensure_staff, today},
};
use axum::{
    extract::{Path, Query, State},
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
        rfi::{CreateRfi, Rfi, RfiPriority, RfiStatus, UpdateRfi},
    },
    rfi_query::{self, RfiFilter, RfiSort, RfiSortField},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRfiRequest {
    #[validate(length(min = 1, max = 255, message = "Subject must be 1-255 characters"))]
    pub subject: String,

    #[validate(length(min = 1, message = "Question is required"))]
    pub question: String,

    pub priority: Option<RfiPriority>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnswerRfiRequest {
    #[validate(length(min = 1, message = "Answer is required"))]
    pub answer: String,
}

/// Flat query string for RFI lists
#[derive(Debug, Default, Deserialize)]
pub struct RfiListQuery {
    pub status: Option<RfiStatus>,
    pub priority: Option<RfiPriority>,
    pub assigned_to: Option<Uuid>,
    pub search: Option<String>,
    #[serde(default)]
    pub overdue: bool,
    pub sort: Option<RfiSortField>,
    #[serde(default)]
    pub desc: bool,
}

impl RfiListQuery {
    fn filter(&self) -> RfiFilter {
        RfiFilter {
            status: self.status,
            priority: self.priority,
            assigned_to: self.assigned_to,
            search: self
                .search
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            overdue_only: self.overdue,
        }
    }

    fn sort(&self) -> RfiSort {
        RfiSort {
            field: self.sort.unwrap_or_default(),
            descending: self.desc,
        }
    }
}

pub async fn list_rfis(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<RfiListQuery>,
) -> ApiResult<Json<Vec<Rfi>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    if !Project::exists(&state.db, auth.org_id, project_id).await? {
        return Err(ApiError::not_found("Project"));
    }

    let rfis = Rfi::list_by_project(&state.db, auth.org_id, project_id).await?;
    Ok(Json(rfi_query::apply(rfis, &query.filter(), query.sort(), today())))
}

pub async fn create_rfi(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateRfiRequest>,
) -> ApiResult<(StatusCode, Json<Rfi>)> {
    req.validate()?;

    require_permission(&state.db, &auth, ResourcePermission::Contribute).await?;

    if !Project::exists(&state.db, auth.org_id, project_id).await? {
        return Err(ApiError::not_found("Project"));
    }
    ensure_staff(&state.db, auth.org_id, "assigned_to", req.assigned_to).await?;

    let rfi = Rfi::create(
        &state.db,
        auth.org_id,
        project_id,
        auth.user_id,
        CreateRfi {
            subject: req.subject.trim().to_string(),
            question: req.question,
            priority: req.priority,
            assigned_to: req.assigned_to,
            due_date: req.due_date,
        },
    )
    .await?;

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "rfi.created", "rfi")
            .entity(rfi.id)
            .details(serde_json::json!({ "rfi_number": rfi.rfi_number, "subject": rfi.subject })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(rfi)))
}

pub async fn get_rfi(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Rfi>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let rfi = Rfi::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("RFI"))?;

    Ok(Json(rfi))
}

pub async fn update_rfi(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRfi>,
) -> ApiResult<Json<Rfi>> {
    ensure_not_blank("subject", req.subject.as_deref())?;
    ensure_not_blank("question", req.question.as_deref())?;

    require_permission(&state.db, &auth, ResourcePermission::Contribute).await?;
    ensure_staff(&state.db, auth.org_id, "assigned_to", req.assigned_to).await?;

    let rfi = Rfi::update(&state.db, auth.org_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("RFI"))?;

    Ok(Json(rfi))
}

pub async fn answer_rfi(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<AnswerRfiRequest>,
) -> ApiResult<Json<Rfi>> {
    req.validate()?;

    require_permission(&state.db, &auth, ResourcePermission::Contribute).await?;

    let current = Rfi::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("RFI"))?;
    if current.status == RfiStatus::Closed {
        return Err(ApiError::Conflict("RFI is closed".to_string()));
    }

    let rfi = Rfi::answer(&state.db, auth.org_id, id, req.answer.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("RFI"))?;

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "rfi.answered", "rfi")
            .entity(rfi.id)
            .details(serde_json::json!({ "rfi_number": rfi.rfi_number })),
    )
    .await;

    Ok(Json(rfi))
}

pub async fn delete_rfi(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    if !Rfi::delete(&state.db, auth.org_id, id).await? {
        return Err(ApiError::not_found("RFI"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_maps_to_filter_and_sort() {
        let query = RfiListQuery {
            status: Some(RfiStatus::Open),
            search: Some("  footing ".to_string()),
            overdue: true,
            sort: Some(RfiSortField::DueDate),
            desc: true,
            ..Default::default()
        };

        let filter = query.filter();
        assert_eq!(filter.status, Some(RfiStatus::Open));
        assert_eq!(filter.search.as_deref(), Some("footing"));
        assert!(filter.overdue_only);

        let sort = query.sort();
        assert_eq!(sort.field, RfiSortField::DueDate);
        assert!(sort.descending);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let query = RfiListQuery {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(query.filter().search.is_none());
        assert_eq!(query.sort().field, RfiSortField::Number);
    }
}
