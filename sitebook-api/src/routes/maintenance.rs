/// Equipment and site maintenance records
///
/// - `GET /v1/maintenance?status=` (worker)
/// - `POST /v1/maintenance` (manager)
/// - `GET /v1/maintenance/:id` (worker)
/// - `PATCH /v1/maintenance/:id` (manager); moving to `completed` stamps
///   `completed_at`
/// - `DELETE /v1/maintenance/:id` (manager)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{ensure_non_negative, ensure_not_blank, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::{
        maintenance::{CreateMaintenanceRecord, MaintenanceRecord, MaintenanceStatus, UpdateMaintenanceRecord},
        project::Project,
    },
};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct MaintenanceListQuery {
    pub status: Option<MaintenanceStatus>,
}

async fn ensure_project(state: &AppState, org_id: Uuid, project_id: Option<Uuid>) -> ApiResult<()> {
    match project_id {
        Some(id) if !Project::exists(&state.db, org_id, id).await? => {
            Err(ApiError::invalid("project_id", "project_id does not exist"))
        }
        _ => Ok(()),
    }
}

pub async fn list_records(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
    Query(query): Query<MaintenanceListQuery>,
) -> ApiResult<Json<Vec<MaintenanceRecord>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let records =
        MaintenanceRecord::list(&state.db, auth.org_id, query.status, page.limit(), page.offset()).await?;
    Ok(Json(records))
}

pub async fn create_record(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateMaintenanceRecord>,
) -> ApiResult<(StatusCode, Json<MaintenanceRecord>)> {
    if req.asset_name.trim().is_empty() {
        return Err(ApiError::invalid("asset_name", "asset_name is required"));
    }
    ensure_non_negative("cost", req.cost)?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;
    ensure_project(&state, auth.org_id, req.project_id).await?;

    let record = MaintenanceRecord::create(
        &state.db,
        auth.org_id,
        CreateMaintenanceRecord {
            asset_name: req.asset_name.trim().to_string(),
            ..req
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_record(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MaintenanceRecord>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let record = MaintenanceRecord::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Maintenance record"))?;

    Ok(Json(record))
}

pub async fn update_record(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMaintenanceRecord>,
) -> ApiResult<Json<MaintenanceRecord>> {
    ensure_not_blank("asset_name", req.asset_name.as_deref())?;
    ensure_non_negative("cost", req.cost)?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;
    ensure_project(&state, auth.org_id, req.project_id).await?;

    let record = MaintenanceRecord::update(&state.db, auth.org_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Maintenance record"))?;

    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    if !MaintenanceRecord::delete(&state.db, auth.org_id, id).await? {
        return Err(ApiError::not_found("Maintenance record"));
    }

    Ok(StatusCode::NO_CONTENT)
}
