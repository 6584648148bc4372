/// Timesheets
///
/// - `GET /v1/time-entries` (worker: own entries; manager: anyone's)
/// - `POST /v1/time-entries` (worker for self; manager may log for others)
/// - `PATCH /v1/time-entries/:id` (owner of the entry, or manager); editing
///   clears approval
/// - `DELETE /v1/time-entries/:id` (owner of an unapproved entry, or manager)
/// - `POST /v1/time-entries/:id/approve` (manager)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{ensure_staff, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sitebook_shared::{
    auth::{
        authorization::{check_role, require_owner_or, require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::{
        membership::MembershipRole,
        project::Project,
        time_entry::{hours_in_range, CreateTimeEntry, TimeEntry, TimeEntryFilter, UpdateTimeEntry},
    },
    timefmt::format_hours,
};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateTimeEntryRequest {
    /// Defaults to the caller; managers may log for others
    pub user_id: Option<Uuid>,

    pub project_id: Option<Uuid>,
    pub work_date: NaiveDate,
    pub hours: Decimal,
    pub notes: Option<String>,
}

/// Timesheet row with hours formatted for display (`7.5h`)
#[derive(Debug, Serialize)]
pub struct TimeEntryRow {
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub hours_label: String,
}

impl From<TimeEntry> for TimeEntryRow {
    fn from(entry: TimeEntry) -> Self {
        Self {
            hours_label: format_hours(entry.hours),
            entry,
        }
    }
}

fn ensure_hours(hours: Option<Decimal>) -> ApiResult<()> {
    match hours {
        Some(h) if !hours_in_range(h) => Err(ApiError::invalid(
            "hours",
            "hours must be greater than 0 and at most 24",
        )),
        _ => Ok(()),
    }
}

async fn ensure_project(state: &AppState, org_id: Uuid, project_id: Option<Uuid>) -> ApiResult<()> {
    match project_id {
        Some(id) if !Project::exists(&state.db, org_id, id).await? => {
            Err(ApiError::invalid("project_id", "project_id does not exist"))
        }
        _ => Ok(()),
    }
}

pub async fn list_time_entries(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
    Query(mut filter): Query<TimeEntryFilter>,
) -> ApiResult<Json<Vec<TimeEntryRow>>> {
    let role = require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    // Workers only ever see their own timesheet
    if check_role(role, MembershipRole::Manager).is_err() {
        filter.user_id = Some(auth.user_id);
    }

    let entries = TimeEntry::list(&state.db, auth.org_id, &filter, page.limit(), page.offset()).await?;
    Ok(Json(entries.into_iter().map(TimeEntryRow::from).collect()))
}

pub async fn create_time_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTimeEntryRequest>,
) -> ApiResult<(StatusCode, Json<TimeEntry>)> {
    ensure_hours(Some(req.hours))?;

    let user_id = req.user_id.unwrap_or(auth.user_id);
    if user_id == auth.user_id {
        require_permission(&state.db, &auth, ResourcePermission::Contribute).await?;
    } else {
        require_permission(&state.db, &auth, ResourcePermission::Manage).await?;
        ensure_staff(&state.db, auth.org_id, "user_id", Some(user_id)).await?;
    }
    ensure_project(&state, auth.org_id, req.project_id).await?;

    let entry = TimeEntry::create(
        &state.db,
        auth.org_id,
        user_id,
        CreateTimeEntry {
            project_id: req.project_id,
            work_date: req.work_date,
            hours: req.hours,
            notes: req.notes,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn update_time_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTimeEntry>,
) -> ApiResult<Json<TimeEntry>> {
    ensure_hours(req.hours)?;

    let entry = TimeEntry::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Time entry"))?;
    require_owner_or(&state.db, &auth, entry.user_id, ResourcePermission::Manage).await?;
    ensure_project(&state, auth.org_id, req.project_id).await?;

    let updated = TimeEntry::update(&state.db, auth.org_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Time entry"))?;

    Ok(Json(updated))
}

pub async fn approve_time_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TimeEntry>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let entry = TimeEntry::approve(&state.db, auth.org_id, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Time entry"))?;

    tracing::debug!(entry_id = %entry.id, approver = %auth.user_id, "Time entry approved");
    Ok(Json(entry))
}

pub async fn delete_time_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let entry = TimeEntry::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Time entry"))?;

    let role = require_owner_or(&state.db, &auth, entry.user_id, ResourcePermission::Manage).await?;
    if entry.approved && check_role(role, MembershipRole::Manager).is_err() {
        return Err(ApiError::Forbidden(
            "Approved entries can only be deleted by a manager".to_string(),
        ));
    }

    TimeEntry::delete(&state.db, auth.org_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_hours_bounds() {
        assert!(ensure_hours(Some(Decimal::from_str("8.5").unwrap())).is_ok());
        assert!(ensure_hours(Some(Decimal::from(24))).is_ok());
        assert!(ensure_hours(Some(Decimal::ZERO)).is_err());
        assert!(ensure_hours(Some(Decimal::from(25))).is_err());
        assert!(ensure_hours(None).is_ok());
    }

    #[test]
    fn test_row_labels_hours() {
        let now = chrono::Utc::now();
        let entry = TimeEntry {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            project_id: None,
            work_date: NaiveDate::from_ymd_opt(2025, 6, 12).unwrap(),
            hours: Decimal::from_str("7.50").unwrap(),
            notes: None,
            approved: false,
            approved_by: None,
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(TimeEntryRow::from(entry)).unwrap();
        assert_eq!(value["hours_label"], "7.5h");
        assert_eq!(value["hours"], "7.50");
    }
}
