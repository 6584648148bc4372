/// Subcontractor directory
///
/// - `GET /v1/subcontractors?trade=` (worker)
/// - `POST /v1/subcontractors` (manager)
/// - `GET /v1/subcontractors/:id` (worker)
/// - `PATCH /v1/subcontractors/:id` (manager)
/// - `DELETE /v1/subcontractors/:id` (manager)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{ensure_not_blank, today, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::subcontractor::{CreateSubcontractor, Subcontractor, UpdateSubcontractor},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubcontractorRequest {
    #[validate(length(min = 1, max = 255, message = "Company name must be 1-255 characters"))]
    pub company_name: String,

    pub contact_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub phone: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Trade must be 1-100 characters"))]
    pub trade: String,

    pub license_number: Option<String>,
    pub insurance_expires_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SubcontractorListQuery {
    pub trade: Option<String>,
}

/// Directory entry with the insurance flag computed for today
#[derive(Debug, Serialize)]
pub struct SubcontractorResponse {
    #[serde(flatten)]
    pub subcontractor: Subcontractor,
    pub insurance_lapsed: bool,
}

impl SubcontractorResponse {
    fn new(subcontractor: Subcontractor, today: NaiveDate) -> Self {
        let insurance_lapsed = subcontractor.insurance_lapsed(today);
        Self {
            subcontractor,
            insurance_lapsed,
        }
    }
}

pub async fn list_subcontractors(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
    Query(query): Query<SubcontractorListQuery>,
) -> ApiResult<Json<Vec<SubcontractorResponse>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let today = today();
    let subs = Subcontractor::list(
        &state.db,
        auth.org_id,
        query.trade.as_deref().filter(|t| !t.trim().is_empty()),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(Json(
        subs.into_iter()
            .map(|s| SubcontractorResponse::new(s, today))
            .collect(),
    ))
}

pub async fn create_subcontractor(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateSubcontractorRequest>,
) -> ApiResult<(StatusCode, Json<SubcontractorResponse>)> {
    req.validate()?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let sub = Subcontractor::create(
        &state.db,
        auth.org_id,
        CreateSubcontractor {
            company_name: req.company_name.trim().to_string(),
            contact_name: req.contact_name,
            email: req.email.map(|e| e.to_lowercase()),
            phone: req.phone,
            trade: req.trade.trim().to_string(),
            license_number: req.license_number,
            insurance_expires_on: req.insurance_expires_on,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(SubcontractorResponse::new(sub, today()))))
}

pub async fn get_subcontractor(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SubcontractorResponse>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let sub = Subcontractor::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Subcontractor"))?;

    Ok(Json(SubcontractorResponse::new(sub, today())))
}

pub async fn update_subcontractor(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSubcontractor>,
) -> ApiResult<Json<SubcontractorResponse>> {
    ensure_not_blank("company_name", req.company_name.as_deref())?;
    ensure_not_blank("trade", req.trade.as_deref())?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let sub = Subcontractor::update(&state.db, auth.org_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Subcontractor"))?;

    Ok(Json(SubcontractorResponse::new(sub, today())))
}

pub async fn delete_subcontractor(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    if !Subcontractor::delete(&state.db, auth.org_id, id).await? {
        return Err(ApiError::not_found("Subcontractor"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let req: CreateSubcontractorRequest = serde_json::from_str(
            r#"{"company_name":"Volt Bros","trade":"electrical","email":"not-an-email"}"#,
        )
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));

        let req: CreateSubcontractorRequest =
            serde_json::from_str(r#"{"company_name":"","trade":"drywall"}"#).unwrap();
        assert!(req.validate().unwrap_err().field_errors().contains_key("company_name"));
    }
}
