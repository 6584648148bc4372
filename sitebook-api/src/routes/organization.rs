/// The caller's organization
///
/// - `GET /v1/organization` (worker)
/// - `PATCH /v1/organization` (admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::{
        activity::{self, NewActivity},
        organization::{Organization, UpdateOrganization},
    },
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrganizationRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 50, message = "Phone must be at most 50 characters"))]
    pub phone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub address: Option<String>,

    /// Merged key-by-key into the stored settings
    pub settings: Option<JsonValue>,
}

pub async fn get_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Organization>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let org = Organization::find_by_id(&state.db, auth.org_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization"))?;

    Ok(Json(org))
}

pub async fn update_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> ApiResult<Json<Organization>> {
    req.validate()?;
    if req.settings.as_ref().is_some_and(|s| !s.is_object()) {
        return Err(ApiError::invalid("settings", "settings must be a JSON object"));
    }

    require_permission(&state.db, &auth, ResourcePermission::Administer).await?;

    let org = Organization::update(
        &state.db,
        auth.org_id,
        UpdateOrganization {
            name: req.name,
            phone: req.phone,
            email: req.email,
            address: req.address,
            settings: req.settings,
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Organization"))?;

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "organization.updated", "organization").entity(org.id),
    )
    .await;

    Ok(Json(org))
}
