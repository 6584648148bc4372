/// Tax rates
///
/// - `GET /v1/tax-rates` (worker)
/// - `POST /v1/tax-rates` (admin)
/// - `PATCH /v1/tax-rates/:id` (admin)
/// - `DELETE /v1/tax-rates/:id` (admin)
/// - `POST /v1/tax-rates/:id/default` (admin): becomes the only default

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::ensure_not_blank,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::{
        activity::{self, NewActivity},
        tax_rate::{rate_in_range, CreateTaxRate, TaxRate, UpdateTaxRate},
    },
};
use uuid::Uuid;

fn ensure_rate(rate: Option<Decimal>) -> ApiResult<()> {
    match rate {
        Some(r) if !rate_in_range(r) => Err(ApiError::invalid("rate", "rate must be between 0 and 100")),
        _ => Ok(()),
    }
}

pub async fn list_tax_rates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TaxRate>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    Ok(Json(TaxRate::list(&state.db, auth.org_id).await?))
}

pub async fn create_tax_rate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaxRate>,
) -> ApiResult<(StatusCode, Json<TaxRate>)> {
    if req.name.trim().is_empty() {
        return Err(ApiError::invalid("name", "name is required"));
    }
    ensure_rate(Some(req.rate))?;

    require_permission(&state.db, &auth, ResourcePermission::Administer).await?;

    let rate = TaxRate::create(
        &state.db,
        auth.org_id,
        CreateTaxRate {
            name: req.name.trim().to_string(),
            ..req
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(rate)))
}

pub async fn update_tax_rate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaxRate>,
) -> ApiResult<Json<TaxRate>> {
    ensure_not_blank("name", req.name.as_deref())?;
    ensure_rate(req.rate)?;

    require_permission(&state.db, &auth, ResourcePermission::Administer).await?;

    let rate = TaxRate::update(&state.db, auth.org_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Tax rate"))?;

    Ok(Json(rate))
}

pub async fn set_default_tax_rate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaxRate>> {
    require_permission(&state.db, &auth, ResourcePermission::Administer).await?;

    let rate = TaxRate::set_default(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tax rate"))?;

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "tax_rate.default_changed", "tax_rate")
            .entity(rate.id)
            .details(serde_json::json!({ "name": rate.name, "rate": rate.rate })),
    )
    .await;

    Ok(Json(rate))
}

pub async fn delete_tax_rate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, ResourcePermission::Administer).await?;

    if !TaxRate::delete(&state.db, auth.org_id, id).await? {
        return Err(ApiError::not_found("Tax rate"));
    }

    Ok(StatusCode::NO_CONTENT)
}
