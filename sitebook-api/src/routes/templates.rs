/// Message templates with `{{variable}}` placeholders
///
/// - `GET /v1/templates` (worker)
/// - `POST /v1/templates` (manager)
/// - `PATCH /v1/templates/:id` (manager)
/// - `DELETE /v1/templates/:id` (manager)
/// - `POST /v1/templates/:id/render` (worker): `{ "variables": { "client_name": "Dana" } }`

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
use serde::{Deserialize, Serialize};
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::message_template::{CreateMessageTemplate, MessageTemplate, UpdateMessageTemplate},
    templates::{self, RenderedTemplate},
};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// Template plus the variables it expects
#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    #[serde(flatten)]
    pub template: MessageTemplate,
    pub variables: Vec<String>,
}

impl From<MessageTemplate> for TemplateResponse {
    fn from(template: MessageTemplate) -> Self {
        let variables = template.variables();
        Self { template, variables }
    }
}

pub async fn list_templates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TemplateResponse>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let templates = MessageTemplate::list(&state.db, auth.org_id).await?;
    Ok(Json(templates.into_iter().map(TemplateResponse::from).collect()))
}

pub async fn create_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateMessageTemplate>,
) -> ApiResult<(StatusCode, Json<TemplateResponse>)> {
    if req.name.trim().is_empty() {
        return Err(ApiError::invalid("name", "name is required"));
    }
    if req.body.trim().is_empty() {
        return Err(ApiError::invalid("body", "body is required"));
    }

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let template = MessageTemplate::create(
        &state.db,
        auth.org_id,
        CreateMessageTemplate {
            name: req.name.trim().to_string(),
            ..req
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(template.into())))
}

pub async fn update_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMessageTemplate>,
) -> ApiResult<Json<TemplateResponse>> {
    ensure_not_blank("name", req.name.as_deref())?;
    ensure_not_blank("body", req.body.as_deref())?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let template = MessageTemplate::update(&state.db, auth.org_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Template"))?;

    Ok(Json(template.into()))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    if !MessageTemplate::delete(&state.db, auth.org_id, id).await? {
        return Err(ApiError::not_found("Template"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn render_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenderRequest>,
) -> ApiResult<Json<RenderedTemplate>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let template = MessageTemplate::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Template"))?;

    Ok(Json(templates::render(&template.subject, &template.body, &req.variables)))
}
