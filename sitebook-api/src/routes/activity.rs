/// Audit trail
///
/// `GET /v1/activity?entity_type=&limit=&offset=` (admin), newest first.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{Dated, Pagination},
};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::activity::{self, ActivityEntry},
};

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub entity_type: Option<String>,
}

pub async fn list_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<Vec<Dated<ActivityEntry>>>> {
    require_permission(&state.db, &auth, ResourcePermission::Administer).await?;

    let entries = activity::list(
        &state.db,
        auth.org_id,
        query.entity_type.as_deref(),
        page.limit(),
        page.offset(),
    )
    .await?;

    let now = Utc::now();
    Ok(Json(
        entries
            .into_iter()
            .map(|e| {
                let at = e.created_at;
                Dated::new(e, at, now)
            })
            .collect(),
    ))
}
