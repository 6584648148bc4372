/// Document numbering
///
/// - `GET /v1/numbering` (manager): settings and next number per type
/// - `PUT /v1/numbering/:doc_type` (admin): change prefix, separator,
///   padding or next number
/// - `POST /v1/numbering/:doc_type/reserve` (manager): hand out the next
///   number for documents created outside SiteBook
///
/// `doc_type` is one of `invoice`, `estimate`, `change_order`,
/// `purchase_order`, `rfi`, `bid`.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::activity::{self, NewActivity},
    numbering::{self, DocumentType, NumberingConfig, NumberingUpdate},
};

#[derive(Debug, Serialize)]
pub struct NumberingEntry {
    pub doc_type: DocumentType,
    #[serde(flatten)]
    pub config: NumberingConfig,

    /// Number the next reservation will return
    pub preview: String,
}

impl NumberingEntry {
    fn new(doc_type: DocumentType, config: NumberingConfig) -> Self {
        let preview = config.preview();
        Self {
            doc_type,
            config,
            preview,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReservedNumber {
    pub doc_type: DocumentType,
    pub number: String,
}

pub async fn list_numbering(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<NumberingEntry>>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let entries = numbering::list_configs(&state.db, auth.org_id)
        .await?
        .into_iter()
        .map(|(doc_type, config)| NumberingEntry::new(doc_type, config))
        .collect();

    Ok(Json(entries))
}

pub async fn configure_numbering(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(doc_type): Path<String>,
    Json(update): Json<NumberingUpdate>,
) -> ApiResult<Json<NumberingEntry>> {
    let doc_type: DocumentType = doc_type.parse()?;

    require_permission(&state.db, &auth, ResourcePermission::Administer).await?;

    let outcome = numbering::configure(&state.db, auth.org_id, doc_type, update).await?;

    if outcome.was_reset_backward() {
        activity::record(
            &state.db,
            NewActivity::new(auth.org_id, auth.user_id, "numbering.reset_backward", "numbering")
                .details(serde_json::json!({
                    "doc_type": doc_type,
                    "from": outcome.previous_next_number,
                    "to": outcome.config.next_number,
                })),
        )
        .await;
    }

    Ok(Json(NumberingEntry::new(doc_type, outcome.config)))
}

pub async fn reserve(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(doc_type): Path<String>,
) -> ApiResult<Json<ReservedNumber>> {
    let doc_type: DocumentType = doc_type.parse()?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let number = state.sequences.reserve(auth.org_id, doc_type).await?;

    tracing::debug!(org_id = %auth.org_id, doc_type = %doc_type, number = %number, "Reserved document number");

    Ok(Json(ReservedNumber { doc_type, number }))
}
