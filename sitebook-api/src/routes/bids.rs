/// Subcontractor bids
///
/// - `GET /v1/projects/:id/bids` (worker)
/// - `POST /v1/projects/:id/bids` (manager): numbered `BID-00001`
/// - `PATCH /v1/bids/:id` (manager): submitted bids only; acceptance goes
///   through award
/// - `DELETE /v1/bids/:id` (manager)
/// - `POST /v1/bids/:id/award` (manager): accepts the bid and rejects the
///   other submitted bids for the same project and trade

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{ensure_at_most, ensure_non_negative},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::{
        activity::{self, NewActivity},
        bid::{AwardOutcome, Bid, BidStatus, CreateBid, UpdateBid},
        invoice::max_amount,
        project::Project,
        subcontractor::Subcontractor,
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBidRequest {
    pub subcontractor_id: Uuid,

    /// Defaults to the subcontractor's trade
    #[validate(length(min = 1, max = 100, message = "Trade must be 1-100 characters"))]
    pub trade: Option<String>,

    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AwardResponse {
    pub bid: Bid,

    /// Competing bids that were rejected
    pub rejected: Vec<Uuid>,
}

/// Manual status edits may withdraw or reject, never accept
fn check_status_edit(current: BidStatus, target: Option<BidStatus>) -> ApiResult<()> {
    if current != BidStatus::Submitted {
        return Err(ApiError::Conflict(format!(
            "Bid is {:?} and can no longer be changed",
            current
        )));
    }
    match target {
        Some(BidStatus::Accepted) => Err(ApiError::invalid(
            "status",
            "Use the award endpoint to accept a bid",
        )),
        Some(t) if t != current && !current.can_transition_to(t) => {
            Err(ApiError::invalid("status", "Invalid status transition"))
        }
        _ => Ok(()),
    }
}

pub async fn list_bids(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Bid>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    if !Project::exists(&state.db, auth.org_id, project_id).await? {
        return Err(ApiError::not_found("Project"));
    }

    Ok(Json(Bid::list_by_project(&state.db, auth.org_id, project_id).await?))
}

pub async fn create_bid(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateBidRequest>,
) -> ApiResult<(StatusCode, Json<Bid>)> {
    req.validate()?;
    ensure_non_negative("amount", Some(req.amount))?;
    ensure_at_most("amount", Some(req.amount), max_amount())?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    if !Project::exists(&state.db, auth.org_id, project_id).await? {
        return Err(ApiError::not_found("Project"));
    }
    let sub = Subcontractor::find(&state.db, auth.org_id, req.subcontractor_id)
        .await?
        .ok_or_else(|| ApiError::invalid("subcontractor_id", "subcontractor_id does not exist"))?;

    let trade = req
        .trade
        .map(|t| t.trim().to_string())
        .unwrap_or_else(|| sub.trade.clone());

    let bid = Bid::create(
        &state.db,
        auth.org_id,
        project_id,
        CreateBid {
            subcontractor_id: sub.id,
            trade,
            amount: req.amount,
            notes: req.notes,
        },
    )
    .await?;

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "bid.created", "bid")
            .entity(bid.id)
            .details(serde_json::json!({
                "bid_number": bid.bid_number,
                "subcontractor": sub.company_name,
                "amount": bid.amount,
            })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(bid)))
}

pub async fn update_bid(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBid>,
) -> ApiResult<Json<Bid>> {
    ensure_non_negative("amount", req.amount)?;
    ensure_at_most("amount", req.amount, max_amount())?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let current = Bid::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Bid"))?;
    check_status_edit(current.status, req.status)?;

    let bid = Bid::update(&state.db, auth.org_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Bid"))?;

    Ok(Json(bid))
}

pub async fn award_bid(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AwardResponse>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    match Bid::award(&state.db, auth.org_id, id).await? {
        AwardOutcome::NotFound => Err(ApiError::not_found("Bid")),
        AwardOutcome::NotSubmitted(status) => Err(ApiError::Conflict(format!(
            "Only submitted bids can be awarded (bid is {:?})",
            status
        ))),
        AwardOutcome::Awarded { bid, rejected } => {
            activity::record(
                &state.db,
                NewActivity::new(auth.org_id, auth.user_id, "bid.awarded", "bid")
                    .entity(bid.id)
                    .details(serde_json::json!({
                        "bid_number": bid.bid_number,
                        "trade": bid.trade,
                        "amount": bid.amount,
                        "rejected": rejected.len(),
                    })),
            )
            .await;

            Ok(Json(AwardResponse { bid, rejected }))
        }
    }
}

pub async fn delete_bid(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    if !Bid::delete(&state.db, auth.org_id, id).await? {
        return Err(ApiError::not_found("Bid"));
    }

    Ok(StatusCode::NO_CONTENT)
}
