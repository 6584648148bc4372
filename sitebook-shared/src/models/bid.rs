/// Subcontractor bids on a project trade
///
/// Bids are numbered from the organization's `bid` counter (`BID-00001`).
/// Awarding a bid accepts it and rejects every other submitted bid for the
/// same project and trade, all in one transaction.
///
/// ```text
/// submitted → accepted
///           → rejected
///           → withdrawn
/// ```
///
/// # Schema
///
/// ```sql
/// CREATE TYPE bid_status AS ENUM ('submitted', 'accepted', 'rejected', 'withdrawn');
///
/// CREATE TABLE bids (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     subcontractor_id UUID NOT NULL REFERENCES subcontractors(id) ON DELETE CASCADE,
///     bid_number VARCHAR(40) NOT NULL,
///     trade VARCHAR(100) NOT NULL,
///     amount NUMERIC(14, 2) NOT NULL,
///     status bid_status NOT NULL DEFAULT 'submitted',
///     notes TEXT,
///     submitted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT bids_number_unique UNIQUE (org_id, bid_number)
/// );
/// ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::numbering::{reserve_in_transaction, DocumentType, NumberingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bid_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    Submitted,
    Accepted,
    Rejected,
    Withdrawn,
}

impl BidStatus {
    pub fn can_transition_to(&self, target: BidStatus) -> bool {
        matches!(
            (self, target),
            (BidStatus::Submitted, BidStatus::Accepted)
                | (BidStatus::Submitted, BidStatus::Rejected)
                | (BidStatus::Submitted, BidStatus::Withdrawn)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub subcontractor_id: Uuid,
    pub bid_number: String,
    pub trade: String,
    pub amount: Decimal,
    pub status: BidStatus,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBid {
    pub subcontractor_id: Uuid,
    pub trade: String,
    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBid {
    pub amount: Option<Decimal>,
    pub notes: Option<String>,
    pub status: Option<BidStatus>,
}

/// What happened when awarding a bid
#[derive(Debug, Clone)]
pub enum AwardOutcome {
    NotFound,

    /// Only submitted bids can be awarded
    NotSubmitted(BidStatus),

    Awarded {
        bid: Bid,
        rejected: Vec<Uuid>,
    },
}

const COLUMNS: &str = "id, org_id, project_id, subcontractor_id, bid_number, trade, amount, \
                       status, notes, submitted_at, updated_at";

impl Bid {
    /// Numbers and inserts a bid in one transaction
    pub async fn create(
        pool: &PgPool,
        org_id: Uuid,
        project_id: Uuid,
        data: CreateBid,
    ) -> Result<Self, NumberingError> {
        let mut tx = pool.begin().await?;

        let bid_number = reserve_in_transaction(&mut tx, org_id, DocumentType::Bid).await?;

        let bid = sqlx::query_as::<_, Bid>(&format!(
            "INSERT INTO bids (org_id, project_id, subcontractor_id, bid_number, trade, amount, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(project_id)
        .bind(data.subcontractor_id)
        .bind(&bid_number)
        .bind(data.trade)
        .bind(data.amount)
        .bind(data.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(bid)
    }

    pub async fn find(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Bid>(&format!(
            "SELECT {COLUMNS} FROM bids WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Bids for a project grouped by trade, cheapest first
    pub async fn list_by_project(
        pool: &PgPool,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Bid>(&format!(
            "SELECT {COLUMNS} FROM bids
             WHERE org_id = $1 AND project_id = $2
             ORDER BY trade, amount, submitted_at"
        ))
        .bind(org_id)
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        data: UpdateBid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Bid>(&format!(
            "UPDATE bids
             SET amount = COALESCE($3, amount),
                 notes = COALESCE($4, notes),
                 status = COALESCE($5, status),
                 updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(data.amount)
        .bind(data.notes)
        .bind(data.status)
        .fetch_optional(pool)
        .await
    }

    /// Accepts a bid and rejects its submitted competitors
    pub async fn award(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<AwardOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let bid = sqlx::query_as::<_, Bid>(&format!(
            "SELECT {COLUMNS} FROM bids WHERE org_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(bid) = bid else {
            return Ok(AwardOutcome::NotFound);
        };
        if bid.status != BidStatus::Submitted {
            return Ok(AwardOutcome::NotSubmitted(bid.status));
        }

        let rejected: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE bids SET status = 'rejected', updated_at = NOW()
             WHERE org_id = $1 AND project_id = $2 AND lower(trade) = lower($3)
               AND id <> $4 AND status = 'submitted'
             RETURNING id",
        )
        .bind(org_id)
        .bind(bid.project_id)
        .bind(&bid.trade)
        .bind(bid.id)
        .fetch_all(&mut *tx)
        .await?;

        let bid = sqlx::query_as::<_, Bid>(&format!(
            "UPDATE bids SET status = 'accepted', updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        ))
        .bind(bid.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            bid_id = %bid.id,
            bid_number = %bid.bid_number,
            rejected = rejected.len(),
            "Bid awarded"
        );

        Ok(AwardOutcome::Awarded { bid, rejected })
    }

    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM bids WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
