/// Timesheet entries
///
/// One row per worker per day per project. Workers log their own hours;
/// managers approve them before payroll. Editing an approved entry sends it
/// back for approval.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE time_entries (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     project_id UUID REFERENCES projects(id) ON DELETE SET NULL,
///     work_date DATE NOT NULL,
///     hours NUMERIC(6, 2) NOT NULL,  -- 0 < hours <= 24
///     notes TEXT,
///     approved BOOLEAN NOT NULL DEFAULT FALSE,
///     approved_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimeEntry {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub work_date: NaiveDate,
    pub hours: Decimal,
    pub notes: Option<String>,
    pub approved: bool,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTimeEntry {
    pub project_id: Option<Uuid>,
    pub work_date: NaiveDate,
    pub hours: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTimeEntry {
    pub project_id: Option<Uuid>,
    pub work_date: Option<NaiveDate>,
    pub hours: Option<Decimal>,
    pub notes: Option<String>,
}

/// Narrowing for timesheet listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeEntryFilter {
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub approved: Option<bool>,
}

const COLUMNS: &str = "id, org_id, user_id, project_id, work_date, hours, notes, approved, \
                       approved_by, created_at, updated_at";

impl TimeEntry {
    pub async fn create(
        pool: &PgPool,
        org_id: Uuid,
        user_id: Uuid,
        data: CreateTimeEntry,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(&format!(
            "INSERT INTO time_entries (org_id, user_id, project_id, work_date, hours, notes)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(user_id)
        .bind(data.project_id)
        .bind(data.work_date)
        .bind(data.hours)
        .bind(data.notes)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(&format!(
            "SELECT {COLUMNS} FROM time_entries WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Lists entries, most recent work date first
    pub async fn list(
        pool: &PgPool,
        org_id: Uuid,
        filter: &TimeEntryFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(&format!(
            "SELECT {COLUMNS} FROM time_entries
             WHERE org_id = $1
               AND ($2::uuid IS NULL OR user_id = $2)
               AND ($3::uuid IS NULL OR project_id = $3)
               AND ($4::date IS NULL OR work_date >= $4)
               AND ($5::date IS NULL OR work_date <= $5)
               AND ($6::boolean IS NULL OR approved = $6)
             ORDER BY work_date DESC, created_at DESC
             LIMIT $7 OFFSET $8"
        ))
        .bind(org_id)
        .bind(filter.user_id)
        .bind(filter.project_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.approved)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Every entry in `[from, to]`, for payroll
    pub async fn list_in_range(
        pool: &PgPool,
        org_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(&format!(
            "SELECT {COLUMNS} FROM time_entries
             WHERE org_id = $1 AND work_date BETWEEN $2 AND $3
             ORDER BY user_id, work_date"
        ))
        .bind(org_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }

    /// Applies changes and clears any approval
    pub async fn update(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        data: UpdateTimeEntry,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(&format!(
            "UPDATE time_entries
             SET project_id = COALESCE($3, project_id),
                 work_date = COALESCE($4, work_date),
                 hours = COALESCE($5, hours),
                 notes = COALESCE($6, notes),
                 approved = FALSE,
                 approved_by = NULL,
                 updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(data.project_id)
        .bind(data.work_date)
        .bind(data.hours)
        .bind(data.notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn approve(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        approver_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(&format!(
            "UPDATE time_entries
             SET approved = TRUE, approved_by = $3, updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(approver_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM time_entries WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Valid hours for a single day's entry
pub fn hours_in_range(hours: Decimal) -> bool {
    hours > Decimal::ZERO && hours <= Decimal::from(24)
}
