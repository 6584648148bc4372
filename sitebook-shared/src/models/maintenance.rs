/// Equipment and site maintenance records
///
/// # Schema
///
/// ```sql
/// CREATE TYPE maintenance_status AS ENUM ('scheduled', 'in_progress', 'completed', 'cancelled');
///
/// CREATE TABLE maintenance_records (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     project_id UUID REFERENCES projects(id) ON DELETE SET NULL,
///     asset_name VARCHAR(255) NOT NULL,
///     description TEXT,
///     status maintenance_status NOT NULL DEFAULT 'scheduled',
///     scheduled_date DATE,
///     completed_at TIMESTAMPTZ,
///     cost NUMERIC(12, 2),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "maintenance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MaintenanceRecord {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Option<Uuid>,
    pub asset_name: String,
    pub description: Option<String>,
    pub status: MaintenanceStatus,
    pub scheduled_date: Option<NaiveDate>,

    /// Set the first time the record reaches `completed`
    pub completed_at: Option<DateTime<Utc>>,

    pub cost: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMaintenanceRecord {
    pub project_id: Option<Uuid>,
    pub asset_name: String,
    pub description: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub cost: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMaintenanceRecord {
    pub project_id: Option<Uuid>,
    pub asset_name: Option<String>,
    pub description: Option<String>,
    pub status: Option<MaintenanceStatus>,
    pub scheduled_date: Option<NaiveDate>,
    pub cost: Option<Decimal>,
}

const COLUMNS: &str = "id, org_id, project_id, asset_name, description, status, scheduled_date, \
                       completed_at, cost, created_at, updated_at";

impl MaintenanceRecord {
    pub async fn create(
        pool: &PgPool,
        org_id: Uuid,
        data: CreateMaintenanceRecord,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, MaintenanceRecord>(&format!(
            "INSERT INTO maintenance_records (org_id, project_id, asset_name, description, scheduled_date, cost)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(data.project_id)
        .bind(data.asset_name)
        .bind(data.description)
        .bind(data.scheduled_date)
        .bind(data.cost)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MaintenanceRecord>(&format!(
            "SELECT {COLUMNS} FROM maintenance_records WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Soonest scheduled first; unscheduled records last
    pub async fn list(
        pool: &PgPool,
        org_id: Uuid,
        status: Option<MaintenanceStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MaintenanceRecord>(&format!(
            "SELECT {COLUMNS} FROM maintenance_records
             WHERE org_id = $1 AND ($2::maintenance_status IS NULL OR status = $2)
             ORDER BY scheduled_date NULLS LAST, created_at
             LIMIT $3 OFFSET $4"
        ))
        .bind(org_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        data: UpdateMaintenanceRecord,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MaintenanceRecord>(&format!(
            "UPDATE maintenance_records
             SET project_id = COALESCE($3, project_id),
                 asset_name = COALESCE($4, asset_name),
                 description = COALESCE($5, description),
                 status = COALESCE($6, status),
                 scheduled_date = COALESCE($7, scheduled_date),
                 cost = COALESCE($8, cost),
                 completed_at = CASE
                     WHEN COALESCE($6, status) = 'completed' THEN COALESCE(completed_at, NOW())
                     ELSE completed_at
                 END,
                 updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(data.project_id)
        .bind(data.asset_name)
        .bind(data.description)
        .bind(data.status)
        .bind(data.scheduled_date)
        .bind(data.cost)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM maintenance_records WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&MaintenanceStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }

    #[test]
    fn test_create_accepts_minimal_body() {
        let data: CreateMaintenanceRecord =
            serde_json::from_str(r#"{"asset_name":"Skid steer #2"}"#).unwrap();
        assert_eq!(data.asset_name, "Skid steer #2");
        assert!(data.scheduled_date.is_none());
    }
}
