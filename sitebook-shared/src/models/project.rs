/// Construction projects
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_status AS ENUM ('planning', 'active', 'on_hold', 'completed', 'cancelled');
///
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     address TEXT,
///     client_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     status project_status NOT NULL DEFAULT 'planning',
///     budget NUMERIC(14, 2),
///     start_date DATE,
///     end_date DATE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// `client_id` links the homeowner or customer who sees the project in the
/// client portal.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    /// Open projects still accept time entries and bids
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ProjectStatus::Planning | ProjectStatus::Active | ProjectStatus::OnHold
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub client_id: Option<Uuid>,
    pub status: ProjectStatus,
    pub budget: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub client_id: Option<Uuid>,
    pub status: Option<ProjectStatus>,
    pub budget: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub client_id: Option<Uuid>,
    pub status: Option<ProjectStatus>,
    pub budget: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

const COLUMNS: &str = "id, org_id, name, description, address, client_id, status, budget, \
                       start_date, end_date, created_at, updated_at";

impl Project {
    pub async fn create(pool: &PgPool, org_id: Uuid, data: CreateProject) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "INSERT INTO projects
                 (org_id, name, description, address, client_id, status, budget, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'planning'::project_status), $7, $8, $9)
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.address)
        .bind(data.client_id)
        .bind(data.status)
        .bind(data.budget)
        .bind(data.start_date)
        .bind(data.end_date)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {COLUMNS} FROM projects WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Lists projects, newest first, optionally narrowed to one status
    pub async fn list(
        pool: &PgPool,
        org_id: Uuid,
        status: Option<ProjectStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {COLUMNS} FROM projects
             WHERE org_id = $1 AND ($2::project_status IS NULL OR status = $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(org_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Projects a portal client is attached to
    pub async fn list_for_client(
        pool: &PgPool,
        org_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {COLUMNS} FROM projects
             WHERE org_id = $1 AND client_id = $2
             ORDER BY created_at DESC"
        ))
        .bind(org_id)
        .bind(client_id)
        .fetch_all(pool)
        .await
    }

    /// Finds a project only if `client_id` is its client
    pub async fn find_for_client(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {COLUMNS} FROM projects WHERE org_id = $1 AND id = $2 AND client_id = $3"
        ))
        .bind(org_id)
        .bind(id)
        .bind(client_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "UPDATE projects
             SET name = COALESCE($3, name),
                 description = COALESCE($4, description),
                 address = COALESCE($5, address),
                 client_id = COALESCE($6, client_id),
                 status = COALESCE($7, status),
                 budget = COALESCE($8, budget),
                 start_date = COALESCE($9, start_date),
                 end_date = COALESCE($10, end_date),
                 updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.address)
        .bind(data.client_id)
        .bind(data.status)
        .bind(data.budget)
        .bind(data.start_date)
        .bind(data.end_date)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// True if the project exists in the organization
    pub async fn exists(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE org_id = $1 AND id = $2)")
            .bind(org_id)
            .bind(id)
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(serde_json::to_string(&ProjectStatus::OnHold).unwrap(), "\"on_hold\"");
        let parsed: ProjectStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, ProjectStatus::Cancelled);
    }

    #[test]
    fn test_open_statuses() {
        assert!(ProjectStatus::Active.is_open());
        assert!(ProjectStatus::OnHold.is_open());
        assert!(!ProjectStatus::Completed.is_open());
        assert!(!ProjectStatus::Cancelled.is_open());
    }
}
