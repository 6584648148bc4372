/// Subcontractor directory
///
/// # Schema
///
/// ```sql
/// CREATE TABLE subcontractors (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     company_name VARCHAR(255) NOT NULL,
///     contact_name VARCHAR(255),
///     email VARCHAR(255),
///     phone VARCHAR(50),
///     trade VARCHAR(100) NOT NULL,
///     license_number VARCHAR(100),
///     insurance_expires_on DATE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subcontractor {
    pub id: Uuid,
    pub org_id: Uuid,
    pub company_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,

    /// Trade they bid on, e.g. "electrical", "drywall"
    pub trade: String,

    pub license_number: Option<String>,
    pub insurance_expires_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subcontractor {
    /// Insurance lapsed, or unknown
    pub fn insurance_lapsed(&self, today: NaiveDate) -> bool {
        self.insurance_expires_on.map_or(true, |expires| expires < today)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubcontractor {
    pub company_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub trade: String,
    pub license_number: Option<String>,
    pub insurance_expires_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubcontractor {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub trade: Option<String>,
    pub license_number: Option<String>,
    pub insurance_expires_on: Option<NaiveDate>,
}

const COLUMNS: &str = "id, org_id, company_name, contact_name, email, phone, trade, \
                       license_number, insurance_expires_on, created_at, updated_at";

impl Subcontractor {
    pub async fn create(
        pool: &PgPool,
        org_id: Uuid,
        data: CreateSubcontractor,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Subcontractor>(&format!(
            "INSERT INTO subcontractors
                 (org_id, company_name, contact_name, email, phone, trade, license_number, insurance_expires_on)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(data.company_name)
        .bind(data.contact_name)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.trade)
        .bind(data.license_number)
        .bind(data.insurance_expires_on)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subcontractor>(&format!(
            "SELECT {COLUMNS} FROM subcontractors WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Lists subcontractors alphabetically, optionally for one trade
    pub async fn list(
        pool: &PgPool,
        org_id: Uuid,
        trade: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subcontractor>(&format!(
            "SELECT {COLUMNS} FROM subcontractors
             WHERE org_id = $1 AND ($2::text IS NULL OR lower(trade) = lower($2))
             ORDER BY company_name
             LIMIT $3 OFFSET $4"
        ))
        .bind(org_id)
        .bind(trade)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        data: UpdateSubcontractor,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subcontractor>(&format!(
            "UPDATE subcontractors
             SET company_name = COALESCE($3, company_name),
                 contact_name = COALESCE($4, contact_name),
                 email = COALESCE($5, email),
                 phone = COALESCE($6, phone),
                 trade = COALESCE($7, trade),
                 license_number = COALESCE($8, license_number),
                 insurance_expires_on = COALESCE($9, insurance_expires_on),
                 updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(data.company_name)
        .bind(data.contact_name)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.trade)
        .bind(data.license_number)
        .bind(data.insurance_expires_on)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM subcontractors WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
