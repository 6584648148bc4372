/// Sales tax rates applied to invoices
///
/// At most one rate per organization is the default. Marking a rate as
/// default clears the flag on every other rate in the same transaction, and
/// the partial unique index `idx_tax_rates_one_default` rejects anything that
/// slips past.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tax_rates (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     name VARCHAR(100) NOT NULL,
///     rate NUMERIC(6, 3) NOT NULL,   -- percent, 0..=100
///     is_default BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE UNIQUE INDEX idx_tax_rates_one_default ON tax_rates(org_id) WHERE is_default;
/// ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaxRate {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,

    /// Percent, e.g. `8.25`
    pub rate: Decimal,

    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaxRate {
    pub name: String,
    pub rate: Decimal,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaxRate {
    pub name: Option<String>,
    pub rate: Option<Decimal>,
}

const COLUMNS: &str = "id, org_id, name, rate, is_default, created_at, updated_at";

/// Serializes default changes per organization by locking its row, then
/// clears the current default
async fn clear_default(conn: &mut PgConnection, org_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT id FROM organizations WHERE id = $1 FOR UPDATE")
        .bind(org_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "UPDATE tax_rates SET is_default = FALSE, updated_at = NOW()
         WHERE org_id = $1 AND is_default",
    )
    .bind(org_id)
    .execute(conn)
    .await?;

    Ok(())
}

impl TaxRate {
    /// Creates a rate; a default rate displaces the previous default
    pub async fn create(pool: &PgPool, org_id: Uuid, data: CreateTaxRate) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if data.is_default {
            clear_default(&mut tx, org_id).await?;
        }

        let rate = sqlx::query_as::<_, TaxRate>(&format!(
            "INSERT INTO tax_rates (org_id, name, rate, is_default)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(data.name)
        .bind(data.rate)
        .bind(data.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rate)
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaxRate>(&format!(
            "SELECT {COLUMNS} FROM tax_rates WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// The organization's default rate, if one is set
    pub async fn find_default<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaxRate>(&format!(
            "SELECT {COLUMNS} FROM tax_rates WHERE org_id = $1 AND is_default"
        ))
        .bind(org_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list(pool: &PgPool, org_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaxRate>(&format!(
            "SELECT {COLUMNS} FROM tax_rates WHERE org_id = $1 ORDER BY is_default DESC, name"
        ))
        .bind(org_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        data: UpdateTaxRate,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaxRate>(&format!(
            "UPDATE tax_rates
             SET name = COALESCE($3, name),
                 rate = COALESCE($4, rate),
                 updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(data.name)
        .bind(data.rate)
        .fetch_optional(pool)
        .await
    }

    /// Makes `id` the only default rate of the organization
    pub async fn set_default(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        clear_default(&mut tx, org_id).await?;

        if Self::find(&mut *tx, org_id, id).await?.is_none() {
            return Ok(None);
        }

        let rate = sqlx::query_as::<_, TaxRate>(&format!(
            "UPDATE tax_rates SET is_default = TRUE, updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(rate))
    }

    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tax_rates WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Valid tax percentage
pub fn rate_in_range(rate: Decimal) -> bool {
    rate >= Decimal::ZERO && rate <= Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_in_range() {
        assert!(rate_in_range(Decimal::ZERO));
        assert!(rate_in_range("8.25".parse().unwrap()));
        assert!(rate_in_range(Decimal::ONE_HUNDRED));
        assert!(!rate_in_range("100.001".parse().unwrap()));
        assert!(!rate_in_range("-0.5".parse().unwrap()));
    }

    #[test]
    fn test_create_defaults_to_not_default() {
        let data: CreateTaxRate = serde_json::from_str(r#"{"name":"County","rate":"7.5"}"#).unwrap();
        assert!(!data.is_default);
    }
}
