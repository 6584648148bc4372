/// Organization model (the tenant boundary)
///
/// Every other record carries an `org_id` pointing here; deleting an
/// organization cascades to all of its data.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE organizations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     phone VARCHAR(50),
///     email VARCHAR(255),
///     address TEXT,
///     settings JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Organization row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,

    /// Free-form settings (branding, default payment terms)
    pub settings: JsonValue,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
}

/// Partial update; settings are merged into the existing object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub settings: Option<JsonValue>,
}

const COLUMNS: &str = "id, name, phone, email, address, settings, created_at, updated_at";

impl Organization {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateOrganization,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "INSERT INTO organizations (name) VALUES ($1) RETURNING {COLUMNS}"
        ))
        .bind(data.name)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "SELECT {COLUMNS} FROM organizations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Updates the supplied fields; None if the organization doesn't exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateOrganization,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "UPDATE organizations
             SET name = COALESCE($2, name),
                 phone = COALESCE($3, phone),
                 email = COALESCE($4, email),
                 address = COALESCE($5, address),
                 settings = settings || COALESCE($6, '{{}}'::jsonb),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(data.name)
        .bind(data.phone)
        .bind(data.email)
        .bind(data.address)
        .bind(data.settings)
        .fetch_optional(pool)
        .await
    }

    /// Deletes an organization and, by cascade, all of its data
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
