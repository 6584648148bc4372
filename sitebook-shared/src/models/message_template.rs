/// Reusable message templates with `{{ variable }}` placeholders
///
/// Template names are unique per organization. Rendering is done by
/// [`crate::templates`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::templates::extract_variables;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageTemplate {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageTemplate {
    /// Variables used by subject and body, in order of first appearance
    pub fn variables(&self) -> Vec<String> {
        let mut vars = extract_variables(&self.subject);
        for name in extract_variables(&self.body) {
            if !vars.contains(&name) {
                vars.push(name);
            }
        }
        vars
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageTemplate {
    pub name: String,
    #[serde(default)]
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMessageTemplate {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

const COLUMNS: &str = "id, org_id, name, subject, body, created_at, updated_at";

impl MessageTemplate {
    pub async fn create(
        pool: &PgPool,
        org_id: Uuid,
        data: CreateMessageTemplate,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, MessageTemplate>(&format!(
            "INSERT INTO message_templates (org_id, name, subject, body)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(data.name)
        .bind(data.subject)
        .bind(data.body)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MessageTemplate>(&format!(
            "SELECT {COLUMNS} FROM message_templates WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(pool: &PgPool, org_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MessageTemplate>(&format!(
            "SELECT {COLUMNS} FROM message_templates WHERE org_id = $1 ORDER BY name"
        ))
        .bind(org_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        data: UpdateMessageTemplate,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MessageTemplate>(&format!(
            "UPDATE message_templates
             SET name = COALESCE($3, name),
                 subject = COALESCE($4, subject),
                 body = COALESCE($5, body),
                 updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(data.name)
        .bind(data.subject)
        .bind(data.body)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM message_templates WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
