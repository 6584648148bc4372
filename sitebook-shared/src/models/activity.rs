/// Organization activity log
///
/// Call sites opt in by calling [`record`]. Recording never fails the caller:
/// database errors are logged at `warn` and dropped.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE activity_log (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     actor_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     action VARCHAR(100) NOT NULL,
///     entity_type VARCHAR(50) NOT NULL,
///     entity_id UUID,
///     details JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub org_id: Uuid,
    pub actor_id: Option<Uuid>,

    /// Dotted verb, e.g. `invoice.sent`
    pub action: String,

    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Something worth recording
#[derive(Debug, Clone)]
pub struct NewActivity<'a> {
    pub org_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Option<Uuid>,
    pub details: JsonValue,
}

impl<'a> NewActivity<'a> {
    pub fn new(org_id: Uuid, actor_id: Uuid, action: &'a str, entity_type: &'a str) -> Self {
        Self {
            org_id,
            actor_id: Some(actor_id),
            action,
            entity_type,
            entity_id: None,
            details: JsonValue::Object(Default::default()),
        }
    }

    pub fn entity(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }
}

async fn insert(pool: &PgPool, activity: &NewActivity<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO activity_log (org_id, actor_id, action, entity_type, entity_id, details)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(activity.org_id)
    .bind(activity.actor_id)
    .bind(activity.action)
    .bind(activity.entity_type)
    .bind(activity.entity_id)
    .bind(&activity.details)
    .execute(pool)
    .await?;

    Ok(())
}

/// Appends to the activity log; failures are logged, never returned
pub async fn record(pool: &PgPool, activity: NewActivity<'_>) {
    if let Err(e) = insert(pool, &activity).await {
        tracing::warn!(
            org_id = %activity.org_id,
            action = activity.action,
            error = %e,
            "Failed to record activity"
        );
    }
}

/// Newest first
pub async fn list(
    pool: &PgPool,
    org_id: Uuid,
    entity_type: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ActivityEntry>, sqlx::Error> {
    sqlx::query_as::<_, ActivityEntry>(
        "SELECT id, org_id, actor_id, action, entity_type, entity_id, details, created_at
         FROM activity_log
         WHERE org_id = $1 AND ($2::text IS NULL OR entity_type = $2)
         ORDER BY created_at DESC
         LIMIT $3 OFFSET $4",
    )
    .bind(org_id)
    .bind(entity_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}
