/// Message threads and messages
///
/// Threads optionally belong to a project; project threads are also visible
/// to that project's portal client. Posting a message bumps the thread's
/// `last_message_at` so inboxes sort by activity.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE message_threads (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     project_id UUID REFERENCES projects(id) ON DELETE CASCADE,
///     subject VARCHAR(255) NOT NULL,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     last_message_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE messages (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     thread_id UUID NOT NULL REFERENCES message_threads(id) ON DELETE CASCADE,
///     sender_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     body TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageThread {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Option<Uuid>,
    pub subject: String,
    pub created_by: Option<Uuid>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub org_id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Option<Uuid>,

    /// Sender's name (or email) at read time
    pub sender_name: Option<String>,

    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateThread {
    pub project_id: Option<Uuid>,
    pub subject: String,

    /// Optional first message
    pub body: Option<String>,
}

const THREAD_COLUMNS: &str = "id, org_id, project_id, subject, created_by, last_message_at, created_at";

const MESSAGE_SELECT: &str = "SELECT m.id, m.org_id, m.thread_id, m.sender_id, \
                              COALESCE(u.name, u.email::text) AS sender_name, m.body, m.created_at \
                              FROM messages m LEFT JOIN users u ON u.id = m.sender_id";

async fn insert_message(
    conn: &mut PgConnection,
    org_id: Uuid,
    thread_id: Uuid,
    sender_id: Uuid,
    body: &str,
) -> Result<Uuid, sqlx::Error> {
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO messages (org_id, thread_id, sender_id, body)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(org_id)
    .bind(thread_id)
    .bind(sender_id)
    .bind(body)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE message_threads SET last_message_at = NOW() WHERE id = $1")
        .bind(thread_id)
        .execute(&mut *conn)
        .await?;

    Ok(id)
}

impl MessageThread {
    /// Opens a thread, posting the first message if one is given
    pub async fn create(
        pool: &PgPool,
        org_id: Uuid,
        created_by: Uuid,
        data: CreateThread,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let thread = sqlx::query_as::<_, MessageThread>(&format!(
            "INSERT INTO message_threads (org_id, project_id, subject, created_by)
             VALUES ($1, $2, $3, $4)
             RETURNING {THREAD_COLUMNS}"
        ))
        .bind(org_id)
        .bind(data.project_id)
        .bind(data.subject)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(body) = data.body.as_deref().filter(|b| !b.trim().is_empty()) {
            insert_message(&mut tx, org_id, thread.id, created_by, body).await?;
        }

        tx.commit().await?;
        Ok(thread)
    }

    pub async fn find(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MessageThread>(&format!(
            "SELECT {THREAD_COLUMNS} FROM message_threads WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Most recently active first
    pub async fn list(
        pool: &PgPool,
        org_id: Uuid,
        project_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MessageThread>(&format!(
            "SELECT {THREAD_COLUMNS} FROM message_threads
             WHERE org_id = $1 AND ($2::uuid IS NULL OR project_id = $2)
             ORDER BY last_message_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(org_id)
        .bind(project_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// The thread a project's client writes into, created on first use
    pub async fn find_or_create_for_project(
        pool: &PgPool,
        org_id: Uuid,
        project_id: Uuid,
        project_name: &str,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let existing = sqlx::query_as::<_, MessageThread>(&format!(
            "SELECT {THREAD_COLUMNS} FROM message_threads
             WHERE org_id = $1 AND project_id = $2
             ORDER BY created_at
             LIMIT 1"
        ))
        .bind(org_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

        match existing {
            Some(thread) => Ok(thread),
            None => {
                let data = CreateThread {
                    project_id: Some(project_id),
                    subject: project_name.to_string(),
                    body: None,
                };
                Self::create(pool, org_id, created_by, data).await
            }
        }
    }
}

impl Message {
    /// Posts into a thread and returns the stored message
    pub async fn post(
        pool: &PgPool,
        org_id: Uuid,
        thread_id: Uuid,
        sender_id: Uuid,
        body: &str,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let id = insert_message(&mut tx, org_id, thread_id, sender_id, body).await?;

        let message = sqlx::query_as::<_, Message>(&format!("{MESSAGE_SELECT} WHERE m.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Oldest first
    pub async fn list_by_thread(
        pool: &PgPool,
        org_id: Uuid,
        thread_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(&format!(
            "{MESSAGE_SELECT}
             WHERE m.org_id = $1 AND m.thread_id = $2
             ORDER BY m.created_at
             LIMIT $3 OFFSET $4"
        ))
        .bind(org_id)
        .bind(thread_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Every message in the threads of a project, oldest first
    pub async fn list_by_project(
        pool: &PgPool,
        org_id: Uuid,
        project_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(&format!(
            "{MESSAGE_SELECT}
             JOIN message_threads t ON t.id = m.thread_id
             WHERE m.org_id = $1 AND t.project_id = $2
             ORDER BY m.created_at
             LIMIT $3 OFFSET $4"
        ))
        .bind(org_id)
        .bind(project_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }
}
