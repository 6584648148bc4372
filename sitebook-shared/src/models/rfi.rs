/// Requests for information
///
/// RFIs are numbered from the organization's `rfi` counter. Answering an RFI
/// records the answer and moves it to `answered`; closing is a separate edit.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE rfi_status AS ENUM ('open', 'answered', 'closed');
/// CREATE TYPE rfi_priority AS ENUM ('low', 'medium', 'high', 'urgent');
///
/// CREATE TABLE rfis (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     rfi_number VARCHAR(40) NOT NULL,
///     subject VARCHAR(255) NOT NULL,
///     question TEXT NOT NULL,
///     answer TEXT,
///     status rfi_status NOT NULL DEFAULT 'open',
///     priority rfi_priority NOT NULL DEFAULT 'medium',
///     assigned_to UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     due_date DATE,
///     answered_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT rfis_number_unique UNIQUE (org_id, rfi_number)
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::numbering::{reserve_in_transaction, DocumentType, NumberingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rfi_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RfiStatus {
    Open,
    Answered,
    Closed,
}

/// Priority, ordered `Low < Medium < High < Urgent`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "rfi_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RfiPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rfi {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub rfi_number: String,
    pub subject: String,
    pub question: String,
    pub answer: Option<String>,
    pub status: RfiStatus,
    pub priority: RfiPriority,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub answered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRfi {
    pub subject: String,
    pub question: String,
    pub priority: Option<RfiPriority>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRfi {
    pub subject: Option<String>,
    pub question: Option<String>,
    pub status: Option<RfiStatus>,
    pub priority: Option<RfiPriority>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

const COLUMNS: &str = "id, org_id, project_id, rfi_number, subject, question, answer, status, \
                       priority, assigned_to, created_by, due_date, answered_at, created_at, updated_at";

impl Rfi {
    /// Numbers and inserts an RFI in one transaction
    pub async fn create(
        pool: &PgPool,
        org_id: Uuid,
        project_id: Uuid,
        created_by: Uuid,
        data: CreateRfi,
    ) -> Result<Self, NumberingError> {
        let mut tx = pool.begin().await?;

        let rfi_number = reserve_in_transaction(&mut tx, org_id, DocumentType::Rfi).await?;

        let rfi = sqlx::query_as::<_, Rfi>(&format!(
            "INSERT INTO rfis
                 (org_id, project_id, rfi_number, subject, question, priority, assigned_to, created_by, due_date)
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'medium'::rfi_priority), $7, $8, $9)
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(project_id)
        .bind(&rfi_number)
        .bind(data.subject)
        .bind(data.question)
        .bind(data.priority)
        .bind(data.assigned_to)
        .bind(created_by)
        .bind(data.due_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rfi)
    }

    pub async fn find(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Rfi>(&format!(
            "SELECT {COLUMNS} FROM rfis WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// All RFIs on a project; filtering and sorting happen in `rfi_query`
    pub async fn list_by_project(
        pool: &PgPool,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Rfi>(&format!(
            "SELECT {COLUMNS} FROM rfis WHERE org_id = $1 AND project_id = $2 ORDER BY created_at"
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
        data: UpdateRfi,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Rfi>(&format!(
            "UPDATE rfis
             SET subject = COALESCE($3, subject),
                 question = COALESCE($4, question),
                 status = COALESCE($5, status),
                 priority = COALESCE($6, priority),
                 assigned_to = COALESCE($7, assigned_to),
                 due_date = COALESCE($8, due_date),
                 updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(data.subject)
        .bind(data.question)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.assigned_to)
        .bind(data.due_date)
        .fetch_optional(pool)
        .await
    }

    /// Records an answer; re-answering replaces the previous one
    pub async fn answer(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        answer: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Rfi>(&format!(
            "UPDATE rfis
             SET answer = $3, status = 'answered', answered_at = NOW(), updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(answer)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rfis WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
