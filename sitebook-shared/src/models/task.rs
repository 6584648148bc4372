/// Kanban tasks within a project
///
/// Tasks sit in one of four columns and are ordered by `position` inside a
/// column.
///
/// ```text
/// todo → in_progress → review → done
/// ```
///
/// Any column may move to any other; the board is not a strict state machine.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'review', 'done');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'todo',
///     position INTEGER NOT NULL DEFAULT 0,
///     assignee_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     due_date DATE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Kanban column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,

    /// Order within the column, 0 at the top
    pub position: i32,

    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Past due and not yet done
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status.is_done() && self.due_date.is_some_and(|due| due < today)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

const COLUMNS: &str = "id, org_id, project_id, title, description, status, position, \
                       assignee_id, due_date, created_at, updated_at";

impl Task {
    /// Creates a task at the bottom of its column
    pub async fn create(
        pool: &PgPool,
        org_id: Uuid,
        project_id: Uuid,
        data: CreateTask,
    ) -> Result<Self, sqlx::Error> {
        let status = data.status.unwrap_or(TaskStatus::Todo);

        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (org_id, project_id, title, description, status, position, assignee_id, due_date)
             VALUES ($1, $2, $3, $4, $5,
                     (SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE project_id = $2 AND status = $5),
                     $6, $7)
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(project_id)
        .bind(data.title)
        .bind(data.description)
        .bind(status)
        .bind(data.assignee_id)
        .bind(data.due_date)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {COLUMNS} FROM tasks WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// The whole board for a project, column by column
    pub async fn list_by_project(
        pool: &PgPool,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {COLUMNS} FROM tasks
             WHERE org_id = $1 AND project_id = $2
             ORDER BY status, position, created_at"
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
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks
             SET title = COALESCE($3, title),
                 description = COALESCE($4, description),
                 assignee_id = COALESCE($5, assignee_id),
                 due_date = COALESCE($6, due_date),
                 updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.assignee_id)
        .bind(data.due_date)
        .fetch_optional(pool)
        .await
    }

    /// Moves a task to `status` at `position`, shifting the cards below it
    ///
    /// Without a position the task goes to the bottom of the target column.
    pub async fn move_to(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        status: TaskStatus,
        position: Option<i32>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let project_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT project_id FROM tasks WHERE org_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(org_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(project_id) = project_id else {
            return Ok(None);
        };

        let bottom: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM tasks
             WHERE project_id = $1 AND status = $2 AND id <> $3",
        )
        .bind(project_id)
        .bind(status)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let target = position.map_or(bottom, |p| p.clamp(0, bottom));

        sqlx::query(
            "UPDATE tasks SET position = position + 1
             WHERE project_id = $1 AND status = $2 AND position >= $3 AND id <> $4",
        )
        .bind(project_id)
        .bind(status)
        .bind(target)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let task = sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET status = $3, position = $4, updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(status)
        .bind(target)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(task))
    }

    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
