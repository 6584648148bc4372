/// Membership model: user ↔ organization with a role and pay rate
///
/// # Schema
///
/// ```sql
/// CREATE TYPE membership_role AS ENUM ('owner', 'admin', 'manager', 'worker', 'client');
///
/// CREATE TABLE memberships (
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role membership_role NOT NULL DEFAULT 'worker',
///     hourly_rate NUMERIC(10, 2),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (org_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **owner**: everything, including ownership transfer
/// - **admin**: members, numbering, tax rates, payroll settings
/// - **manager**: projects, bids, invoices, timesheet approval
/// - **worker**: tasks, own timesheets, RFIs, messages
/// - **client**: client portal only

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Roles within an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Owner,
    Admin,
    Manager,
    Worker,
    Client,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Owner => "owner",
            MembershipRole::Admin => "admin",
            MembershipRole::Manager => "manager",
            MembershipRole::Worker => "worker",
            MembershipRole::Client => "client",
        }
    }

    /// Staff roles are everything but `Client`
    pub fn is_staff(&self) -> bool {
        !matches!(self, MembershipRole::Client)
    }

    /// Checks if this role meets the required staff role
    ///
    /// Hierarchy: Owner > Admin > Manager > Worker. Clients never satisfy a
    /// staff requirement, and only clients satisfy a client requirement.
    pub fn has_permission(&self, required: &MembershipRole) -> bool {
        match (self, required) {
            (MembershipRole::Client, r) => *r == MembershipRole::Client,
            (_, MembershipRole::Client) => false,
            _ => self.permission_level() >= required.permission_level(),
        }
    }

    fn permission_level(&self) -> u8 {
        match self {
            MembershipRole::Owner => 4,
            MembershipRole::Admin => 3,
            MembershipRole::Manager => 2,
            MembershipRole::Worker => 1,
            MembershipRole::Client => 0,
        }
    }
}

/// Membership row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub role: MembershipRole,

    /// Hourly pay rate used by payroll (None for salaried staff and clients)
    pub hourly_rate: Option<Decimal>,

    pub created_at: DateTime<Utc>,
}

/// Membership joined with the user's contact details
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberDetails {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: MembershipRole,
    pub hourly_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    pub org_id: Uuid,
    pub user_id: Uuid,
    #[serde(default = "default_role")]
    pub role: MembershipRole,
    pub hourly_rate: Option<Decimal>,
}

fn default_role() -> MembershipRole {
    MembershipRole::Worker
}

/// Partial update for a membership
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMembership {
    pub role: Option<MembershipRole>,

    /// `Some(None)` clears the rate
    pub hourly_rate: Option<Option<Decimal>>,
}

const COLUMNS: &str = "org_id, user_id, role, hourly_rate, created_at";

impl Membership {
    /// Adds a user to an organization
    ///
    /// Accepts any executor so registration can run it inside its transaction.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateMembership,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Membership>(&format!(
            "INSERT INTO memberships (org_id, user_id, role, hourly_rate)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        ))
        .bind(data.org_id)
        .bind(data.user_id)
        .bind(data.role)
        .bind(data.hourly_rate)
        .fetch_one(executor)
        .await
    }

    pub async fn find(
        pool: &PgPool,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(&format!(
            "SELECT {COLUMNS} FROM memberships WHERE org_id = $1 AND user_id = $2"
        ))
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Gets a user's role in an organization (None if not a member)
    pub async fn get_role(
        pool: &PgPool,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MembershipRole>, sqlx::Error> {
        sqlx::query_scalar("SELECT role FROM memberships WHERE org_id = $1 AND user_id = $2")
            .bind(org_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Applies a partial update; None if the membership doesn't exist
    pub async fn update(
        pool: &PgPool,
        org_id: Uuid,
        user_id: Uuid,
        data: UpdateMembership,
    ) -> Result<Option<Self>, sqlx::Error> {
        let clear_rate = matches!(data.hourly_rate, Some(None));
        let new_rate = data.hourly_rate.flatten();

        sqlx::query_as::<_, Membership>(&format!(
            "UPDATE memberships
             SET role = COALESCE($3, role),
                 hourly_rate = CASE WHEN $5 THEN NULL ELSE COALESCE($4, hourly_rate) END
             WHERE org_id = $1 AND user_id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(user_id)
        .bind(data.role)
        .bind(new_rate)
        .bind(clear_rate)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, org_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM memberships WHERE org_id = $1 AND user_id = $2")
            .bind(org_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists an organization's members with their contact details
    pub async fn list_by_org(pool: &PgPool, org_id: Uuid) -> Result<Vec<MemberDetails>, sqlx::Error> {
        sqlx::query_as::<_, MemberDetails>(
            r#"
            SELECT m.user_id, u.email::text AS email, u.name, m.role, m.hourly_rate, m.created_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.org_id = $1
            ORDER BY m.role, u.name NULLS LAST, u.email
            "#,
        )
        .bind(org_id)
        .fetch_all(pool)
        .await
    }

    /// Lists the organizations a user belongs to, oldest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(&format!(
            "SELECT {COLUMNS} FROM memberships WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Counts owners, used to refuse removing or demoting the last one
    pub async fn count_owners(pool: &PgPool, org_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM memberships WHERE org_id = $1 AND role = 'owner'")
            .bind(org_id)
            .fetch_one(pool)
            .await
    }
}
