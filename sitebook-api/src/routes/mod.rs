/// API route handlers, one module per resource
///
/// Every handler under `/v1` (except `auth`) runs behind the JWT layer and
/// receives `Extension<AuthContext>`. Request bodies are validated before the
/// role check so malformed input is reported the same way to every caller.

pub mod activity;
pub mod auth;
pub mod bids;
pub mod changes;
pub mod health;
pub mod invoices;
pub mod maintenance;
pub mod members;
pub mod messages;
pub mod numbering;
pub mod organization;
pub mod payroll;
pub mod portal;
pub mod projects;
pub mod rfis;
pub mod subcontractors;
pub mod tasks;
pub mod tax_rates;
pub mod templates;
pub mod time_entries;

use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sitebook_shared::{models::membership::Membership, timefmt::format_relative};
use sqlx::PgPool;
use uuid::Uuid;

/// `?limit=&offset=` on list endpoints
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    /// Requested limit clamped to `1..=MAX_LIMIT`
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Rejects blank optional strings on partial updates
pub(crate) fn ensure_not_blank(field: &str, value: Option<&str>) -> ApiResult<()> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ApiError::invalid(field, format!("{} cannot be blank", field))),
        _ => Ok(()),
    }
}

pub(crate) fn ensure_non_negative(field: &str, value: Option<Decimal>) -> ApiResult<()> {
    match value {
        Some(v) if v < Decimal::ZERO => {
            Err(ApiError::invalid(field, format!("{} cannot be negative", field)))
        }
        _ => Ok(()),
    }
}

/// A feed record with a short label for when it happened (`5m ago`)
#[derive(Debug, Serialize)]
pub struct Dated<T> {
    #[serde(flatten)]
    pub record: T,
    pub when: String,
}

impl<T> Dated<T> {
    pub(crate) fn new(record: T, at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            record,
            when: format_relative(at, now),
        }
    }
}

pub(crate) fn ensure_at_most(field: &str, value: Option<Decimal>, max: Decimal) -> ApiResult<()> {
    match value {
        Some(v) if v > max => Err(ApiError::invalid(field, format!("{} must be at most {}", field, max))),
        _ => Ok(()),
    }
}

/// Start must not come after end when both are given
pub(crate) fn ensure_date_order(start: Option<NaiveDate>, end: Option<NaiveDate>) -> ApiResult<()> {
    match (start, end) {
        (Some(s), Some(e)) if s > e => Err(ApiError::invalid(
            "end_date",
            "end_date must not be before start_date",
        )),
        _ => Ok(()),
    }
}

/// An assignee must be a staff member of the organization
pub(crate) async fn ensure_staff(pool: &PgPool, org_id: Uuid, field: &str, user_id: Option<Uuid>) -> ApiResult<()> {
    let Some(user_id) = user_id else {
        return Ok(());
    };

    match Membership::get_role(pool, org_id, user_id).await? {
        Some(role) if role.is_staff() => Ok(()),
        _ => Err(ApiError::invalid(field, format!("{} must be a staff member of this organization", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_pagination_defaults_and_clamping() {
        let p = Pagination::default();
        assert_eq!(p.limit(), 50);
        assert_eq!(p.offset(), 0);

        let p = Pagination { limit: Some(1000), offset: Some(-5) };
        assert_eq!(p.limit(), 200);
        assert_eq!(p.offset(), 0);

        let p = Pagination { limit: Some(0), offset: Some(40) };
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn test_field_checks() {
        assert!(ensure_not_blank("name", Some("  ")).is_err());
        assert!(ensure_not_blank("name", None).is_ok());
        assert!(ensure_non_negative("budget", Some(Decimal::from_str("-0.01").unwrap())).is_err());
        assert!(ensure_non_negative("budget", Some(Decimal::ZERO)).is_ok());

        let d = |s: &str| NaiveDate::from_str(s).ok();
        assert!(ensure_date_order(d("2025-03-02"), d("2025-03-01")).is_err());
        assert!(ensure_date_order(d("2025-03-01"), d("2025-03-01")).is_ok());
        assert!(ensure_date_order(None, d("2025-03-01")).is_ok());

        assert!(ensure_at_most("quantity", Some(Decimal::from(10)), Decimal::from(10)).is_ok());
        assert!(ensure_at_most("quantity", Some(Decimal::from(11)), Decimal::from(10)).is_err());
        assert!(ensure_at_most("quantity", None, Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_dated_flattens_record() {
        let now = Utc::now();
        let dated = Dated::new(
            serde_json::json!({ "id": 7, "body": "Pour scheduled" }),
            now - chrono::Duration::minutes(5),
            now,
        );

        let value = serde_json::to_value(&dated).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["body"], "Pour scheduled");
        assert_eq!(value["when"], "5m ago");
    }
}
