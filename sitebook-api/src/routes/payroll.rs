/// Payroll
///
/// - `GET /v1/payroll/config` (manager)
/// - `PUT /v1/payroll/config` (admin)
/// - `POST /v1/payroll/calculate` (manager): price a number of hours
/// - `GET /v1/payroll/report?date=` or `?from=&to=` (manager): per-worker
///   totals for the pay period containing `date` (default today), or for an
///   explicit range

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{ensure_at_most, ensure_date_order, today},
};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::{
        activity::{self, NewActivity},
        membership::Membership,
        payroll_config,
        time_entry::TimeEntry,
    },
    payroll::{
        build_payroll_report, calculate_payroll, max_calculation_hours, max_hourly_rate,
        pay_period_bounds, PayrollCalculation, PayrollConfig, PayrollReport,
    },
};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub total_hours: Decimal,

    /// Explicit rate; otherwise the member's stored rate
    pub hourly_rate: Option<Decimal>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportQuery {
    /// Explicit range wins over the pay period of `date`
    fn bounds(&self, config: &PayrollConfig, today: NaiveDate) -> ApiResult<(NaiveDate, NaiveDate)> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => {
                ensure_date_order(Some(from), Some(to))?;
                Ok((from, to))
            }
            (None, None) => Ok(pay_period_bounds(self.date.unwrap_or(today), config)),
            _ => Err(ApiError::invalid("from", "from and to must be given together")),
        }
    }
}

pub async fn get_config(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<PayrollConfig>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    Ok(Json(payroll_config::load(&state.db, auth.org_id).await?))
}

pub async fn update_config(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(config): Json<PayrollConfig>,
) -> ApiResult<Json<PayrollConfig>> {
    config.validate()?;

    require_permission(&state.db, &auth, ResourcePermission::Administer).await?;

    let saved = payroll_config::save(&state.db, auth.org_id, &config).await?;

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "payroll.config_updated", "payroll_config")
            .details(serde_json::to_value(&saved).unwrap_or_default()),
    )
    .await;

    Ok(Json(saved))
}

pub async fn calculate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CalculateRequest>,
) -> ApiResult<Json<PayrollCalculation>> {
    if req.hourly_rate.is_none() && req.user_id.is_none() {
        return Err(ApiError::invalid("hourly_rate", "hourly_rate or user_id is required"));
    }
    ensure_at_most("total_hours", Some(req.total_hours), max_calculation_hours())?;
    ensure_at_most("hourly_rate", req.hourly_rate, max_hourly_rate())?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let rate = match (req.hourly_rate, req.user_id) {
        (Some(rate), _) => rate,
        (None, Some(user_id)) => Membership::find(&state.db, auth.org_id, user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Member"))?
            .hourly_rate
            .ok_or_else(|| ApiError::invalid("user_id", "member has no hourly rate"))?,
        (None, None) => Decimal::ZERO,
    };

    let config = payroll_config::load(&state.db, auth.org_id).await?;
    Ok(Json(calculate_payroll(req.total_hours, rate, &config)?))
}

pub async fn report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<PayrollReport>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let config = payroll_config::load(&state.db, auth.org_id).await?;
    let (start, end) = query.bounds(&config, today())?;

    let entries = TimeEntry::list_in_range(&state.db, auth.org_id, start, end).await?;
    let members = Membership::list_by_org(&state.db, auth.org_id).await?;

    let report = build_payroll_report(start, end, &entries, &members, &config)?;

    tracing::debug!(
        org_id = %auth.org_id,
        period_start = %start,
        period_end = %end,
        workers = report.lines.len(),
        "Built payroll report"
    );

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_report_bounds_default_to_pay_period() {
        let query = ReportQuery { date: None, from: None, to: None };
        let config = PayrollConfig::default();

        // 2024-01-01 anchor is a Monday; weekly periods run Monday-Sunday
        let (start, end) = query.bounds(&config, date("2025-06-12")).unwrap();
        assert_eq!(start, date("2025-06-09"));
        assert_eq!(end, date("2025-06-15"));
    }

    #[test]
    fn test_report_bounds_explicit_range() {
        let query = ReportQuery {
            date: None,
            from: Some(date("2025-06-01")),
            to: Some(date("2025-06-30")),
        };
        let (start, end) = query.bounds(&PayrollConfig::default(), date("2025-01-01")).unwrap();
        assert_eq!((start, end), (date("2025-06-01"), date("2025-06-30")));

        let half_open = ReportQuery { date: None, from: Some(date("2025-06-01")), to: None };
        assert!(half_open.bounds(&PayrollConfig::default(), date("2025-01-01")).is_err());

        let reversed = ReportQuery {
            date: None,
            from: Some(date("2025-06-30")),
            to: Some(date("2025-06-01")),
        };
        assert!(reversed.bounds(&PayrollConfig::default(), date("2025-01-01")).is_err());
    }
}
