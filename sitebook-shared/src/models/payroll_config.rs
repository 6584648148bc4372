/// Per-organization payroll settings (`payroll_configs`)
///
/// Organizations that never saved settings get [`PayrollConfig::default`].

use sqlx::PgPool;
use uuid::Uuid;

use crate::payroll::PayrollConfig;

const COLUMNS: &str = "overtime_threshold_hours, overtime_multiplier, pay_period, period_anchor";

/// Loads the organization's settings, falling back to defaults
pub async fn load(pool: &PgPool, org_id: Uuid) -> Result<PayrollConfig, sqlx::Error> {
    let config = sqlx::query_as::<_, PayrollConfig>(&format!(
        "SELECT {COLUMNS} FROM payroll_configs WHERE org_id = $1"
    ))
    .bind(org_id)
    .fetch_optional(pool)
    .await?;

    Ok(config.unwrap_or_default())
}

/// Inserts or replaces the organization's settings
pub async fn save(
    pool: &PgPool,
    org_id: Uuid,
    config: &PayrollConfig,
) -> Result<PayrollConfig, sqlx::Error> {
    sqlx::query_as::<_, PayrollConfig>(&format!(
        "INSERT INTO payroll_configs
             (org_id, overtime_threshold_hours, overtime_multiplier, pay_period, period_anchor)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (org_id) DO UPDATE
         SET overtime_threshold_hours = EXCLUDED.overtime_threshold_hours,
             overtime_multiplier = EXCLUDED.overtime_multiplier,
             pay_period = EXCLUDED.pay_period,
             period_anchor = EXCLUDED.period_anchor,
             updated_at = NOW()
         RETURNING {COLUMNS}"
    ))
    .bind(org_id)
    .bind(config.overtime_threshold_hours)
    .bind(config.overtime_multiplier)
    .bind(config.pay_period)
    .bind(config.period_anchor)
    .fetch_one(pool)
    .await
}
