/// Payroll math
///
/// Hours past the organization's weekly overtime threshold are paid at the
/// overtime multiplier. Money is rounded to cents, midpoint away from zero.
/// Reports over longer pay periods apply the threshold to each week (aligned
/// to `period_anchor`) separately and add the weeks up.
///
/// # Example
///
/// ```
/// use rust_decimal::Decimal;
/// use sitebook_shared::payroll::{calculate_payroll, PayrollConfig};
///
/// let config = PayrollConfig::default();
/// let pay = calculate_payroll(Decimal::from(45), Decimal::from(20), &config).unwrap();
///
/// assert_eq!(pay.overtime_hours, Decimal::from(5));
/// assert_eq!(pay.total_pay, Decimal::from(950));
/// ```

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::membership::MemberDetails;
use crate::models::time_entry::TimeEntry;

/// Error type for payroll calculations
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PayrollError {
    #[error("Hours cannot be negative")]
    NegativeHours,

    #[error("Hourly rate cannot be negative")]
    NegativeRate,

    #[error("Invalid payroll configuration: {0}")]
    InvalidConfig(String),

    #[error("Pay amount is too large to represent")]
    Overflow,
}

/// Largest rate a membership can store (`NUMERIC(10, 2)`)
pub fn max_hourly_rate() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

/// Hours in a 31-day month; the most a single calculation accepts
pub fn max_calculation_hours() -> Decimal {
    Decimal::from(744)
}

/// How often payroll runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pay_period", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayPeriod {
    Weekly,
    Biweekly,
    Semimonthly,
    Monthly,
}

/// Organization payroll settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PayrollConfig {
    pub overtime_threshold_hours: Decimal,
    pub overtime_multiplier: Decimal,
    pub pay_period: PayPeriod,

    /// Any first day of a pay period; weekly and biweekly periods align to it
    pub period_anchor: NaiveDate,
}

impl Default for PayrollConfig {
    fn default() -> Self {
        Self {
            overtime_threshold_hours: Decimal::from(40),
            overtime_multiplier: Decimal::new(15, 1),
            pay_period: PayPeriod::Weekly,
            period_anchor: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN),
        }
    }
}

impl PayrollConfig {
    pub fn validate(&self) -> Result<(), PayrollError> {
        if self.overtime_threshold_hours < Decimal::ZERO {
            return Err(PayrollError::InvalidConfig(
                "overtime_threshold_hours cannot be negative".to_string(),
            ));
        }
        if self.overtime_multiplier < Decimal::ONE {
            return Err(PayrollError::InvalidConfig(
                "overtime_multiplier must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pay breakdown for one worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollCalculation {
    pub regular_hours: Decimal,
    pub overtime_hours: Decimal,
    pub regular_pay: Decimal,
    pub overtime_pay: Decimal,
    pub total_pay: Decimal,
}

impl PayrollCalculation {
    fn zero() -> Self {
        Self {
            regular_hours: Decimal::ZERO,
            overtime_hours: Decimal::ZERO,
            regular_pay: Decimal::ZERO,
            overtime_pay: Decimal::ZERO,
            total_pay: Decimal::ZERO,
        }
    }

    /// Field-wise sum
    fn checked_add(&self, other: &Self) -> Result<Self, PayrollError> {
        let add = |a: Decimal, b: Decimal| a.checked_add(b).ok_or(PayrollError::Overflow);
        Ok(Self {
            regular_hours: add(self.regular_hours, other.regular_hours)?,
            overtime_hours: add(self.overtime_hours, other.overtime_hours)?,
            regular_pay: add(self.regular_pay, other.regular_pay)?,
            overtime_pay: add(self.overtime_pay, other.overtime_pay)?,
            total_pay: add(self.total_pay, other.total_pay)?,
        })
    }
}

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Splits hours at the overtime threshold and prices both parts
pub fn calculate_payroll(
    total_hours: Decimal,
    hourly_rate: Decimal,
    config: &PayrollConfig,
) -> Result<PayrollCalculation, PayrollError> {
    if total_hours < Decimal::ZERO {
        return Err(PayrollError::NegativeHours);
    }
    if hourly_rate < Decimal::ZERO {
        return Err(PayrollError::NegativeRate);
    }

    let threshold = config.overtime_threshold_hours;
    let (regular_hours, overtime_hours) = if total_hours <= threshold {
        (total_hours, Decimal::ZERO)
    } else {
        (threshold, total_hours - threshold)
    };

    let regular_pay = regular_hours
        .checked_mul(hourly_rate)
        .map(round_money)
        .ok_or(PayrollError::Overflow)?;
    let overtime_pay = overtime_hours
        .checked_mul(hourly_rate)
        .and_then(|pay| pay.checked_mul(config.overtime_multiplier))
        .map(round_money)
        .ok_or(PayrollError::Overflow)?;
    let total_pay = regular_pay
        .checked_add(overtime_pay)
        .ok_or(PayrollError::Overflow)?;

    Ok(PayrollCalculation {
        regular_hours,
        overtime_hours,
        regular_pay,
        overtime_pay,
        total_pay,
    })
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the anchor-aligned week containing `date`
fn week_start(date: NaiveDate, anchor: NaiveDate) -> NaiveDate {
    date - Duration::days((date - anchor).num_days().rem_euclid(7))
}

/// First and last day (inclusive) of the pay period containing `date`
pub fn pay_period_bounds(date: NaiveDate, config: &PayrollConfig) -> (NaiveDate, NaiveDate) {
    match config.pay_period {
        PayPeriod::Weekly | PayPeriod::Biweekly => {
            let length = if config.pay_period == PayPeriod::Weekly { 7 } else { 14 };
            let offset = (date - config.period_anchor).num_days().rem_euclid(length);
            let start = date - Duration::days(offset);
            (start, start + Duration::days(length - 1))
        }
        PayPeriod::Semimonthly => {
            if date.day() <= 15 {
                (first_of_month(date), date.with_day(15).unwrap_or(date))
            } else {
                (
                    date.with_day(16).unwrap_or(date),
                    last_day_of_month(date.year(), date.month()),
                )
            }
        }
        PayPeriod::Monthly => (
            first_of_month(date),
            last_day_of_month(date.year(), date.month()),
        ),
    }
}

/// One worker's line in a payroll report
#[derive(Debug, Clone, Serialize)]
pub struct PayrollReportLine {
    pub user_id: Uuid,
    pub name: String,
    pub hourly_rate: Decimal,

    /// Set when the member has no hourly rate and was priced at zero
    pub missing_rate: bool,

    pub unapproved_hours: Decimal,

    #[serde(flatten)]
    pub pay: PayrollCalculation,
}

/// Payroll for a whole organization over one period
#[derive(Debug, Clone, Serialize)]
pub struct PayrollReport {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub lines: Vec<PayrollReportLine>,
    pub total_hours: Decimal,
    pub total_pay: Decimal,
}

/// Builds a report from the time entries inside `[period_start, period_end]`
///
/// Hours are grouped per worker and per anchor-aligned week; overtime is
/// computed for each week and the weeks are summed. Entries from users who
/// are no longer members are priced at rate 0 and flagged.
pub fn build_payroll_report(
    period_start: NaiveDate,
    period_end: NaiveDate,
    entries: &[TimeEntry],
    members: &[MemberDetails],
    config: &PayrollConfig,
) -> Result<PayrollReport, PayrollError> {
    #[derive(Default)]
    struct Hours {
        weeks: BTreeMap<NaiveDate, Decimal>,
        unapproved: Decimal,
    }

    let mut hours: BTreeMap<Uuid, Hours> = BTreeMap::new();

    for entry in entries
        .iter()
        .filter(|e| e.work_date >= period_start && e.work_date <= period_end)
    {
        let slot = hours.entry(entry.user_id).or_default();
        let week = slot
            .weeks
            .entry(week_start(entry.work_date, config.period_anchor))
            .or_default();
        *week = week.checked_add(entry.hours).ok_or(PayrollError::Overflow)?;
        if !entry.approved {
            slot.unapproved = slot
                .unapproved
                .checked_add(entry.hours)
                .ok_or(PayrollError::Overflow)?;
        }
    }

    let mut lines = Vec::with_capacity(hours.len());
    for (user_id, worked) in hours {
        let member = members.iter().find(|m| m.user_id == user_id);
        let rate = member.and_then(|m| m.hourly_rate);
        let name = member
            .map(|m| m.name.clone().unwrap_or_else(|| m.email.clone()))
            .unwrap_or_else(|| user_id.to_string());

        let hourly_rate = rate.unwrap_or(Decimal::ZERO);
        let mut pay = PayrollCalculation::zero();
        for week_hours in worked.weeks.values() {
            pay = pay.checked_add(&calculate_payroll(*week_hours, hourly_rate, config)?)?;
        }

        lines.push(PayrollReportLine {
            user_id,
            name,
            hourly_rate,
            missing_rate: rate.is_none(),
            unapproved_hours: worked.unapproved,
            pay,
        });
    }

    lines.sort_by(|a, b| a.name.cmp(&b.name));

    let mut total_hours = Decimal::ZERO;
    let mut total_pay = Decimal::ZERO;
    for line in &lines {
        total_hours = total_hours
            .checked_add(line.pay.regular_hours)
            .and_then(|h| h.checked_add(line.pay.overtime_hours))
            .ok_or(PayrollError::Overflow)?;
        total_pay = total_pay
            .checked_add(line.pay.total_pay)
            .ok_or(PayrollError::Overflow)?;
    }

    Ok(PayrollReport {
        period_start,
        period_end,
        lines,
        total_hours,
        total_pay,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::membership::MembershipRole;
    use chrono::Utc;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_no_overtime_at_or_below_threshold() {
        let config = PayrollConfig::default();
        for hours in ["0", "12.5", "39.99", "40"] {
            let pay = calculate_payroll(dec(hours), dec("22.50"), &config).unwrap();
            assert_eq!(pay.overtime_hours, Decimal::ZERO);
            assert_eq!(pay.overtime_pay, Decimal::ZERO);
            assert_eq!(pay.regular_hours, dec(hours));
            assert_eq!(pay.total_pay, round_money(dec(hours) * dec("22.50")));
        }
    }

    #[test]
    fn test_overtime_above_threshold() {
        let config = PayrollConfig::default();
        let pay = calculate_payroll(dec("46.5"), dec("30"), &config).unwrap();

        assert_eq!(pay.regular_hours, dec("40"));
        assert_eq!(pay.overtime_hours, dec("6.5"));
        assert_eq!(pay.regular_pay, dec("1200.00"));
        assert_eq!(pay.overtime_pay, dec("6.5") * dec("30") * dec("1.5"));
        assert_eq!(pay.total_pay, dec("1492.50"));
    }

    #[test]
    fn test_custom_threshold_and_multiplier() {
        let config = PayrollConfig {
            overtime_threshold_hours: dec("8"),
            overtime_multiplier: dec("2"),
            ..Default::default()
        };
        let pay = calculate_payroll(dec("10"), dec("25"), &config).unwrap();
        assert_eq!(pay.overtime_pay, dec("100"));
        assert_eq!(pay.total_pay, dec("300"));
    }

    #[test]
    fn test_money_rounds_half_away_from_zero() {
        let config = PayrollConfig::default();
        let pay = calculate_payroll(dec("1"), dec("10.125"), &config).unwrap();
        assert_eq!(pay.regular_pay, dec("10.13"));
    }

    #[test]
    fn test_negative_inputs_rejected() {
        let config = PayrollConfig::default();
        assert_eq!(
            calculate_payroll(dec("-1"), dec("20"), &config),
            Err(PayrollError::NegativeHours)
        );
        assert_eq!(
            calculate_payroll(dec("10"), dec("-20"), &config),
            Err(PayrollError::NegativeRate)
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(PayrollConfig::default().validate().is_ok());
        let bad = PayrollConfig {
            overtime_multiplier: dec("0.5"),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_weekly_period_aligns_to_anchor() {
        // 2024-01-01 is a Monday
        let config = PayrollConfig::default();
        assert_eq!(
            pay_period_bounds(date(2024, 3, 6), &config),
            (date(2024, 3, 4), date(2024, 3, 10))
        );
        assert_eq!(
            pay_period_bounds(date(2023, 12, 31), &config),
            (date(2023, 12, 25), date(2023, 12, 31))
        );
    }

    #[test]
    fn test_biweekly_period() {
        let config = PayrollConfig {
            pay_period: PayPeriod::Biweekly,
            ..Default::default()
        };
        assert_eq!(
            pay_period_bounds(date(2024, 1, 20), &config),
            (date(2024, 1, 15), date(2024, 1, 28))
        );
    }

    #[test]
    fn test_semimonthly_and_monthly_periods() {
        let semi = PayrollConfig {
            pay_period: PayPeriod::Semimonthly,
            ..Default::default()
        };
        assert_eq!(
            pay_period_bounds(date(2024, 2, 15), &semi),
            (date(2024, 2, 1), date(2024, 2, 15))
        );
        assert_eq!(
            pay_period_bounds(date(2024, 2, 16), &semi),
            (date(2024, 2, 16), date(2024, 2, 29))
        );

        let monthly = PayrollConfig {
            pay_period: PayPeriod::Monthly,
            ..Default::default()
        };
        assert_eq!(
            pay_period_bounds(date(2024, 12, 9), &monthly),
            (date(2024, 12, 1), date(2024, 12, 31))
        );
    }

    fn entry(user_id: Uuid, day: u32, hours: &str, approved: bool) -> TimeEntry {
        TimeEntry {
            id: Uuid::new_v4(),
            org_id: Uuid::nil(),
            user_id,
            project_id: None,
            work_date: date(2024, 3, day),
            hours: hours.parse().unwrap(),
            notes: None,
            approved,
            approved_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn member(user_id: Uuid, name: &str, rate: Option<&str>) -> MemberDetails {
        MemberDetails {
            user_id,
            email: format!("{}@example.com", name.to_lowercase()),
            name: Some(name.to_string()),
            role: MembershipRole::Worker,
            hourly_rate: rate.map(|r| r.parse().unwrap()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_report_groups_and_totals() {
        let (ana, ben) = (Uuid::new_v4(), Uuid::new_v4());
        let entries = vec![
            entry(ana, 4, "10", true),
            entry(ana, 5, "10", true),
            entry(ana, 6, "10", true),
            entry(ana, 7, "12", false),
            entry(ben, 4, "8", true),
            // Outside the period
            entry(ben, 11, "8", true),
        ];
        let members = vec![member(ana, "Ana", Some("20")), member(ben, "Ben", None)];

        let report = build_payroll_report(
            date(2024, 3, 4),
            date(2024, 3, 10),
            &entries,
            &members,
            &PayrollConfig::default(),
        )
        .unwrap();

        assert_eq!(report.lines.len(), 2);
        let ana_line = &report.lines[0];
        assert_eq!(ana_line.name, "Ana");
        assert_eq!(ana_line.pay.overtime_hours, dec("2"));
        assert_eq!(ana_line.unapproved_hours, dec("12"));
        assert_eq!(ana_line.pay.total_pay, dec("860.00"));

        let ben_line = &report.lines[1];
        assert!(ben_line.missing_rate);
        assert_eq!(ben_line.pay.total_pay, Decimal::ZERO);

        assert_eq!(report.total_hours, dec("50"));
        assert_eq!(report.total_pay, dec("860.00"));
    }

    #[test]
    fn test_overflowing_inputs_are_errors() {
        let config = PayrollConfig::default();
        assert_eq!(
            calculate_payroll(Decimal::MAX, dec("2"), &config),
            Err(PayrollError::Overflow)
        );
        assert_eq!(
            calculate_payroll(dec("40"), Decimal::MAX, &config),
            Err(PayrollError::Overflow)
        );
    }

    #[test]
    fn test_largest_accepted_inputs_do_not_overflow() {
        let config = PayrollConfig {
            overtime_threshold_hours: Decimal::ZERO,
            overtime_multiplier: dec("99.99"),
            ..Default::default()
        };
        let pay = calculate_payroll(max_calculation_hours(), max_hourly_rate(), &config).unwrap();
        assert_eq!(pay.overtime_hours, dec("744"));
        assert!(pay.total_pay > Decimal::ZERO);
    }

    fn workweek(user_id: Uuid, days: &[u32], hours: &str) -> Vec<TimeEntry> {
        days.iter().map(|d| entry(user_id, *d, hours, true)).collect()
    }

    #[test]
    fn test_biweekly_overtime_is_counted_per_week() {
        // 2024-03-11..=2024-03-24 is a biweekly period from the 2024-01-01 anchor
        let config = PayrollConfig {
            pay_period: PayPeriod::Biweekly,
            ..Default::default()
        };
        let (start, end) = pay_period_bounds(date(2024, 3, 13), &config);
        assert_eq!((start, end), (date(2024, 3, 11), date(2024, 3, 24)));

        let (cal, dee) = (Uuid::new_v4(), Uuid::new_v4());
        let mut entries = workweek(cal, &[11, 12, 13, 14], "10");
        entries.extend(workweek(cal, &[18, 19, 20, 21], "10"));
        entries.extend(workweek(dee, &[11, 12, 13, 14], "8"));
        entries.extend(workweek(dee, &[18, 19, 20, 21, 22], "9"));
        let members = vec![member(cal, "Cal", Some("25")), member(dee, "Dee", Some("20"))];

        let report = build_payroll_report(start, end, &entries, &members, &config).unwrap();

        let cal_line = &report.lines[0];
        assert_eq!(cal_line.pay.regular_hours, dec("80"));
        assert_eq!(cal_line.pay.overtime_hours, Decimal::ZERO);
        assert_eq!(cal_line.pay.total_pay, dec("2000.00"));

        // 32 h, then 45 h: only the second week has overtime
        let dee_line = &report.lines[1];
        assert_eq!(dee_line.pay.regular_hours, dec("72"));
        assert_eq!(dee_line.pay.overtime_hours, dec("5"));
        assert_eq!(dee_line.pay.total_pay, dec("1590.00"));
    }

    #[test]
    fn test_monthly_full_time_has_no_overtime() {
        let config = PayrollConfig {
            pay_period: PayPeriod::Monthly,
            ..Default::default()
        };
        let eve = Uuid::new_v4();
        let mut entries = Vec::new();
        for week in [4u32, 11, 18, 25] {
            entries.extend(workweek(eve, &[week, week + 1, week + 2, week + 3, week + 4], "8"));
        }
        let members = vec![member(eve, "Eve", Some("30"))];

        let report = build_payroll_report(
            date(2024, 3, 1),
            date(2024, 3, 31),
            &entries,
            &members,
            &config,
        )
        .unwrap();

        assert_eq!(report.total_hours, dec("160"));
        assert_eq!(report.lines[0].pay.overtime_hours, Decimal::ZERO);
        assert_eq!(report.total_pay, dec("4800.00"));
    }
}
