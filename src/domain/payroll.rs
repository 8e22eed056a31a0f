//! Payroll domain types and pay computation
//!
//! Pay is derived from closed attendance records: each work day's hours
//! up to the standard day are regular, anything beyond is overtime.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::receiving::money;
use super::settings::PayrollPolicy;

/// Attendance interval fed into the computation
#[derive(Debug, Clone, Copy)]
pub struct WorkedInterval {
    pub work_date: NaiveDate,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
}

/// Pay figures for one employee over one period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayComputation {
    pub days_worked: i32,
    pub incomplete_records: i32,
    pub regular_hours: Decimal,
    pub overtime_hours: Decimal,
    pub hourly_rate: Decimal,
    pub gross_pay: Decimal,
    pub tax: Decimal,
    pub net_pay: Decimal,
}

pub fn compute_pay(
    intervals: &[WorkedInterval],
    hourly_rate: Decimal,
    policy: &PayrollPolicy,
) -> PayComputation {
    let mut minutes_per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    let mut incomplete_records = 0;

    for interval in intervals {
        match interval.check_out {
            Some(out) if out > interval.check_in => {
                *minutes_per_day.entry(interval.work_date).or_default() +=
                    (out - interval.check_in).num_minutes();
            }
            Some(_) => {}
            None => incomplete_records += 1,
        }
    }

    let standard_minutes = policy.standard_daily_hours * Decimal::from(60);
    let mut regular_minutes = Decimal::ZERO;
    let mut overtime_minutes = Decimal::ZERO;

    for minutes in minutes_per_day.values() {
        let minutes = Decimal::from(*minutes);
        if minutes > standard_minutes {
            regular_minutes += standard_minutes;
            overtime_minutes += minutes - standard_minutes;
        } else {
            regular_minutes += minutes;
        }
    }

    let regular_hours = hours(regular_minutes);
    let overtime_hours = hours(overtime_minutes);

    let gross_pay = money(
        regular_hours * hourly_rate + overtime_hours * hourly_rate * policy.overtime_multiplier,
    );
    let tax = money(gross_pay * policy.tax_rate);

    PayComputation {
        days_worked: minutes_per_day.values().filter(|m| **m > 0).count() as i32,
        incomplete_records,
        regular_hours,
        overtime_hours,
        hourly_rate,
        gross_pay,
        tax,
        net_pay: gross_pay - tax,
    }
}

fn hours(minutes: Decimal) -> Decimal {
    (minutes / Decimal::from(60)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Serialize)]
pub struct PayrollLineResponse {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub employee_code: String,
    pub employee_name: String,
    #[serde(flatten)]
    pub pay: PayComputation,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayrollRunResponse {
    pub id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_gross: Decimal,
    pub total_tax: Decimal,
    pub total_net: Decimal,
    pub employee_count: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<PayrollLineResponse>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_period"))]
pub struct CreatePayrollRunRequest {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

fn validate_period(req: &CreatePayrollRunRequest) -> Result<(), ValidationError> {
    if req.period_start <= req.period_end {
        Ok(())
    } else {
        Err(ValidationError::new("period")
            .with_message("period_start must not be after period_end".into()))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PayrollRunQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn shift(d: u32, start_hour: u32, minutes: i64) -> WorkedInterval {
        let check_in = Utc.with_ymd_and_hms(2026, 2, d, start_hour, 0, 0).unwrap();
        WorkedInterval {
            work_date: day(d),
            check_in,
            check_out: Some(check_in + Duration::minutes(minutes)),
        }
    }

    #[test]
    fn overtime_is_counted_per_day() {
        // Day 1: 10h (2h overtime), day 2: 6h, day 3: split 5h + 4h (1h overtime)
        let intervals = vec![
            shift(1, 6, 600),
            shift(2, 6, 360),
            shift(3, 6, 300),
            shift(3, 13, 240),
        ];

        let pay = compute_pay(&intervals, Decimal::from(10), &PayrollPolicy::default());

        assert_eq!(pay.days_worked, 3);
        assert_eq!(pay.regular_hours, Decimal::from(22));
        assert_eq!(pay.overtime_hours, Decimal::from(3));
        // 22 * 10 + 3 * 10 * 1.5
        assert_eq!(pay.gross_pay, Decimal::from(265));
        assert_eq!(pay.tax, Decimal::ZERO);
        assert_eq!(pay.net_pay, Decimal::from(265));
    }

    #[test]
    fn open_records_are_skipped_and_counted() {
        let mut open = shift(4, 7, 0);
        open.check_out = None;

        let pay = compute_pay(
            &[shift(3, 7, 480), open],
            Decimal::new(1250, 2),
            &PayrollPolicy::default(),
        );

        assert_eq!(pay.incomplete_records, 1);
        assert_eq!(pay.days_worked, 1);
        assert_eq!(pay.gross_pay, Decimal::from(100));
    }

    #[test]
    fn tax_and_rounding() {
        let policy = PayrollPolicy {
            standard_daily_hours: Decimal::from(8),
            overtime_multiplier: Decimal::new(15, 1),
            tax_rate: Decimal::new(16, 2),
        };

        // 7h20m = 7.33h at 9.99
        let pay = compute_pay(&[shift(5, 8, 440)], Decimal::new(999, 2), &policy);

        assert_eq!(pay.regular_hours, Decimal::new(733, 2));
        assert_eq!(pay.gross_pay, Decimal::new(7323, 2)); // 73.2267 -> 73.23
        assert_eq!(pay.tax, Decimal::new(1172, 2)); // 11.7168 -> 11.72
        assert_eq!(pay.net_pay, Decimal::new(6151, 2));
    }

    #[test]
    fn no_attendance_means_zero_pay() {
        let pay = compute_pay(&[], Decimal::from(15), &PayrollPolicy::default());
        assert_eq!(pay.days_worked, 0);
        assert_eq!(pay.gross_pay, Decimal::ZERO);
    }

    #[test]
    fn period_must_be_ordered() {
        let req = CreatePayrollRunRequest {
            period_start: day(10),
            period_end: day(1),
        };
        assert!(req.validate().is_err());
    }
}
