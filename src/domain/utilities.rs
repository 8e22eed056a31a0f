//! Utility metering domain types
//!
//! Meters are cumulative: each reading is the register value at a point in
//! time, and consumption is the difference between consecutive readings.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use super::employees::non_negative;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeterKind {
    Electricity,
    Water,
    Gas,
    Diesel,
}

impl MeterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::Water => "water",
            Self::Gas => "gas",
            Self::Diesel => "diesel",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "water" => Self::Water,
            "gas" => Self::Gas,
            "diesel" => Self::Diesel,
            _ => Self::Electricity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeterResponse {
    pub id: Uuid,
    pub name: String,
    pub kind: MeterKind,
    pub unit: String,
    pub location: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMeterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub kind: MeterKind,
    #[validate(length(min = 1, max = 16))]
    pub unit: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateMeterRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 16))]
    pub unit: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MeterQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub kind: Option<MeterKind>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MeterReadingResponse {
    pub id: Uuid,
    pub meter_id: Uuid,
    pub value: Decimal,
    pub read_at: DateTime<Utc>,
    pub recorded_by: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMeterReadingRequest {
    #[validate(custom(function = "non_negative"))]
    pub value: Decimal,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MeterReadingQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Why a new reading does not fit between its neighbours
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadingOrderError {
    BelowPrevious { previous: Decimal },
    AboveNext { next: Decimal },
}

/// A cumulative register must never run backwards in time.
pub fn check_reading_order(
    value: Decimal,
    previous: Option<Decimal>,
    next: Option<Decimal>,
) -> Result<(), ReadingOrderError> {
    if let Some(previous) = previous {
        if value < previous {
            return Err(ReadingOrderError::BelowPrevious { previous });
        }
    }
    if let Some(next) = next {
        if value > next {
            return Err(ReadingOrderError::AboveNext { next });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionInterval {
    #[default]
    Day,
    Month,
}

impl ConsumptionInterval {
    pub fn bucket_start(&self, at: DateTime<Utc>) -> NaiveDate {
        let date = at.date_naive();
        match self {
            Self::Day => date,
            Self::Month => date.with_day(1).unwrap_or(date),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConsumptionQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interval: ConsumptionInterval,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConsumptionBucket {
    pub period_start: NaiveDate,
    pub consumption: Decimal,
    pub readings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumptionReport {
    pub meter_id: Uuid,
    pub unit: String,
    pub interval: ConsumptionInterval,
    pub buckets: Vec<ConsumptionBucket>,
    pub total: Decimal,
}

/// Consumption per bucket from cumulative readings.
///
/// The difference between two consecutive readings is attributed to the
/// bucket of the later reading. The first reading only establishes the
/// baseline. Input order does not matter.
pub fn consumption_buckets(
    readings: &[(DateTime<Utc>, Decimal)],
    interval: ConsumptionInterval,
) -> Vec<ConsumptionBucket> {
    let mut ordered = readings.to_vec();
    ordered.sort_by_key(|(at, _)| *at);

    let mut buckets: BTreeMap<NaiveDate, ConsumptionBucket> = BTreeMap::new();
    let mut previous: Option<Decimal> = None;

    for (at, value) in ordered {
        let start = interval.bucket_start(at);
        let bucket = buckets.entry(start).or_insert(ConsumptionBucket {
            period_start: start,
            consumption: Decimal::ZERO,
            readings: 0,
        });
        bucket.readings += 1;

        if let Some(prev) = previous {
            // Guard against legacy data that ran backwards
            bucket.consumption += (value - prev).max(Decimal::ZERO);
        }
        previous = Some(value);
    }

    buckets.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, month, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn daily_consumption_goes_to_the_later_reading() {
        let readings = vec![
            (at(1, 1, 8), Decimal::from(1000)),
            (at(1, 1, 20), Decimal::from(1040)),
            (at(1, 2, 8), Decimal::from(1100)),
            (at(1, 4, 8), Decimal::from(1250)),
        ];

        let buckets = consumption_buckets(&readings, ConsumptionInterval::Day);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].consumption, Decimal::from(40));
        assert_eq!(buckets[0].readings, 2);
        assert_eq!(buckets[1].consumption, Decimal::from(60));
        assert_eq!(buckets[2].period_start, NaiveDate::from_ymd_opt(2026, 1, 4).unwrap());
        assert_eq!(buckets[2].consumption, Decimal::from(150));
    }

    #[test]
    fn monthly_buckets_and_unordered_input() {
        let readings = vec![
            (at(2, 3, 8), Decimal::new(5305, 1)),
            (at(1, 15, 8), Decimal::from(500)),
            (at(1, 31, 8), Decimal::from(520)),
        ];

        let buckets = consumption_buckets(&readings, ConsumptionInterval::Month);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].period_start, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(buckets[0].consumption, Decimal::from(20));
        assert_eq!(buckets[1].consumption, Decimal::new(105, 1));
    }

    #[test]
    fn single_reading_is_only_a_baseline() {
        let buckets =
            consumption_buckets(&[(at(3, 1, 0), Decimal::from(7))], ConsumptionInterval::Day);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].consumption, Decimal::ZERO);
    }

    #[test]
    fn readings_must_fit_between_neighbours() {
        let v = Decimal::from(100);
        assert!(check_reading_order(v, Some(Decimal::from(90)), Some(Decimal::from(110))).is_ok());
        assert!(check_reading_order(v, Some(v), None).is_ok());
        assert_eq!(
            check_reading_order(v, Some(Decimal::from(101)), None),
            Err(ReadingOrderError::BelowPrevious {
                previous: Decimal::from(101)
            })
        );
        assert_eq!(
            check_reading_order(v, None, Some(Decimal::from(99))),
            Err(ReadingOrderError::AboveNext {
                next: Decimal::from(99)
            })
        );
    }
}
