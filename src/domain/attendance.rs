//! Attendance domain types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceResponse {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub work_date: NaiveDate,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
    /// Present once the record is closed
    pub worked_minutes: Option<i64>,
}

impl AttendanceResponse {
    pub fn worked_minutes(check_in: DateTime<Utc>, check_out: Option<DateTime<Utc>>) -> Option<i64> {
        check_out.map(|out| (out - check_in).num_minutes())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckInRequest {
    pub employee_id: Uuid,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckOutRequest {
    pub employee_id: Uuid,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AttendanceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn open_records_have_no_worked_time() {
        let start = Utc::now();
        assert_eq!(AttendanceResponse::worked_minutes(start, None), None);
        assert_eq!(
            AttendanceResponse::worked_minutes(start, Some(start + Duration::minutes(495))),
            Some(495)
        );
    }
}
