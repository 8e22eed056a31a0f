//! Employee domain types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub employee_code: String,
    pub full_name: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub hourly_rate: Decimal,
    pub hired_on: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 1, max = 32))]
    pub employee_code: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom(function = "non_negative"))]
    pub hourly_rate: Decimal,
    #[serde(default)]
    pub hired_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateEmployeeRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 32))]
    pub employee_code: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub hourly_rate: Option<Decimal>,
    #[serde(default)]
    pub hired_on: Option<NaiveDate>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department: Option<String>,
    pub active: Option<bool>,
    pub search: Option<String>,
}

pub(crate) fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        Err(ValidationError::new("range").with_message("must not be negative".into()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_rate_is_rejected() {
        let req: CreateEmployeeRequest = serde_json::from_value(serde_json::json!({
            "employee_code": "E-001",
            "full_name": "Amina Otieno",
            "hourly_rate": "-1.00"
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req = CreateEmployeeRequest {
            hourly_rate: Decimal::new(1250, 2),
            ..req
        };
        assert!(req.validate().is_ok());
    }
}
