//! Tenant settings domain types
//!
//! Per-tenant thresholds used by QC evaluation, dwell-time tracking and payroll.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Acceptance criteria applied to every QC inspection
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct QcCriteria {
    #[serde(default = "default_max_defect_pct")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub max_defect_pct: f64,
    #[serde(default = "default_max_pulp_temp_c")]
    #[validate(range(max = 40.0))]
    pub max_pulp_temp_c: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub min_brix: Option<f64>,
}

impl Default for QcCriteria {
    fn default() -> Self {
        Self {
            max_defect_pct: default_max_defect_pct(),
            max_pulp_temp_c: default_max_pulp_temp_c(),
            min_brix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ColdRoomPolicy {
    #[serde(default = "default_max_dwell_minutes")]
    #[validate(range(min = 1, max = 720))]
    pub default_max_dwell_minutes: i32,
    #[serde(default = "default_dwell_warning_ratio")]
    #[validate(custom(function = "validate_ratio"))]
    pub dwell_warning_ratio: f64,
}

impl Default for ColdRoomPolicy {
    fn default() -> Self {
        Self {
            default_max_dwell_minutes: default_max_dwell_minutes(),
            dwell_warning_ratio: default_dwell_warning_ratio(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PayrollPolicy {
    #[serde(default = "default_standard_daily_hours")]
    #[validate(custom(function = "validate_daily_hours"))]
    pub standard_daily_hours: Decimal,
    #[serde(default = "default_overtime_multiplier")]
    #[validate(custom(function = "validate_multiplier"))]
    pub overtime_multiplier: Decimal,
    #[serde(default)]
    #[validate(custom(function = "validate_tax_rate"))]
    pub tax_rate: Decimal,
}

impl Default for PayrollPolicy {
    fn default() -> Self {
        Self {
            standard_daily_hours: default_standard_daily_hours(),
            overtime_multiplier: default_overtime_multiplier(),
            tax_rate: Decimal::ZERO,
        }
    }
}

/// All tenant-level settings, stored as one JSON document
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct TenantSettings {
    #[serde(default)]
    #[validate(nested)]
    pub qc: QcCriteria,
    #[serde(default)]
    #[validate(nested)]
    pub cold_room: ColdRoomPolicy,
    #[serde(default)]
    #[validate(nested)]
    pub payroll: PayrollPolicy,
}

/// Response DTO for tenant settings
#[derive(Debug, Clone, Serialize)]
pub struct TenantSettingsResponse {
    pub tenant_id: Uuid,
    pub settings: TenantSettings,
    pub updated_by: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_max_defect_pct() -> f64 {
    5.0
}

fn default_max_pulp_temp_c() -> f64 {
    8.0
}

fn default_max_dwell_minutes() -> i32 {
    30
}

fn default_dwell_warning_ratio() -> f64 {
    0.8
}

fn default_standard_daily_hours() -> Decimal {
    Decimal::from(8)
}

fn default_overtime_multiplier() -> Decimal {
    Decimal::new(15, 1)
}

fn validate_ratio(value: f64) -> Result<(), ValidationError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ValidationError::new("range").with_message("must be within (0, 1]".into()))
    }
}

fn validate_daily_hours(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ONE && *value <= Decimal::from(24) {
        Ok(())
    } else {
        Err(ValidationError::new("range").with_message("must be between 1 and 24".into()))
    }
}

fn validate_multiplier(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ONE {
        Ok(())
    } else {
        Err(ValidationError::new("range").with_message("must be at least 1".into()))
    }
}

fn validate_tax_rate(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO && *value < Decimal::ONE {
        Ok(())
    } else {
        Err(ValidationError::new("range").with_message("must be within [0, 1)".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings: TenantSettings = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(settings, TenantSettings::default());
        assert_eq!(settings.cold_room.default_max_dwell_minutes, 30);
        assert_eq!(settings.payroll.overtime_multiplier, Decimal::new(15, 1));
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let settings: TenantSettings =
            serde_json::from_value(serde_json::json!({ "qc": { "min_brix": 11.5 } })).unwrap();
        assert_eq!(settings.qc.min_brix, Some(11.5));
        assert_eq!(settings.qc.max_defect_pct, 5.0);
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let mut settings = TenantSettings::default();
        assert!(settings.validate().is_ok());

        settings.cold_room.dwell_warning_ratio = 1.5;
        settings.payroll.overtime_multiplier = Decimal::new(5, 1);
        let errors = settings.validate().unwrap_err();
        let fields = errors.errors();
        assert!(fields.contains_key("cold_room"));
        assert!(fields.contains_key("payroll"));
    }

    #[test]
    fn warning_ratio_is_exclusive_of_zero_and_inclusive_of_one() {
        let mut policy = ColdRoomPolicy::default();
        policy.dwell_warning_ratio = 1.0;
        assert!(policy.validate().is_ok());
        policy.dwell_warning_ratio = 0.0;
        assert!(policy.validate().is_err());
        policy.dwell_warning_ratio = -0.2;
        assert!(policy.validate().is_err());
    }
}
