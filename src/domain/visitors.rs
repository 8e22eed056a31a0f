//! Visitor domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const BADGE_PREFIX: &str = "V";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VisitorResponse {
    pub id: Uuid,
    pub badge_number: String,
    pub full_name: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub id_number: Option<String>,
    pub host_employee_id: Option<Uuid>,
    pub host_name: Option<String>,
    pub purpose: Option<String>,
    pub vehicle_plate: Option<String>,
    pub checked_in_at: DateTime<Utc>,
    pub checked_out_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckInVisitorRequest {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub id_number: Option<String>,
    #[serde(default)]
    pub host_employee_id: Option<Uuid>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub vehicle_plate: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct VisitorQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub on_site: Option<bool>,
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}
