//! Gate (vehicle movement) domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Truck,
    Van,
    Car,
    Other,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Truck => "truck",
            Self::Van => "van",
            Self::Car => "car",
            Self::Other => "other",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "truck" => Self::Truck,
            "van" => Self::Van,
            "car" => Self::Car,
            _ => Self::Other,
        }
    }
}

/// Canonical plate form: upper case, no whitespace or dashes.
pub fn normalize_plate(plate: &str) -> String {
    plate
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleMovementResponse {
    pub id: Uuid,
    pub plate_number: String,
    pub driver_name: Option<String>,
    pub vehicle_type: VehicleType,
    pub purpose: Option<String>,
    pub shipment_id: Option<Uuid>,
    pub seal_number: Option<String>,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VehicleEntryRequest {
    #[validate(length(min = 2, max = 16))]
    pub plate_number: String,
    #[serde(default)]
    pub driver_name: Option<String>,
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub shipment_id: Option<Uuid>,
    #[serde(default)]
    pub seal_number: Option<String>,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Default, Validate)]
pub struct VehicleExitRequest {
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct VehicleQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub on_site: Option<bool>,
    pub plate: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plates_are_normalized() {
        assert_eq!(normalize_plate(" kda 123x "), "KDA123X");
        assert_eq!(normalize_plate("kbz-456y"), "KBZ456Y");
    }
}
