//! Shipment domain types and status lifecycle

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    Dispatched,
    InTransit,
    Delayed,
    Delivered,
    Cancelled,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatched => "dispatched",
            Self::InTransit => "in_transit",
            Self::Delayed => "delayed",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "dispatched" => Self::Dispatched,
            "in_transit" => Self::InTransit,
            "delayed" => Self::Delayed,
            "delivered" => Self::Delivered,
            "cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether a tracking event may move a shipment from `self` to `next`.
    ///
    /// Repeating the current status is a location update and is allowed
    /// until the shipment reaches a terminal state.
    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        use ShipmentStatus::*;

        if self.is_terminal() {
            return false;
        }
        if *self == next {
            return true;
        }

        matches!(
            (*self, next),
            (Pending, Dispatched)
                | (Dispatched, InTransit)
                | (Dispatched, Delayed)
                | (InTransit, Delayed)
                | (InTransit, Delivered)
                | (Delayed, InTransit)
                | (Delayed, Delivered)
                | (_, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentResponse {
    pub id: Uuid,
    pub tracking_number: String,
    pub carrier_id: Option<Uuid>,
    pub carrier_name: Option<String>,
    pub origin: String,
    pub destination: String,
    pub cargo_description: Option<String>,
    pub weight_kg: Option<Decimal>,
    pub pallet_count: Option<i32>,
    pub temperature_controlled: bool,
    pub required_temp_c: Option<f64>,
    pub status: ShipmentStatus,
    pub scheduled_departure: Option<DateTime<Utc>>,
    pub eta: Option<DateTime<Utc>>,
    pub departed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateShipmentRequest {
    #[validate(length(min = 1, max = 64))]
    pub tracking_number: String,
    #[serde(default)]
    pub carrier_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub origin: String,
    #[validate(length(min = 1, max = 200))]
    pub destination: String,
    #[serde(default)]
    pub cargo_description: Option<String>,
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub pallet_count: Option<i32>,
    #[serde(default)]
    pub temperature_controlled: bool,
    #[serde(default)]
    pub required_temp_c: Option<f64>,
    #[serde(default)]
    pub scheduled_departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub eta: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateShipmentRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier_id: Option<Uuid>,
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub origin: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub destination: Option<String>,
    #[serde(default)]
    pub cargo_description: Option<String>,
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub pallet_count: Option<i32>,
    #[serde(default)]
    pub temperature_controlled: Option<bool>,
    #[serde(default)]
    pub required_temp_c: Option<f64>,
    #[serde(default)]
    pub scheduled_departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub eta: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ShipmentQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<ShipmentStatus>,
    pub carrier_id: Option<Uuid>,
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentEventResponse {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub status: ShipmentStatus,
    pub location: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub recorded_by: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateShipmentEventRequest {
    pub status: ShipmentStatus,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::ShipmentStatus::*;
    use super::*;

    #[test]
    fn forward_lifecycle_is_allowed() {
        assert!(Pending.can_transition_to(Dispatched));
        assert!(Dispatched.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Delayed));
        assert!(Delayed.can_transition_to(InTransit));
        assert!(Delayed.can_transition_to(Delivered));
        assert!(InTransit.can_transition_to(Delivered));
    }

    #[test]
    fn skipping_or_reversing_is_rejected() {
        assert!(!Pending.can_transition_to(InTransit));
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!InTransit.can_transition_to(Pending));
        assert!(!Dispatched.can_transition_to(Delivered));
    }

    #[test]
    fn anything_open_can_be_cancelled() {
        for status in [Pending, Dispatched, InTransit, Delayed] {
            assert!(status.can_transition_to(Cancelled), "{status:?}");
        }
    }

    #[test]
    fn terminal_states_are_final() {
        for next in [Pending, Dispatched, InTransit, Delayed, Delivered, Cancelled] {
            assert!(!Delivered.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn same_status_is_a_location_update() {
        assert!(InTransit.can_transition_to(InTransit));
        assert!(Pending.can_transition_to(Pending));
    }

    #[test]
    fn status_round_trips_through_db_text() {
        for status in [Pending, Dispatched, InTransit, Delayed, Delivered, Cancelled] {
            assert_eq!(ShipmentStatus::from_db(status.as_str()), status);
        }
    }
}
