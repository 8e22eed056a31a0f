//! Operational alert types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TemperatureExcursion,
    QcRejection,
    ShipmentDelayed,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TemperatureExcursion => "temperature_excursion",
            Self::QcRejection => "qc_rejection",
            Self::ShipmentDelayed => "shipment_delayed",
        };
        write!(f, "{}", s)
    }
}

impl AlertKind {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "temperature_excursion" => Some(Self::TemperatureExcursion),
            "qc_rejection" => Some(Self::QcRejection),
            "shipment_delayed" => Some(Self::ShipmentDelayed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

impl Severity {
    pub fn from_db(value: &str) -> Self {
        match value {
            "critical" => Self::Critical,
            "warning" => Self::Warning,
            _ => Self::Info,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertResponse {
    pub id: Uuid,
    /// Raw kind so unknown kinds written by newer versions still list.
    pub kind: String,
    pub severity: Severity,
    pub title: String,
    pub message: Option<String>,
    pub data: serde_json::Value,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AlertQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub acknowledged: Option<bool>,
    pub kind: Option<AlertKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_text_matches_serde_names() {
        for kind in [
            AlertKind::TemperatureExcursion,
            AlertKind::QcRejection,
            AlertKind::ShipmentDelayed,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::json!(kind.to_string()));
            assert_eq!(AlertKind::from_db(&kind.to_string()), Some(kind));
        }
        assert_eq!(AlertKind::from_db("something_else"), None);
    }
}
