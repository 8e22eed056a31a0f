//! Dashboard summary

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time operational figures for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSummary {
    pub receivings_pending_qc: i64,
    pub receivings_today: i64,
    pub qc_accepted_today: i64,
    pub qc_on_hold_today: i64,
    pub qc_rejected_today: i64,
    /// Percentage of today's checks that were accepted, `None` before the first check.
    pub qc_acceptance_rate: Option<Decimal>,
    pub shipments_in_transit: i64,
    pub shipments_delayed: i64,
    pub visitors_on_site: i64,
    pub vehicles_on_site: i64,
    pub employees_checked_in: i64,
    pub cold_rooms_out_of_range: i64,
    pub unacknowledged_alerts: i64,
    pub generated_at: DateTime<Utc>,
}
