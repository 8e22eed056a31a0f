//! Dashboard summary route
//!
//! The summary is cached per tenant in Redis; handlers that change the
//! figures call [`invalidate`].

use axum::{extract::State, response::IntoResponse};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::dashboard::DashboardSummary;
use crate::error::ApiError;
use crate::services::cache::keys;

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    receivings_pending_qc: i64,
    receivings_today: i64,
    qc_accepted_today: i64,
    qc_on_hold_today: i64,
    qc_rejected_today: i64,
    shipments_in_transit: i64,
    shipments_delayed: i64,
    visitors_on_site: i64,
    vehicles_on_site: i64,
    employees_checked_in: i64,
    cold_rooms_out_of_range: i64,
    unacknowledged_alerts: i64,
}

/// Drop the cached summary of a tenant.
pub async fn invalidate(state: &AppState, tenant_id: Uuid) {
    state.cache.invalidate(&keys::dashboard(tenant_id)).await;
}

fn acceptance_rate(accepted: i64, on_hold: i64, rejected: i64) -> Option<Decimal> {
    let total = accepted + on_hold + rejected;
    if total == 0 {
        return None;
    }
    Some((Decimal::from(accepted * 100) / Decimal::from(total)).round_dp(2))
}

/// GET /api/dashboard/summary
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let cache_key = keys::dashboard(auth.tenant_id);

    if let Some(cached) = state.cache.get::<DashboardSummary>(&cache_key).await {
        return Ok(DataResponse::new(cached));
    }

    // "Today" is the UTC calendar day.
    let row = sqlx::query_as::<_, SummaryRow>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM receivings
              WHERE tenant_id = $1 AND status = 'pending_qc') AS receivings_pending_qc,
            (SELECT COUNT(*) FROM receivings
              WHERE tenant_id = $1 AND received_at >= date_trunc('day', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC') AS receivings_today,
            (SELECT COUNT(*) FROM quality_checks
              WHERE tenant_id = $1 AND decision = 'accepted'
                AND inspected_at >= date_trunc('day', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC') AS qc_accepted_today,
            (SELECT COUNT(*) FROM quality_checks
              WHERE tenant_id = $1 AND decision = 'on_hold'
                AND inspected_at >= date_trunc('day', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC') AS qc_on_hold_today,
            (SELECT COUNT(*) FROM quality_checks
              WHERE tenant_id = $1 AND decision = 'rejected'
                AND inspected_at >= date_trunc('day', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC') AS qc_rejected_today,
            (SELECT COUNT(*) FROM shipments
              WHERE tenant_id = $1 AND status IN ('dispatched', 'in_transit')) AS shipments_in_transit,
            (SELECT COUNT(*) FROM shipments
              WHERE tenant_id = $1 AND status = 'delayed') AS shipments_delayed,
            (SELECT COUNT(*) FROM visitors
              WHERE tenant_id = $1 AND checked_out_at IS NULL) AS visitors_on_site,
            (SELECT COUNT(*) FROM vehicle_movements
              WHERE tenant_id = $1 AND exited_at IS NULL) AS vehicles_on_site,
            (SELECT COUNT(*) FROM attendance
              WHERE tenant_id = $1 AND check_out IS NULL) AS employees_checked_in,
            (SELECT COUNT(*) FROM cold_rooms c
              WHERE c.tenant_id = $1 AND c.active
                AND (SELECT r.out_of_range FROM cold_room_readings r
                      WHERE r.cold_room_id = c.id
                      ORDER BY r.recorded_at DESC LIMIT 1)) AS cold_rooms_out_of_range,
            (SELECT COUNT(*) FROM alerts
              WHERE tenant_id = $1 AND acknowledged_at IS NULL) AS unacknowledged_alerts
        "#,
    )
    .bind(auth.tenant_id)
    .fetch_one(&state.db)
    .await?;

    let summary = DashboardSummary {
        receivings_pending_qc: row.receivings_pending_qc,
        receivings_today: row.receivings_today,
        qc_accepted_today: row.qc_accepted_today,
        qc_on_hold_today: row.qc_on_hold_today,
        qc_rejected_today: row.qc_rejected_today,
        qc_acceptance_rate: acceptance_rate(
            row.qc_accepted_today,
            row.qc_on_hold_today,
            row.qc_rejected_today,
        ),
        shipments_in_transit: row.shipments_in_transit,
        shipments_delayed: row.shipments_delayed,
        visitors_on_site: row.visitors_on_site,
        vehicles_on_site: row.vehicles_on_site,
        employees_checked_in: row.employees_checked_in,
        cold_rooms_out_of_range: row.cold_rooms_out_of_range,
        unacknowledged_alerts: row.unacknowledged_alerts,
        generated_at: Utc::now(),
    };

    if let Err(e) = state.cache.set(&cache_key, &summary).await {
        tracing::warn!(tenant_id = %auth.tenant_id, error = %e, "Failed to cache dashboard summary");
    }

    Ok(DataResponse::new(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceptance_rate_is_a_rounded_percentage() {
        assert_eq!(acceptance_rate(0, 0, 0), None);
        assert_eq!(acceptance_rate(3, 0, 0), Some(Decimal::from(100)));
        assert_eq!(acceptance_rate(2, 1, 0), Some(Decimal::new(6667, 2)));
    }
}
