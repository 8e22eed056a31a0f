//! Alert service
//!
//! Raises tenant alerts from the modules that detect operational problems.
//! Alerts are written inside the caller's transaction when one is open, so
//! they commit or roll back together with the event that caused them.

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::domain::alerts::{AlertKind, Severity};

/// Insert an alert for a tenant
pub async fn raise_alert<'e, E>(
    executor: E,
    tenant_id: Uuid,
    kind: AlertKind,
    severity: Severity,
    title: &str,
    message: Option<&str>,
    data: serde_json::Value,
) -> Result<Uuid, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let kind_str = kind.to_string();
    let severity_str = severity.to_string();

    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO alerts (tenant_id, kind, severity, title, message, data)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(tenant_id)
    .bind(&kind_str)
    .bind(&severity_str)
    .bind(title)
    .bind(message)
    .bind(&data)
    .fetch_one(executor)
    .await?;

    tracing::info!(
        tenant_id = %tenant_id,
        alert_kind = %kind_str,
        severity = %severity_str,
        alert_id = %id,
        "Alert raised"
    );

    Ok(id)
}

/// A cold-room reading fell outside the configured band
pub async fn temperature_excursion<'e, E>(
    executor: E,
    tenant_id: Uuid,
    cold_room_id: Uuid,
    room_name: &str,
    temperature_c: f64,
    min_temp_c: f64,
    max_temp_c: f64,
) -> Result<Uuid, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    raise_alert(
        executor,
        tenant_id,
        AlertKind::TemperatureExcursion,
        Severity::Critical,
        &format!("Temperature excursion in {}", room_name),
        Some(&format!(
            "Reading of {:.1} °C is outside {:.1} to {:.1} °C",
            temperature_c, min_temp_c, max_temp_c
        )),
        serde_json::json!({
            "cold_room_id": cold_room_id,
            "temperature_c": temperature_c,
            "min_temp_c": min_temp_c,
            "max_temp_c": max_temp_c,
        }),
    )
    .await
}

/// A QC inspection rejected a delivery
pub async fn qc_rejection<'e, E>(
    executor: E,
    tenant_id: Uuid,
    receiving_id: Uuid,
    quality_check_id: Uuid,
    grn_number: &str,
    findings: &serde_json::Value,
) -> Result<Uuid, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    raise_alert(
        executor,
        tenant_id,
        AlertKind::QcRejection,
        Severity::Warning,
        &format!("{} rejected at QC", grn_number),
        None,
        serde_json::json!({
            "receiving_id": receiving_id,
            "quality_check_id": quality_check_id,
            "grn_number": grn_number,
            "findings": findings,
        }),
    )
    .await
}

/// A shipment reported a delay
pub async fn shipment_delayed<'e, E>(
    executor: E,
    tenant_id: Uuid,
    shipment_id: Uuid,
    tracking_number: &str,
    location: Option<&str>,
    note: Option<&str>,
) -> Result<Uuid, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    raise_alert(
        executor,
        tenant_id,
        AlertKind::ShipmentDelayed,
        Severity::Warning,
        &format!("Shipment {} delayed", tracking_number),
        note,
        serde_json::json!({
            "shipment_id": shipment_id,
            "tracking_number": tracking_number,
            "location": location,
        }),
    )
    .await
}
