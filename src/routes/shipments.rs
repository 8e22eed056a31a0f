//! Shipment routes
//!
//! Outbound shipments and their tracking events.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{
    ensure_range, Created, DataResponse, NoContent, Paginated, PaginationParams, ValidateJson,
};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::shipments::{
    CreateShipmentEventRequest, CreateShipmentRequest, ShipmentEventResponse, ShipmentQuery,
    ShipmentResponse, ShipmentStatus, UpdateShipmentRequest,
};
use crate::error::ApiError;
use crate::routes::dashboard;
use crate::services::alerts;

#[derive(Debug, sqlx::FromRow)]
struct ShipmentRow {
    id: Uuid,
    tracking_number: String,
    carrier_id: Option<Uuid>,
    carrier_name: Option<String>,
    origin: String,
    destination: String,
    cargo_description: Option<String>,
    weight_kg: Option<Decimal>,
    pallet_count: Option<i32>,
    temperature_controlled: bool,
    required_temp_c: Option<f64>,
    status: String,
    scheduled_departure: Option<DateTime<Utc>>,
    eta: Option<DateTime<Utc>>,
    departed_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ShipmentRow> for ShipmentResponse {
    fn from(row: ShipmentRow) -> Self {
        Self {
            id: row.id,
            tracking_number: row.tracking_number,
            carrier_id: row.carrier_id,
            carrier_name: row.carrier_name,
            origin: row.origin,
            destination: row.destination,
            cargo_description: row.cargo_description,
            weight_kg: row.weight_kg,
            pallet_count: row.pallet_count,
            temperature_controlled: row.temperature_controlled,
            required_temp_c: row.required_temp_c,
            status: ShipmentStatus::from_db(&row.status),
            scheduled_departure: row.scheduled_departure,
            eta: row.eta,
            departed_at: row.departed_at,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    shipment_id: Uuid,
    status: String,
    location: Option<String>,
    note: Option<String>,
    occurred_at: DateTime<Utc>,
    recorded_by: Uuid,
}

impl From<EventRow> for ShipmentEventResponse {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            shipment_id: row.shipment_id,
            status: ShipmentStatus::from_db(&row.status),
            location: row.location,
            note: row.note,
            occurred_at: row.occurred_at,
            recorded_by: row.recorded_by,
        }
    }
}

const SHIPMENT_SELECT: &str = r#"
    SELECT s.id, s.tracking_number, s.carrier_id, c.name AS carrier_name, s.origin,
           s.destination, s.cargo_description, s.weight_kg, s.pallet_count,
           s.temperature_controlled, s.required_temp_c, s.status, s.scheduled_departure,
           s.eta, s.departed_at, s.delivered_at, s.created_at, s.updated_at
    FROM shipments s
    LEFT JOIN carriers c ON c.id = s.carrier_id
"#;

async fn fetch_shipment(db: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<ShipmentResponse, ApiError> {
    let row = sqlx::query_as::<_, ShipmentRow>(&format!(
        "{SHIPMENT_SELECT} WHERE s.id = $1 AND s.tenant_id = $2"
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Shipment not found"))?;

    Ok(row.into())
}

async fn ensure_carrier(db: &PgPool, tenant_id: Uuid, carrier_id: Option<Uuid>) -> Result<(), ApiError> {
    let Some(carrier_id) = carrier_id else {
        return Ok(());
    };

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM carriers WHERE id = $1 AND tenant_id = $2)",
    )
    .bind(carrier_id)
    .bind(tenant_id)
    .fetch_one(db)
    .await?;

    if exists {
        Ok(())
    } else {
        Err(ApiError::bad_request("Unknown carrier"))
    }
}

/// POST /api/shipments
pub async fn create_shipment(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreateShipmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_carrier(&state.db, auth.tenant_id, req.carrier_id).await?;

    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO shipments
            (tenant_id, tracking_number, carrier_id, origin, destination, cargo_description,
             weight_kg, pallet_count, temperature_controlled, required_temp_c,
             scheduled_departure, eta)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id
        "#,
    )
    .bind(auth.tenant_id)
    .bind(req.tracking_number.trim())
    .bind(req.carrier_id)
    .bind(&req.origin)
    .bind(&req.destination)
    .bind(&req.cargo_description)
    .bind(req.weight_kg)
    .bind(req.pallet_count)
    .bind(req.temperature_controlled)
    .bind(req.required_temp_c)
    .bind(req.scheduled_departure)
    .bind(req.eta)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        shipment_id = %id,
        tracking_number = %req.tracking_number,
        "Shipment created"
    );

    Ok(Created(fetch_shipment(&state.db, auth.tenant_id, id).await?))
}

/// GET /api/shipments
pub async fn list_shipments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ShipmentQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_range(query.from.as_ref(), query.to.as_ref())?;
    let pagination = PaginationParams::new(query.page, query.per_page);
    let status = query.status.map(|s| s.as_str());
    let search = query.search.as_deref().map(|s| format!("%{}%", s.trim()));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM shipments s
        WHERE s.tenant_id = $1
          AND ($2::text IS NULL OR s.status = $2)
          AND ($3::uuid IS NULL OR s.carrier_id = $3)
          AND ($4::text IS NULL OR s.tracking_number ILIKE $4 OR s.destination ILIKE $4)
          AND ($5::timestamptz IS NULL OR s.scheduled_departure >= $5)
          AND ($6::timestamptz IS NULL OR s.scheduled_departure <= $6)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(status)
    .bind(query.carrier_id)
    .bind(&search)
    .bind(query.from)
    .bind(query.to)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, ShipmentRow>(&format!(
        r#"
        {SHIPMENT_SELECT}
        WHERE s.tenant_id = $1
          AND ($2::text IS NULL OR s.status = $2)
          AND ($3::uuid IS NULL OR s.carrier_id = $3)
          AND ($4::text IS NULL OR s.tracking_number ILIKE $4 OR s.destination ILIKE $4)
          AND ($5::timestamptz IS NULL OR s.scheduled_departure >= $5)
          AND ($6::timestamptz IS NULL OR s.scheduled_departure <= $6)
        ORDER BY s.created_at DESC
        LIMIT $7 OFFSET $8
        "#
    ))
    .bind(auth.tenant_id)
    .bind(status)
    .bind(query.carrier_id)
    .bind(&search)
    .bind(query.from)
    .bind(query.to)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data: Vec<ShipmentResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Paginated::new(data, &pagination, total))
}

/// GET /api/shipments/:id
pub async fn get_shipment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    Ok(DataResponse::new(fetch_shipment(&state.db, auth.tenant_id, id).await?))
}

/// PUT /api/shipments/:id
///
/// Edits shipment details. Status only moves through tracking events.
pub async fn update_shipment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<UpdateShipmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_carrier(&state.db, auth.tenant_id, req.carrier_id).await?;

    let result = sqlx::query(
        r#"
        UPDATE shipments SET
            tracking_number = COALESCE($3, tracking_number),
            carrier_id = COALESCE($4, carrier_id),
            origin = COALESCE($5, origin),
            destination = COALESCE($6, destination),
            cargo_description = COALESCE($7, cargo_description),
            weight_kg = COALESCE($8, weight_kg),
            pallet_count = COALESCE($9, pallet_count),
            temperature_controlled = COALESCE($10, temperature_controlled),
            required_temp_c = COALESCE($11, required_temp_c),
            scheduled_departure = COALESCE($12, scheduled_departure),
            eta = COALESCE($13, eta),
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        "#,
    )
    .bind(id)
    .bind(auth.tenant_id)
    .bind(req.tracking_number.as_deref().map(str::trim))
    .bind(req.carrier_id)
    .bind(&req.origin)
    .bind(&req.destination)
    .bind(&req.cargo_description)
    .bind(req.weight_kg)
    .bind(req.pallet_count)
    .bind(req.temperature_controlled)
    .bind(req.required_temp_c)
    .bind(req.scheduled_departure)
    .bind(req.eta)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Shipment not found"));
    }

    Ok(DataResponse::new(fetch_shipment(&state.db, auth.tenant_id, id).await?))
}

/// DELETE /api/shipments/:id
///
/// Only shipments that have not left yet can be deleted.
pub async fn delete_shipment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query(
        "DELETE FROM shipments WHERE id = $1 AND tenant_id = $2 AND status = 'pending'",
    )
    .bind(id)
    .bind(auth.tenant_id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        fetch_shipment(&state.db, auth.tenant_id, id).await?;
        return Err(ApiError::conflict("Only pending shipments can be deleted"));
    }

    tracing::info!(tenant_id = %auth.tenant_id, shipment_id = %id, "Shipment deleted");

    Ok(NoContent)
}

/// POST /api/shipments/:id/events
///
/// Append a tracking event and move the shipment to the event's status.
pub async fn create_shipment_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreateShipmentEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let occurred_at = req.occurred_at.unwrap_or_else(Utc::now);

    let mut tx = state.db.begin().await?;

    let (tracking_number, current): (String, String) = sqlx::query_as(
        "SELECT tracking_number, status FROM shipments WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Shipment not found"))?;

    let current = ShipmentStatus::from_db(&current);
    if !current.can_transition_to(req.status) {
        return Err(ApiError::conflict(format!(
            "Cannot move shipment from {} to {}",
            current.as_str(),
            req.status.as_str()
        )));
    }

    let event = sqlx::query_as::<_, EventRow>(
        r#"
        INSERT INTO shipment_events (shipment_id, status, location, note, occurred_at, recorded_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, shipment_id, status, location, note, occurred_at, recorded_by
        "#,
    )
    .bind(id)
    .bind(req.status.as_str())
    .bind(&req.location)
    .bind(&req.note)
    .bind(occurred_at)
    .bind(auth.user_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE shipments SET
            status = $2,
            departed_at = CASE WHEN $2 = 'dispatched' AND departed_at IS NULL THEN $3 ELSE departed_at END,
            delivered_at = CASE WHEN $2 = 'delivered' THEN $3 ELSE delivered_at END,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(req.status.as_str())
    .bind(occurred_at)
    .execute(&mut *tx)
    .await?;

    if req.status == ShipmentStatus::Delayed && current != ShipmentStatus::Delayed {
        alerts::shipment_delayed(
            &mut *tx,
            auth.tenant_id,
            id,
            &tracking_number,
            req.location.as_deref(),
            req.note.as_deref(),
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        shipment_id = %id,
        from = current.as_str(),
        to = req.status.as_str(),
        "Shipment event recorded"
    );

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(Created(ShipmentEventResponse::from(event)))
}

/// GET /api/shipments/:id/events
pub async fn list_shipment_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    fetch_shipment(&state.db, auth.tenant_id, id).await?;

    let rows = sqlx::query_as::<_, EventRow>(
        r#"
        SELECT id, shipment_id, status, location, note, occurred_at, recorded_by
        FROM shipment_events
        WHERE shipment_id = $1
        ORDER BY occurred_at ASC
        "#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let data: Vec<ShipmentEventResponse> = rows.into_iter().map(Into::into).collect();
    Ok(DataResponse::new(data))
}
