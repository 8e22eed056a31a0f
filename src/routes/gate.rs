//! Gate routes
//!
//! Vehicle entries and exits at the site gate.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{ensure_range, Created, DataResponse, Paginated, PaginationParams, ValidateJson};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::gate::{
    normalize_plate, VehicleEntryRequest, VehicleExitRequest, VehicleMovementResponse,
    VehicleQuery, VehicleType,
};
use crate::error::ApiError;
use crate::routes::dashboard;

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: Uuid,
    plate_number: String,
    driver_name: Option<String>,
    vehicle_type: String,
    purpose: Option<String>,
    shipment_id: Option<Uuid>,
    seal_number: Option<String>,
    entered_at: DateTime<Utc>,
    exited_at: Option<DateTime<Utc>>,
}

impl From<MovementRow> for VehicleMovementResponse {
    fn from(row: MovementRow) -> Self {
        Self {
            id: row.id,
            plate_number: row.plate_number,
            driver_name: row.driver_name,
            vehicle_type: VehicleType::from_db(&row.vehicle_type),
            purpose: row.purpose,
            shipment_id: row.shipment_id,
            seal_number: row.seal_number,
            entered_at: row.entered_at,
            exited_at: row.exited_at,
        }
    }
}

const MOVEMENT_COLUMNS: &str = "id, plate_number, driver_name, vehicle_type, purpose, \
     shipment_id, seal_number, entered_at, exited_at";

/// POST /api/gate/vehicles
///
/// Record a vehicle entering. A plate can only be on site once.
pub async fn record_entry(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<VehicleEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let plate = normalize_plate(&req.plate_number);
    if plate.len() < 2 {
        return Err(ApiError::bad_request("plate_number is too short"));
    }

    if let Some(shipment_id) = req.shipment_id {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM shipments WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(shipment_id)
        .bind(auth.tenant_id)
        .fetch_one(&state.db)
        .await?;

        if !exists {
            return Err(ApiError::bad_request("Unknown shipment"));
        }
    }

    let row = sqlx::query_as::<_, MovementRow>(&format!(
        r#"
        INSERT INTO vehicle_movements
            (tenant_id, plate_number, driver_name, vehicle_type, purpose, shipment_id, seal_number, entered_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {MOVEMENT_COLUMNS}
        "#
    ))
    .bind(auth.tenant_id)
    .bind(&plate)
    .bind(&req.driver_name)
    .bind(req.vehicle_type.as_str())
    .bind(&req.purpose)
    .bind(req.shipment_id)
    .bind(&req.seal_number)
    .bind(req.at.unwrap_or_else(Utc::now))
    .fetch_one(&state.db)
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(_) => ApiError::conflict(format!("Vehicle {} is already on site", plate)),
        other => other,
    })?;

    tracing::info!(tenant_id = %auth.tenant_id, movement_id = %row.id, plate = %plate, "Vehicle entered");

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(Created(VehicleMovementResponse::from(row)))
}

/// POST /api/gate/vehicles/:id/exit
///
/// The body is optional; without one the exit is recorded now.
pub async fn record_exit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    body: Option<Json<VehicleExitRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let at = body.and_then(|Json(req)| req.at).unwrap_or_else(Utc::now);

    let mut tx = state.db.begin().await?;

    let current: Option<(DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
        "SELECT entered_at, exited_at FROM vehicle_movements WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?;

    match current {
        None => return Err(ApiError::not_found("Vehicle movement not found")),
        Some((_, Some(_))) => return Err(ApiError::conflict("Vehicle has already exited")),
        Some((entered_at, None)) if at < entered_at => {
            return Err(ApiError::bad_request("Exit time precedes entry time"))
        }
        Some(_) => {}
    }

    let row = sqlx::query_as::<_, MovementRow>(&format!(
        "UPDATE vehicle_movements SET exited_at = $2 WHERE id = $1 RETURNING {MOVEMENT_COLUMNS}"
    ))
    .bind(id)
    .bind(at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(tenant_id = %auth.tenant_id, movement_id = %id, plate = %row.plate_number, "Vehicle exited");

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(DataResponse::new(VehicleMovementResponse::from(row)))
}

/// GET /api/gate/vehicles
pub async fn list_movements(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VehicleQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_range(query.from.as_ref(), query.to.as_ref())?;
    let pagination = PaginationParams::new(query.page, query.per_page);
    let plate = query.plate.as_deref().map(|p| format!("%{}%", normalize_plate(p)));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM vehicle_movements
        WHERE tenant_id = $1
          AND ($2::boolean IS NULL OR (exited_at IS NULL) = $2)
          AND ($3::text IS NULL OR plate_number LIKE $3)
          AND ($4::timestamptz IS NULL OR entered_at >= $4)
          AND ($5::timestamptz IS NULL OR entered_at <= $5)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(query.on_site)
    .bind(&plate)
    .bind(query.from)
    .bind(query.to)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, MovementRow>(&format!(
        r#"
        SELECT {MOVEMENT_COLUMNS}
        FROM vehicle_movements
        WHERE tenant_id = $1
          AND ($2::boolean IS NULL OR (exited_at IS NULL) = $2)
          AND ($3::text IS NULL OR plate_number LIKE $3)
          AND ($4::timestamptz IS NULL OR entered_at >= $4)
          AND ($5::timestamptz IS NULL OR entered_at <= $5)
        ORDER BY entered_at DESC
        LIMIT $6 OFFSET $7
        "#
    ))
    .bind(auth.tenant_id)
    .bind(query.on_site)
    .bind(&plate)
    .bind(query.from)
    .bind(query.to)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data: Vec<VehicleMovementResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Paginated::new(data, &pagination, total))
}
