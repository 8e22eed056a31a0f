//! Utility meter routes
//!
//! Meters hold cumulative register readings; consumption is derived from
//! the differences between consecutive readings.

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
use crate::auth::{RequireAuth, Role};
use crate::domain::utilities::{
    check_reading_order, consumption_buckets, ConsumptionQuery, ConsumptionReport,
    CreateMeterReadingRequest, CreateMeterRequest, MeterKind, MeterQuery, MeterReadingQuery,
    MeterReadingResponse, MeterResponse, ReadingOrderError, UpdateMeterRequest,
};
use crate::error::ApiError;

#[derive(Debug, sqlx::FromRow)]
struct MeterRow {
    id: Uuid,
    name: String,
    kind: String,
    unit: String,
    location: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MeterRow> for MeterResponse {
    fn from(row: MeterRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            kind: MeterKind::from_db(&row.kind),
            unit: row.unit,
            location: row.location,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const METER_COLUMNS: &str = "id, name, kind, unit, location, active, created_at, updated_at";

async fn fetch_meter(db: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<MeterRow, ApiError> {
    sqlx::query_as::<_, MeterRow>(&format!(
        "SELECT {METER_COLUMNS} FROM utility_meters WHERE id = $1 AND tenant_id = $2"
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Meter not found"))
}

/// GET /api/utility-meters
pub async fn list_meters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MeterQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams::new(query.page, query.per_page);
    let kind = query.kind.map(|k| k.as_str());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM utility_meters
        WHERE tenant_id = $1
          AND ($2::text IS NULL OR kind = $2)
          AND ($3::boolean IS NULL OR active = $3)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(kind)
    .bind(query.active)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, MeterRow>(&format!(
        r#"
        SELECT {METER_COLUMNS}
        FROM utility_meters
        WHERE tenant_id = $1
          AND ($2::text IS NULL OR kind = $2)
          AND ($3::boolean IS NULL OR active = $3)
        ORDER BY name ASC
        LIMIT $4 OFFSET $5
        "#
    ))
    .bind(auth.tenant_id)
    .bind(kind)
    .bind(query.active)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data: Vec<MeterResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Paginated::new(data, &pagination, total))
}

/// GET /api/utility-meters/:id
pub async fn get_meter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let meter = fetch_meter(&state.db, auth.tenant_id, id).await?;
    Ok(DataResponse::new(MeterResponse::from(meter)))
}

/// POST /api/utility-meters
pub async fn create_meter(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreateMeterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, MeterRow>(&format!(
        r#"
        INSERT INTO utility_meters (tenant_id, name, kind, unit, location)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {METER_COLUMNS}
        "#
    ))
    .bind(auth.tenant_id)
    .bind(req.name.trim())
    .bind(req.kind.as_str())
    .bind(req.unit.trim())
    .bind(&req.location)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(tenant_id = %auth.tenant_id, meter_id = %row.id, kind = %row.kind, "Meter created");

    Ok(Created(MeterResponse::from(row)))
}

/// PUT /api/utility-meters/:id
pub async fn update_meter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<UpdateMeterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, MeterRow>(&format!(
        r#"
        UPDATE utility_meters SET
            name = COALESCE($3, name),
            unit = COALESCE($4, unit),
            location = COALESCE($5, location),
            active = COALESCE($6, active),
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        RETURNING {METER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(auth.tenant_id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.unit.as_deref().map(str::trim))
    .bind(&req.location)
    .bind(req.active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Meter not found"))?;

    Ok(DataResponse::new(MeterResponse::from(row)))
}

/// DELETE /api/utility-meters/:id
///
/// Managers only. Readings go with the meter.
pub async fn delete_meter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(Role::Manager)?;

    let result = sqlx::query("DELETE FROM utility_meters WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(auth.tenant_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Meter not found"));
    }

    tracing::info!(tenant_id = %auth.tenant_id, meter_id = %id, "Meter deleted");

    Ok(NoContent)
}

/// POST /api/utility-meters/:id/readings
///
/// Readings may be back-filled, but must fit between their neighbours.
pub async fn create_reading(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreateMeterReadingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let read_at = req.read_at.unwrap_or_else(Utc::now);

    let mut tx = state.db.begin().await?;

    let active: Option<bool> = sqlx::query_scalar(
        "SELECT active FROM utility_meters WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?;

    match active {
        None => return Err(ApiError::not_found("Meter not found")),
        Some(false) => return Err(ApiError::conflict("Meter is inactive")),
        Some(true) => {}
    }

    let previous: Option<Decimal> = sqlx::query_scalar(
        "SELECT value FROM utility_readings WHERE meter_id = $1 AND read_at < $2 ORDER BY read_at DESC LIMIT 1",
    )
    .bind(id)
    .bind(read_at)
    .fetch_optional(&mut *tx)
    .await?;

    let next: Option<Decimal> = sqlx::query_scalar(
        "SELECT value FROM utility_readings WHERE meter_id = $1 AND read_at > $2 ORDER BY read_at ASC LIMIT 1",
    )
    .bind(id)
    .bind(read_at)
    .fetch_optional(&mut *tx)
    .await?;

    check_reading_order(req.value, previous, next).map_err(|e| match e {
        ReadingOrderError::BelowPrevious { previous } => ApiError::bad_request(format!(
            "Reading {} is lower than the previous reading {}",
            req.value, previous
        )),
        ReadingOrderError::AboveNext { next } => ApiError::bad_request(format!(
            "Reading {} is higher than the following reading {}",
            req.value, next
        )),
    })?;

    let reading = sqlx::query_as::<_, MeterReadingResponse>(
        r#"
        INSERT INTO utility_readings (meter_id, value, read_at, recorded_by)
        VALUES ($1, $2, $3, $4)
        RETURNING id, meter_id, value, read_at, recorded_by
        "#,
    )
    .bind(id)
    .bind(req.value)
    .bind(read_at)
    .bind(auth.user_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(_) => {
            ApiError::conflict("A reading already exists for this meter at that time")
        }
        other => other,
    })?;

    tx.commit().await?;

    tracing::info!(tenant_id = %auth.tenant_id, meter_id = %id, value = %req.value, "Meter reading recorded");

    Ok(Created(reading))
}

/// GET /api/utility-meters/:id/readings
pub async fn list_readings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<MeterReadingQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_range(query.from.as_ref(), query.to.as_ref())?;
    fetch_meter(&state.db, auth.tenant_id, id).await?;
    let pagination = PaginationParams::new(query.page, query.per_page);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM utility_readings
        WHERE meter_id = $1
          AND ($2::timestamptz IS NULL OR read_at >= $2)
          AND ($3::timestamptz IS NULL OR read_at <= $3)
        "#,
    )
    .bind(id)
    .bind(query.from)
    .bind(query.to)
    .fetch_one(&state.db)
    .await?;

    let readings = sqlx::query_as::<_, MeterReadingResponse>(
        r#"
        SELECT id, meter_id, value, read_at, recorded_by
        FROM utility_readings
        WHERE meter_id = $1
          AND ($2::timestamptz IS NULL OR read_at >= $2)
          AND ($3::timestamptz IS NULL OR read_at <= $3)
        ORDER BY read_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(id)
    .bind(query.from)
    .bind(query.to)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(readings, &pagination, total))
}

/// GET /api/utility-meters/:id/consumption
///
/// The last reading before `from` serves as the baseline, so the first
/// period in range is not reported as zero.
pub async fn get_consumption(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ConsumptionQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_range(query.from.as_ref(), query.to.as_ref())?;
    let meter = fetch_meter(&state.db, auth.tenant_id, id).await?;

    let mut readings: Vec<(DateTime<Utc>, Decimal)> = sqlx::query_as(
        r#"
        SELECT read_at, value
        FROM utility_readings
        WHERE meter_id = $1
          AND ($2::timestamptz IS NULL OR read_at >= $2)
          AND ($3::timestamptz IS NULL OR read_at <= $3)
        ORDER BY read_at ASC
        "#,
    )
    .bind(id)
    .bind(query.from)
    .bind(query.to)
    .fetch_all(&state.db)
    .await?;

    let mut baseline_bucket = None;
    if let Some(from) = query.from {
        let baseline: Option<(DateTime<Utc>, Decimal)> = sqlx::query_as(
            "SELECT read_at, value FROM utility_readings WHERE meter_id = $1 AND read_at < $2 ORDER BY read_at DESC LIMIT 1",
        )
        .bind(id)
        .bind(from)
        .fetch_optional(&state.db)
        .await?;

        if let Some(baseline) = baseline {
            baseline_bucket = Some(query.interval.bucket_start(baseline.0));
            readings.insert(0, baseline);
        }
    }

    let mut buckets = consumption_buckets(&readings, query.interval);

    // The baseline is not itself a reading in range
    if let Some(start) = baseline_bucket {
        if let Some(first) = buckets.first_mut().filter(|b| b.period_start == start) {
            first.readings -= 1;
            if first.readings == 0 {
                buckets.remove(0);
            }
        }
    }

    let total = buckets.iter().map(|b| b.consumption).sum();

    Ok(DataResponse::new(ConsumptionReport {
        meter_id: meter.id,
        unit: meter.unit,
        interval: query.interval,
        buckets,
        total,
    }))
}
