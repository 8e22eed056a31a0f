//! Cold room routes
//!
//! Rooms, temperature readings, the personnel entry/exit log and the
//! dwell-time views built on top of it.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{
    ensure_range, Created, DataResponse, NoContent, Paginated, PaginationParams, ValidateJson,
};
use crate::app::AppState;
use crate::auth::{RequireAuth, Role};
use crate::domain::cold_rooms::{
    check_personnel_event, current_occupants, ColdRoomQuery, ColdRoomResponse, ColdRoomStatus, CreateColdRoomRequest,
    CreatePersonnelLogRequest, CreateReadingRequest, DwellPolicy, DwellState, LogEvent,
    OccupancyResponse, PersonnelAction, PersonnelLogQuery, PersonnelLogResponse, ReadingQuery,
    PersonnelLogError, ReadingResponse, StatusBoardQuery, UpdateColdRoomRequest,
    MAX_EVENT_SKEW_MINUTES,
};
use crate::domain::settings::ColdRoomPolicy;
use crate::error::ApiError;
use crate::routes::{dashboard, settings::load_tenant_settings};
use crate::services::alerts;

const ROOM_COLUMNS: &str =
    "id, name, location, min_temp_c, max_temp_c, max_dwell_minutes, active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    cold_room_id: Uuid,
    employee_id: Uuid,
    employee_name: String,
    action: String,
    occurred_at: DateTime<Utc>,
    recorded_by: Uuid,
}

impl From<LogRow> for PersonnelLogResponse {
    fn from(row: LogRow) -> Self {
        Self {
            id: row.id,
            cold_room_id: row.cold_room_id,
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            action: PersonnelAction::from_db(&row.action),
            occurred_at: row.occurred_at,
            recorded_by: row.recorded_by,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    seq: i64,
    cold_room_id: Uuid,
    employee_id: Uuid,
    employee_name: String,
    action: String,
    occurred_at: DateTime<Utc>,
}

impl From<EventRow> for LogEvent {
    fn from(row: EventRow) -> Self {
        Self {
            seq: row.seq,
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            action: PersonnelAction::from_db(&row.action),
            occurred_at: row.occurred_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatusRow {
    id: Uuid,
    name: String,
    active: bool,
    min_temp_c: f64,
    max_temp_c: f64,
    max_dwell_minutes: Option<i32>,
    latest_temperature_c: Option<f64>,
    latest_humidity_pct: Option<f64>,
    latest_recorded_at: Option<DateTime<Utc>>,
    latest_out_of_range: Option<bool>,
}

fn dwell_policy(room_max_dwell: Option<i32>, tenant: &ColdRoomPolicy) -> DwellPolicy {
    DwellPolicy {
        max_dwell_minutes: room_max_dwell.unwrap_or(tenant.default_max_dwell_minutes),
        warning_ratio: tenant.dwell_warning_ratio,
    }
}

async fn fetch_room(db: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<ColdRoomResponse, ApiError> {
    sqlx::query_as::<_, ColdRoomResponse>(&format!(
        "SELECT {ROOM_COLUMNS} FROM cold_rooms WHERE id = $1 AND tenant_id = $2"
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Cold room not found"))
}

/// Log events that still matter at `now`: for each employee, everything
/// from their last exit onwards. Earlier history cannot affect who is inside.
async fn fetch_open_events(
    db: &PgPool,
    tenant_id: Uuid,
    room_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<Vec<EventRow>, ApiError> {
    let rows = sqlx::query_as::<_, EventRow>(
        r#"
        SELECT l.seq, l.cold_room_id, l.employee_id, e.full_name AS employee_name, l.action, l.occurred_at
        FROM cold_room_personnel_log l
        JOIN cold_rooms c ON c.id = l.cold_room_id
        JOIN employees e ON e.id = l.employee_id
        WHERE c.tenant_id = $1
          AND ($2::uuid IS NULL OR l.cold_room_id = $2)
          AND l.occurred_at <= $3
          AND l.occurred_at >= COALESCE(
              (SELECT MAX(x.occurred_at) FROM cold_room_personnel_log x
                WHERE x.cold_room_id = l.cold_room_id
                  AND x.employee_id = l.employee_id
                  AND x.action = 'exit'
                  AND x.occurred_at <= $3),
              '-infinity'::timestamptz)
        ORDER BY l.occurred_at ASC, l.seq ASC
        "#,
    )
    .bind(tenant_id)
    .bind(room_id)
    .bind(now)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

/// GET /api/cold-rooms
pub async fn list_cold_rooms(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ColdRoomQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams::new(query.page, query.per_page);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM cold_rooms WHERE tenant_id = $1 AND ($2::boolean IS NULL OR active = $2)",
    )
    .bind(auth.tenant_id)
    .bind(query.active)
    .fetch_one(&state.db)
    .await?;

    let rooms = sqlx::query_as::<_, ColdRoomResponse>(&format!(
        r#"
        SELECT {ROOM_COLUMNS}
        FROM cold_rooms
        WHERE tenant_id = $1 AND ($2::boolean IS NULL OR active = $2)
        ORDER BY name ASC
        LIMIT $3 OFFSET $4
        "#
    ))
    .bind(auth.tenant_id)
    .bind(query.active)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(rooms, &pagination, total))
}

/// GET /api/cold-rooms/:id
pub async fn get_cold_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    Ok(DataResponse::new(fetch_room(&state.db, auth.tenant_id, id).await?))
}

/// POST /api/cold-rooms
pub async fn create_cold_room(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreateColdRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room = sqlx::query_as::<_, ColdRoomResponse>(&format!(
        r#"
        INSERT INTO cold_rooms (tenant_id, name, location, min_temp_c, max_temp_c, max_dwell_minutes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {ROOM_COLUMNS}
        "#
    ))
    .bind(auth.tenant_id)
    .bind(req.name.trim())
    .bind(&req.location)
    .bind(req.min_temp_c)
    .bind(req.max_temp_c)
    .bind(req.max_dwell_minutes)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(tenant_id = %auth.tenant_id, cold_room_id = %room.id, name = %room.name, "Cold room created");

    Ok(Created(room))
}

/// PUT /api/cold-rooms/:id
pub async fn update_cold_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<UpdateColdRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = fetch_room(&state.db, auth.tenant_id, id).await?;
    let min = req.min_temp_c.unwrap_or(current.min_temp_c);
    let max = req.max_temp_c.unwrap_or(current.max_temp_c);
    if min >= max {
        return Err(ApiError::bad_request("min_temp_c must be below max_temp_c"));
    }

    let room = sqlx::query_as::<_, ColdRoomResponse>(&format!(
        r#"
        UPDATE cold_rooms SET
            name = COALESCE($3, name),
            location = COALESCE($4, location),
            min_temp_c = $5,
            max_temp_c = $6,
            max_dwell_minutes = COALESCE($7, max_dwell_minutes),
            active = COALESCE($8, active),
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        RETURNING {ROOM_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(auth.tenant_id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(&req.location)
    .bind(min)
    .bind(max)
    .bind(req.max_dwell_minutes)
    .bind(req.active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Cold room not found"))?;

    tracing::info!(tenant_id = %auth.tenant_id, cold_room_id = %room.id, "Cold room updated");

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(DataResponse::new(room))
}

/// DELETE /api/cold-rooms/:id
///
/// Managers only. Readings and the personnel log go with the room.
pub async fn delete_cold_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(Role::Manager)?;

    let result = sqlx::query("DELETE FROM cold_rooms WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(auth.tenant_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Cold room not found"));
    }

    tracing::info!(tenant_id = %auth.tenant_id, cold_room_id = %id, "Cold room deleted");

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(NoContent)
}

/// POST /api/cold-rooms/:id/readings
///
/// Readings outside the room's band are flagged and raise an alert.
pub async fn create_reading(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreateReadingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room = fetch_room(&state.db, auth.tenant_id, id).await?;
    let out_of_range = !room.in_range(req.temperature_c);

    let mut tx = state.db.begin().await?;

    let reading = sqlx::query_as::<_, ReadingResponse>(
        r#"
        INSERT INTO cold_room_readings (cold_room_id, temperature_c, humidity_pct, out_of_range, recorded_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, cold_room_id, temperature_c, humidity_pct, out_of_range, recorded_at
        "#,
    )
    .bind(room.id)
    .bind(req.temperature_c)
    .bind(req.humidity_pct)
    .bind(out_of_range)
    .bind(req.recorded_at.unwrap_or_else(Utc::now))
    .fetch_one(&mut *tx)
    .await?;

    if out_of_range {
        alerts::temperature_excursion(
            &mut *tx,
            auth.tenant_id,
            room.id,
            &room.name,
            reading.temperature_c,
            room.min_temp_c,
            room.max_temp_c,
        )
        .await?;

        tracing::warn!(
            tenant_id = %auth.tenant_id,
            cold_room_id = %room.id,
            temperature_c = reading.temperature_c,
            "Cold room temperature out of range"
        );
    }

    tx.commit().await?;

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(Created(reading))
}

/// GET /api/cold-rooms/:id/readings
pub async fn list_readings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReadingQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_range(query.from.as_ref(), query.to.as_ref())?;
    let room = fetch_room(&state.db, auth.tenant_id, id).await?;
    let pagination = PaginationParams::new(query.page, query.per_page);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM cold_room_readings
        WHERE cold_room_id = $1
          AND ($2::timestamptz IS NULL OR recorded_at >= $2)
          AND ($3::timestamptz IS NULL OR recorded_at <= $3)
        "#,
    )
    .bind(room.id)
    .bind(query.from)
    .bind(query.to)
    .fetch_one(&state.db)
    .await?;

    let readings = sqlx::query_as::<_, ReadingResponse>(
        r#"
        SELECT id, cold_room_id, temperature_c, humidity_pct, out_of_range, recorded_at
        FROM cold_room_readings
        WHERE cold_room_id = $1
          AND ($2::timestamptz IS NULL OR recorded_at >= $2)
          AND ($3::timestamptz IS NULL OR recorded_at <= $3)
        ORDER BY recorded_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(room.id)
    .bind(query.from)
    .bind(query.to)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(readings, &pagination, total))
}

/// POST /api/cold-rooms/:id/personnel-log
///
/// Record an employee entering or leaving the room. Entering twice or
/// leaving without having entered is a conflict. The event time may not
/// precede the employee's last event nor lie ahead of the server clock.
pub async fn create_personnel_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreatePersonnelLogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let at = req.at.unwrap_or(now);

    let mut tx = state.db.begin().await?;

    // Serializes log writes per room
    let room_exists: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM cold_rooms WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?;
    if room_exists.is_none() {
        return Err(ApiError::not_found("Cold room not found"));
    }

    let employee_name: String = sqlx::query_scalar(
        "SELECT full_name FROM employees WHERE id = $1 AND tenant_id = $2",
    )
    .bind(req.employee_id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::bad_request("Unknown employee"))?;

    let last: Option<(String, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT action, occurred_at FROM cold_room_personnel_log
        WHERE cold_room_id = $1 AND employee_id = $2
        ORDER BY occurred_at DESC, seq DESC
        LIMIT 1
        "#,
    )
    .bind(id)
    .bind(req.employee_id)
    .fetch_optional(&mut *tx)
    .await?;

    let last = last.map(|(action, occurred_at)| (PersonnelAction::from_db(&action), occurred_at));

    check_personnel_event(req.action, at, last, now).map_err(|e| match e {
        PersonnelLogError::AlreadyInside => {
            ApiError::conflict("Employee is already inside this cold room")
        }
        PersonnelLogError::NotInside => ApiError::conflict("Employee is not inside this cold room"),
        PersonnelLogError::BeforeLastEvent { last_at } => ApiError::bad_request(format!(
            "Event time precedes the employee's last logged event at {}",
            last_at
        )),
        PersonnelLogError::InFuture => ApiError::bad_request(format!(
            "Event time lies more than {} minutes in the future",
            MAX_EVENT_SKEW_MINUTES
        )),
    })?;

    let row = sqlx::query_as::<_, LogRow>(
        r#"
        INSERT INTO cold_room_personnel_log (cold_room_id, employee_id, action, occurred_at, recorded_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, cold_room_id, employee_id, $6::text AS employee_name, action, occurred_at, recorded_by
        "#,
    )
    .bind(id)
    .bind(req.employee_id)
    .bind(req.action.as_str())
    .bind(at)
    .bind(auth.user_id)
    .bind(&employee_name)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        cold_room_id = %id,
        employee_id = %req.employee_id,
        action = req.action.as_str(),
        "Cold room personnel event logged"
    );

    Ok(Created(PersonnelLogResponse::from(row)))
}

/// GET /api/cold-rooms/:id/personnel-log
pub async fn list_personnel_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PersonnelLogQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_range(query.from.as_ref(), query.to.as_ref())?;
    let room = fetch_room(&state.db, auth.tenant_id, id).await?;
    let pagination = PaginationParams::new(query.page, query.per_page);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM cold_room_personnel_log
        WHERE cold_room_id = $1
          AND ($2::uuid IS NULL OR employee_id = $2)
          AND ($3::timestamptz IS NULL OR occurred_at >= $3)
          AND ($4::timestamptz IS NULL OR occurred_at <= $4)
        "#,
    )
    .bind(room.id)
    .bind(query.employee_id)
    .bind(query.from)
    .bind(query.to)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, LogRow>(
        r#"
        SELECT l.id, l.cold_room_id, l.employee_id, e.full_name AS employee_name,
               l.action, l.occurred_at, l.recorded_by
        FROM cold_room_personnel_log l
        JOIN employees e ON e.id = l.employee_id
        WHERE l.cold_room_id = $1
          AND ($2::uuid IS NULL OR l.employee_id = $2)
          AND ($3::timestamptz IS NULL OR l.occurred_at >= $3)
          AND ($4::timestamptz IS NULL OR l.occurred_at <= $4)
        ORDER BY l.occurred_at DESC, l.seq DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(room.id)
    .bind(query.employee_id)
    .bind(query.from)
    .bind(query.to)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data: Vec<PersonnelLogResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Paginated::new(data, &pagination, total))
}

/// GET /api/cold-rooms/:id/occupancy
///
/// Who is inside right now and for how long, against the room's dwell limit.
pub async fn get_occupancy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let room = fetch_room(&state.db, auth.tenant_id, id).await?;
    let settings = load_tenant_settings(&state.db, auth.tenant_id).await?;
    let policy = dwell_policy(room.max_dwell_minutes, &settings.cold_room);
    let now = Utc::now();

    let events: Vec<LogEvent> = fetch_open_events(&state.db, auth.tenant_id, Some(room.id), now)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let occupants = current_occupants(&events, now, policy);
    let exceeded_count = occupants
        .iter()
        .filter(|o| o.state == DwellState::Exceeded)
        .count();

    Ok(DataResponse::new(OccupancyResponse {
        cold_room_id: room.id,
        cold_room_name: room.name,
        max_dwell_minutes: policy.max_dwell_minutes,
        warning_after_minutes: policy.warning_after_minutes(),
        occupants,
        exceeded_count,
        as_of: now,
    }))
}

/// GET /api/cold-rooms/status
///
/// Every room with its latest reading and occupancy counts, optionally
/// narrowed with `?active=`.
pub async fn get_status_board(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusBoardQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let settings = load_tenant_settings(&state.db, auth.tenant_id).await?;
    let now = Utc::now();

    let rooms = sqlx::query_as::<_, StatusRow>(
        r#"
        SELECT c.id, c.name, c.active, c.min_temp_c, c.max_temp_c, c.max_dwell_minutes,
               r.temperature_c AS latest_temperature_c,
               r.humidity_pct AS latest_humidity_pct,
               r.recorded_at AS latest_recorded_at,
               r.out_of_range AS latest_out_of_range
        FROM cold_rooms c
        LEFT JOIN LATERAL (
            SELECT temperature_c, humidity_pct, recorded_at, out_of_range
            FROM cold_room_readings
            WHERE cold_room_id = c.id
            ORDER BY recorded_at DESC
            LIMIT 1
        ) r ON TRUE
        WHERE c.tenant_id = $1 AND ($2::boolean IS NULL OR c.active = $2)
        ORDER BY c.name ASC
        "#,
    )
    .bind(auth.tenant_id)
    .bind(query.active)
    .fetch_all(&state.db)
    .await?;

    let mut events_by_room: HashMap<Uuid, Vec<LogEvent>> = HashMap::new();
    for row in fetch_open_events(&state.db, auth.tenant_id, None, now).await? {
        events_by_room
            .entry(row.cold_room_id)
            .or_default()
            .push(row.into());
    }

    let board: Vec<ColdRoomStatus> = rooms
        .into_iter()
        .map(|room| {
            let policy = dwell_policy(room.max_dwell_minutes, &settings.cold_room);
            let occupants = events_by_room
                .get(&room.id)
                .map(|events| current_occupants(events, now, policy))
                .unwrap_or_default();

            ColdRoomStatus {
                id: room.id,
                name: room.name,
                active: room.active,
                min_temp_c: room.min_temp_c,
                max_temp_c: room.max_temp_c,
                latest_temperature_c: room.latest_temperature_c,
                latest_humidity_pct: room.latest_humidity_pct,
                latest_recorded_at: room.latest_recorded_at,
                out_of_range: room.latest_out_of_range.unwrap_or(false),
                occupant_count: occupants.len(),
                exceeded_count: occupants
                    .iter()
                    .filter(|o| o.state == DwellState::Exceeded)
                    .count(),
            }
        })
        .collect();

    Ok(DataResponse::new(board))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_limit_overrides_tenant_default() {
        let tenant = ColdRoomPolicy::default();
        assert_eq!(dwell_policy(Some(15), &tenant).max_dwell_minutes, 15);
        assert_eq!(
            dwell_policy(None, &tenant).max_dwell_minutes,
            tenant.default_max_dwell_minutes
        );
        assert_eq!(dwell_policy(None, &tenant).warning_ratio, tenant.dwell_warning_ratio);
    }
}
