//! Attendance routes
//!
//! Employee check-in/check-out; closed records feed payroll.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{ensure_range, Created, DataResponse, Paginated, PaginationParams, ValidateJson};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::attendance::{
    AttendanceQuery, AttendanceResponse, CheckInRequest, CheckOutRequest,
};
use crate::error::ApiError;
use crate::routes::dashboard;

#[derive(Debug, sqlx::FromRow)]
struct AttendanceRow {
    id: Uuid,
    employee_id: Uuid,
    employee_name: String,
    work_date: NaiveDate,
    check_in: DateTime<Utc>,
    check_out: Option<DateTime<Utc>>,
}

impl From<AttendanceRow> for AttendanceResponse {
    fn from(row: AttendanceRow) -> Self {
        Self {
            id: row.id,
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            work_date: row.work_date,
            check_in: row.check_in,
            check_out: row.check_out,
            worked_minutes: AttendanceResponse::worked_minutes(row.check_in, row.check_out),
        }
    }
}

/// POST /api/attendance/check-in
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CheckInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let at = req.at.unwrap_or_else(Utc::now);

    let (employee_name, active): (String, bool) = sqlx::query_as(
        "SELECT full_name, active FROM employees WHERE id = $1 AND tenant_id = $2",
    )
    .bind(req.employee_id)
    .bind(auth.tenant_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    if !active {
        return Err(ApiError::conflict("Employee is inactive"));
    }

    let row = sqlx::query_as::<_, AttendanceRow>(
        r#"
        INSERT INTO attendance (tenant_id, employee_id, work_date, check_in)
        VALUES ($1, $2, $3, $4)
        RETURNING id, employee_id, $5::text AS employee_name, work_date, check_in, check_out
        "#,
    )
    .bind(auth.tenant_id)
    .bind(req.employee_id)
    .bind(at.date_naive())
    .bind(at)
    .bind(&employee_name)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(_) => ApiError::conflict("Employee is already checked in"),
        other => other,
    })?;

    tracing::info!(tenant_id = %auth.tenant_id, employee_id = %req.employee_id, "Employee checked in");

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(Created(AttendanceResponse::from(row)))
}

/// POST /api/attendance/check-out
pub async fn check_out(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CheckOutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let at = req.at.unwrap_or_else(Utc::now);

    let mut tx = state.db.begin().await?;

    let open: Option<(Uuid, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT id, check_in FROM attendance
        WHERE employee_id = $1 AND tenant_id = $2 AND check_out IS NULL
        FOR UPDATE
        "#,
    )
    .bind(req.employee_id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((record_id, checked_in_at)) = open else {
        return Err(ApiError::conflict("Employee is not checked in"));
    };

    if at <= checked_in_at {
        return Err(ApiError::bad_request("Check-out must be after check-in"));
    }

    let row = sqlx::query_as::<_, AttendanceRow>(
        r#"
        UPDATE attendance a SET check_out = $2
        FROM employees e
        WHERE a.id = $1 AND e.id = a.employee_id
        RETURNING a.id, a.employee_id, e.full_name AS employee_name, a.work_date, a.check_in, a.check_out
        "#,
    )
    .bind(record_id)
    .bind(at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        employee_id = %req.employee_id,
        worked_minutes = ?AttendanceResponse::worked_minutes(row.check_in, row.check_out),
        "Employee checked out"
    );

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(DataResponse::new(AttendanceResponse::from(row)))
}

/// GET /api/attendance
pub async fn list_attendance(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AttendanceQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_range(query.from.as_ref(), query.to.as_ref())?;
    let pagination = PaginationParams::new(query.page, query.per_page);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM attendance
        WHERE tenant_id = $1
          AND ($2::uuid IS NULL OR employee_id = $2)
          AND ($3::date IS NULL OR work_date >= $3)
          AND ($4::date IS NULL OR work_date <= $4)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(query.employee_id)
    .bind(query.from)
    .bind(query.to)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, AttendanceRow>(
        r#"
        SELECT a.id, a.employee_id, e.full_name AS employee_name, a.work_date, a.check_in, a.check_out
        FROM attendance a
        JOIN employees e ON e.id = a.employee_id
        WHERE a.tenant_id = $1
          AND ($2::uuid IS NULL OR a.employee_id = $2)
          AND ($3::date IS NULL OR a.work_date >= $3)
          AND ($4::date IS NULL OR a.work_date <= $4)
        ORDER BY a.check_in DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(auth.tenant_id)
    .bind(query.employee_id)
    .bind(query.from)
    .bind(query.to)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data: Vec<AttendanceResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Paginated::new(data, &pagination, total))
}
