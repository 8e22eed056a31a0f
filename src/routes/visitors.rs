//! Visitor routes
//!
//! Visitor check-in with a daily badge number, and check-out.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{ensure_range, Created, DataResponse, Paginated, PaginationParams, ValidateJson};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::gate::normalize_plate;
use crate::domain::visitors::{CheckInVisitorRequest, VisitorQuery, VisitorResponse};
use crate::error::ApiError;
use crate::routes::dashboard;
use crate::services::numbering::{next_daily_code, Sequence};

const VISITOR_SELECT: &str = r#"
    SELECT v.id, v.badge_number, v.full_name, v.company, v.phone, v.id_number,
           v.host_employee_id, e.full_name AS host_name, v.purpose, v.vehicle_plate,
           v.checked_in_at, v.checked_out_at
    FROM visitors v
    LEFT JOIN employees e ON e.id = v.host_employee_id
"#;

async fn fetch_visitor(db: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<VisitorResponse, ApiError> {
    sqlx::query_as::<_, VisitorResponse>(&format!(
        "{VISITOR_SELECT} WHERE v.id = $1 AND v.tenant_id = $2"
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Visitor not found"))
}

/// POST /api/visitors
pub async fn check_in_visitor(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CheckInVisitorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();

    let mut tx = state.db.begin().await?;

    if let Some(host_id) = req.host_employee_id {
        let host_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM employees WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(host_id)
        .bind(auth.tenant_id)
        .fetch_one(&mut *tx)
        .await?;

        if !host_exists {
            return Err(ApiError::bad_request("Unknown host employee"));
        }
    }

    let badge_number =
        next_daily_code(&mut *tx, auth.tenant_id, Sequence::VisitorBadge, now.date_naive()).await?;

    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO visitors
            (tenant_id, badge_number, full_name, company, phone, id_number,
             host_employee_id, purpose, vehicle_plate, checked_in_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(auth.tenant_id)
    .bind(&badge_number)
    .bind(req.full_name.trim())
    .bind(&req.company)
    .bind(&req.phone)
    .bind(&req.id_number)
    .bind(req.host_employee_id)
    .bind(&req.purpose)
    .bind(req.vehicle_plate.as_deref().map(normalize_plate))
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(tenant_id = %auth.tenant_id, visitor_id = %id, badge_number = %badge_number, "Visitor checked in");

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(Created(fetch_visitor(&state.db, auth.tenant_id, id).await?))
}

/// POST /api/visitors/:id/check-out
pub async fn check_out_visitor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query(
        r#"
        UPDATE visitors SET checked_out_at = NOW()
        WHERE id = $1 AND tenant_id = $2 AND checked_out_at IS NULL
        "#,
    )
    .bind(id)
    .bind(auth.tenant_id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        fetch_visitor(&state.db, auth.tenant_id, id).await?;
        return Err(ApiError::conflict("Visitor has already checked out"));
    }

    tracing::info!(tenant_id = %auth.tenant_id, visitor_id = %id, "Visitor checked out");

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(DataResponse::new(fetch_visitor(&state.db, auth.tenant_id, id).await?))
}

/// GET /api/visitors
pub async fn list_visitors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VisitorQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_range(query.from.as_ref(), query.to.as_ref())?;
    let pagination = PaginationParams::new(query.page, query.per_page);
    let search = query.search.as_deref().map(|s| format!("%{}%", s.trim()));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM visitors v
        WHERE v.tenant_id = $1
          AND ($2::boolean IS NULL OR (v.checked_out_at IS NULL) = $2)
          AND ($3::text IS NULL OR v.full_name ILIKE $3 OR v.company ILIKE $3 OR v.badge_number ILIKE $3)
          AND ($4::timestamptz IS NULL OR v.checked_in_at >= $4)
          AND ($5::timestamptz IS NULL OR v.checked_in_at <= $5)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(query.on_site)
    .bind(&search)
    .bind(query.from)
    .bind(query.to)
    .fetch_one(&state.db)
    .await?;

    let visitors = sqlx::query_as::<_, VisitorResponse>(&format!(
        r#"
        {VISITOR_SELECT}
        WHERE v.tenant_id = $1
          AND ($2::boolean IS NULL OR (v.checked_out_at IS NULL) = $2)
          AND ($3::text IS NULL OR v.full_name ILIKE $3 OR v.company ILIKE $3 OR v.badge_number ILIKE $3)
          AND ($4::timestamptz IS NULL OR v.checked_in_at >= $4)
          AND ($5::timestamptz IS NULL OR v.checked_in_at <= $5)
        ORDER BY v.checked_in_at DESC
        LIMIT $6 OFFSET $7
        "#
    ))
    .bind(auth.tenant_id)
    .bind(query.on_site)
    .bind(&search)
    .bind(query.from)
    .bind(query.to)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(visitors, &pagination, total))
}

/// GET /api/visitors/:id
pub async fn get_visitor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    Ok(DataResponse::new(fetch_visitor(&state.db, auth.tenant_id, id).await?))
}
