//! Goods receiving routes
//!
//! Supplier deliveries, their lines and the Goods Received Note.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{
    ensure_range, Created, DataResponse, NoContent, Paginated, PaginationParams, ValidateJson,
};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::quality::QcDecision;
use crate::domain::receiving::{
    CreateReceivingRequest, GoodsReceivedNote, ReceivingLineResponse, ReceivingQuery,
    ReceivingResponse, ReceivingStatus, UpdateReceivingStatusRequest,
};
use crate::domain::suppliers::SupplierResponse;
use crate::error::ApiError;
use crate::routes::dashboard;
use crate::services::numbering::{next_daily_code, Sequence};

#[derive(Debug, sqlx::FromRow)]
struct ReceivingRow {
    id: Uuid,
    grn_number: String,
    supplier_id: Uuid,
    supplier_name: String,
    vehicle_plate: Option<String>,
    driver_name: Option<String>,
    received_at: DateTime<Utc>,
    status: String,
    notes: Option<String>,
    received_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReceivingRow> for ReceivingResponse {
    fn from(row: ReceivingRow) -> Self {
        Self {
            id: row.id,
            grn_number: row.grn_number,
            supplier_id: row.supplier_id,
            supplier_name: row.supplier_name,
            vehicle_plate: row.vehicle_plate,
            driver_name: row.driver_name,
            received_at: row.received_at,
            status: ReceivingStatus::from_db(&row.status),
            notes: row.notes,
            received_by: row.received_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            lines: None,
        }
    }
}

const RECEIVING_SELECT: &str = r#"
    SELECT r.id, r.grn_number, r.supplier_id, s.name AS supplier_name, r.vehicle_plate,
           r.driver_name, r.received_at, r.status, r.notes, r.received_by,
           r.created_at, r.updated_at
    FROM receivings r
    JOIN suppliers s ON s.id = r.supplier_id
"#;

async fn fetch_receiving(db: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<ReceivingResponse, ApiError> {
    let row = sqlx::query_as::<_, ReceivingRow>(&format!(
        "{RECEIVING_SELECT} WHERE r.id = $1 AND r.tenant_id = $2"
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Receiving not found"))?;

    Ok(row.into())
}

async fn fetch_lines(db: &PgPool, receiving_id: Uuid) -> Result<Vec<ReceivingLineResponse>, ApiError> {
    let lines = sqlx::query_as::<_, ReceivingLineResponse>(
        r#"
        SELECT id, line_no, product, variety, lot_number, quantity, unit, unit_price
        FROM receiving_lines
        WHERE receiving_id = $1
        ORDER BY line_no ASC
        "#,
    )
    .bind(receiving_id)
    .fetch_all(db)
    .await?;

    Ok(lines)
}

/// POST /api/receivings
///
/// Record a delivery with its lines and assign the next GRN number of the
/// delivery date.
pub async fn create_receiving(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreateReceivingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let received_at = req.received_at.unwrap_or_else(Utc::now);

    let mut tx = state.db.begin().await?;

    let supplier_active: Option<bool> =
        sqlx::query_scalar("SELECT active FROM suppliers WHERE id = $1 AND tenant_id = $2")
            .bind(req.supplier_id)
            .bind(auth.tenant_id)
            .fetch_optional(&mut *tx)
            .await?;

    match supplier_active {
        None => return Err(ApiError::bad_request("Unknown supplier")),
        Some(false) => return Err(ApiError::conflict("Supplier is inactive")),
        Some(true) => {}
    }

    let grn_number = next_daily_code(
        &mut *tx,
        auth.tenant_id,
        Sequence::Grn,
        received_at.date_naive(),
    )
    .await?;

    let receiving_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO receivings
            (tenant_id, grn_number, supplier_id, vehicle_plate, driver_name, received_at, notes, received_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(auth.tenant_id)
    .bind(&grn_number)
    .bind(req.supplier_id)
    .bind(&req.vehicle_plate)
    .bind(&req.driver_name)
    .bind(received_at)
    .bind(&req.notes)
    .bind(auth.user_id)
    .fetch_one(&mut *tx)
    .await?;

    for (index, line) in req.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO receiving_lines
                (receiving_id, line_no, product, variety, lot_number, quantity, unit, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(receiving_id)
        .bind(index as i32 + 1)
        .bind(line.product.trim())
        .bind(&line.variety)
        .bind(&line.lot_number)
        .bind(line.quantity)
        .bind(line.unit.trim())
        .bind(line.unit_price)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        receiving_id = %receiving_id,
        grn_number = %grn_number,
        lines = req.lines.len(),
        "Receiving recorded"
    );

    dashboard::invalidate(&state, auth.tenant_id).await;

    let mut receiving = fetch_receiving(&state.db, auth.tenant_id, receiving_id).await?;
    receiving.lines = Some(fetch_lines(&state.db, receiving_id).await?);

    Ok(Created(receiving))
}

/// GET /api/receivings
pub async fn list_receivings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReceivingQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_range(query.from.as_ref(), query.to.as_ref())?;
    let pagination = PaginationParams::new(query.page, query.per_page);
    let status = query.status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM receivings r
        WHERE r.tenant_id = $1
          AND ($2::uuid IS NULL OR r.supplier_id = $2)
          AND ($3::text IS NULL OR r.status = $3)
          AND ($4::timestamptz IS NULL OR r.received_at >= $4)
          AND ($5::timestamptz IS NULL OR r.received_at <= $5)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(query.supplier_id)
    .bind(status)
    .bind(query.from)
    .bind(query.to)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, ReceivingRow>(&format!(
        r#"
        {RECEIVING_SELECT}
        WHERE r.tenant_id = $1
          AND ($2::uuid IS NULL OR r.supplier_id = $2)
          AND ($3::text IS NULL OR r.status = $3)
          AND ($4::timestamptz IS NULL OR r.received_at >= $4)
          AND ($5::timestamptz IS NULL OR r.received_at <= $5)
        ORDER BY r.received_at DESC
        LIMIT $6 OFFSET $7
        "#
    ))
    .bind(auth.tenant_id)
    .bind(query.supplier_id)
    .bind(status)
    .bind(query.from)
    .bind(query.to)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data: Vec<ReceivingResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Paginated::new(data, &pagination, total))
}

/// GET /api/receivings/:id
pub async fn get_receiving(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let mut receiving = fetch_receiving(&state.db, auth.tenant_id, id).await?;
    receiving.lines = Some(fetch_lines(&state.db, id).await?);

    Ok(DataResponse::new(receiving))
}

/// PATCH /api/receivings/:id/status
pub async fn update_receiving_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<UpdateReceivingStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query(
        r#"
        UPDATE receivings SET
            status = $3,
            notes = COALESCE($4, notes),
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        "#,
    )
    .bind(id)
    .bind(auth.tenant_id)
    .bind(req.status.as_str())
    .bind(&req.notes)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Receiving not found"));
    }

    tracing::info!(
        tenant_id = %auth.tenant_id,
        receiving_id = %id,
        status = req.status.as_str(),
        "Receiving status set manually"
    );

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(DataResponse::new(fetch_receiving(&state.db, auth.tenant_id, id).await?))
}

/// DELETE /api/receivings/:id
///
/// Only deliveries still waiting for QC can be deleted.
pub async fn delete_receiving(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query(
        "DELETE FROM receivings WHERE id = $1 AND tenant_id = $2 AND status = 'pending_qc'",
    )
    .bind(id)
    .bind(auth.tenant_id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        // Distinguish a missing receiving from one that already went through QC
        fetch_receiving(&state.db, auth.tenant_id, id).await?;
        return Err(ApiError::conflict(
            "Only receivings pending QC can be deleted",
        ));
    }

    tracing::info!(tenant_id = %auth.tenant_id, receiving_id = %id, "Receiving deleted");

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(NoContent)
}

/// GET /api/receivings/:id/grn
///
/// The Goods Received Note document for a delivery.
pub async fn get_grn(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let receiving = fetch_receiving(&state.db, auth.tenant_id, id).await?;

    let supplier = sqlx::query_as::<_, SupplierResponse>(
        r#"
        SELECT id, code, name, contact_name, phone, email, address,
               produce_categories, active, created_at, updated_at
        FROM suppliers
        WHERE id = $1 AND tenant_id = $2
        "#,
    )
    .bind(receiving.supplier_id)
    .bind(auth.tenant_id)
    .fetch_one(&state.db)
    .await?;

    let lines = fetch_lines(&state.db, id).await?;

    let latest_decision: Option<String> = sqlx::query_scalar(
        r#"
        SELECT decision FROM quality_checks
        WHERE receiving_id = $1 AND tenant_id = $2
        ORDER BY inspected_at DESC
        LIMIT 1
        "#,
    )
    .bind(id)
    .bind(auth.tenant_id)
    .fetch_optional(&state.db)
    .await?;

    let grn = GoodsReceivedNote::build(
        receiving,
        supplier,
        lines,
        latest_decision.as_deref().map(QcDecision::from_db),
        Utc::now(),
    );

    Ok(DataResponse::new(grn))
}
