//! Carrier routes

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams, ValidateJson};
use crate::app::AppState;
use crate::auth::{RequireAuth, Role};
use crate::domain::carriers::{
    CarrierQuery, CarrierResponse, CreateCarrierRequest, UpdateCarrierRequest,
};
use crate::error::ApiError;

const CARRIER_COLUMNS: &str =
    "id, name, contact_name, phone, email, refrigerated, active, created_at, updated_at";

/// GET /api/carriers
pub async fn list_carriers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CarrierQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams::new(query.page, query.per_page);
    let search = query.search.as_deref().map(|s| format!("%{}%", s.trim()));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM carriers
        WHERE tenant_id = $1
          AND ($2::text IS NULL OR name ILIKE $2 OR contact_name ILIKE $2)
          AND ($3::boolean IS NULL OR active = $3)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(&search)
    .bind(query.active)
    .fetch_one(&state.db)
    .await?;

    let carriers = sqlx::query_as::<_, CarrierResponse>(&format!(
        r#"
        SELECT {CARRIER_COLUMNS}
        FROM carriers
        WHERE tenant_id = $1
          AND ($2::text IS NULL OR name ILIKE $2 OR contact_name ILIKE $2)
          AND ($3::boolean IS NULL OR active = $3)
        ORDER BY name ASC
        LIMIT $4 OFFSET $5
        "#
    ))
    .bind(auth.tenant_id)
    .bind(&search)
    .bind(query.active)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(carriers, &pagination, total))
}

/// GET /api/carriers/:id
pub async fn get_carrier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let carrier = sqlx::query_as::<_, CarrierResponse>(&format!(
        "SELECT {CARRIER_COLUMNS} FROM carriers WHERE id = $1 AND tenant_id = $2"
    ))
    .bind(id)
    .bind(auth.tenant_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Carrier not found"))?;

    Ok(DataResponse::new(carrier))
}

/// POST /api/carriers
pub async fn create_carrier(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreateCarrierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let carrier = sqlx::query_as::<_, CarrierResponse>(&format!(
        r#"
        INSERT INTO carriers (tenant_id, name, contact_name, phone, email, refrigerated)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {CARRIER_COLUMNS}
        "#
    ))
    .bind(auth.tenant_id)
    .bind(req.name.trim())
    .bind(&req.contact_name)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(req.refrigerated)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(tenant_id = %auth.tenant_id, carrier_id = %carrier.id, "Carrier created");

    Ok(Created(carrier))
}

/// PUT /api/carriers/:id
pub async fn update_carrier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<UpdateCarrierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let carrier = sqlx::query_as::<_, CarrierResponse>(&format!(
        r#"
        UPDATE carriers SET
            name = COALESCE($3, name),
            contact_name = COALESCE($4, contact_name),
            phone = COALESCE($5, phone),
            email = COALESCE($6, email),
            refrigerated = COALESCE($7, refrigerated),
            active = COALESCE($8, active),
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        RETURNING {CARRIER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(auth.tenant_id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(&req.contact_name)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(req.refrigerated)
    .bind(req.active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Carrier not found"))?;

    Ok(DataResponse::new(carrier))
}

/// DELETE /api/carriers/:id
///
/// Managers only; carriers referenced by shipments stay.
pub async fn delete_carrier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(Role::Manager)?;

    let result = sqlx::query("DELETE FROM carriers WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(auth.tenant_id)
        .execute(&state.db)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => {
                ApiError::conflict("Carrier is assigned to shipments; deactivate it instead")
            }
            other => other,
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Carrier not found"));
    }

    tracing::info!(tenant_id = %auth.tenant_id, carrier_id = %id, "Carrier deleted");

    Ok(NoContent)
}
