//! Supplier routes
//!
//! Produce supplier master data.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams, ValidateJson};
use crate::app::AppState;
use crate::auth::{RequireAuth, Role};
use crate::domain::suppliers::{
    CreateSupplierRequest, SupplierQuery, SupplierResponse, UpdateSupplierRequest,
};
use crate::error::ApiError;

const SUPPLIER_COLUMNS: &str = "id, code, name, contact_name, phone, email, address, \
     produce_categories, active, created_at, updated_at";

/// GET /api/suppliers
pub async fn list_suppliers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SupplierQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams::new(query.page, query.per_page);
    let search = query.search.as_deref().map(|s| format!("%{}%", s.trim()));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM suppliers
        WHERE tenant_id = $1
          AND ($2::text IS NULL OR name ILIKE $2 OR code ILIKE $2)
          AND ($3::boolean IS NULL OR active = $3)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(&search)
    .bind(query.active)
    .fetch_one(&state.db)
    .await?;

    let suppliers = sqlx::query_as::<_, SupplierResponse>(&format!(
        r#"
        SELECT {SUPPLIER_COLUMNS}
        FROM suppliers
        WHERE tenant_id = $1
          AND ($2::text IS NULL OR name ILIKE $2 OR code ILIKE $2)
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

    Ok(Paginated::new(suppliers, &pagination, total))
}

/// GET /api/suppliers/:id
pub async fn get_supplier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = sqlx::query_as::<_, SupplierResponse>(&format!(
        "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1 AND tenant_id = $2"
    ))
    .bind(id)
    .bind(auth.tenant_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Supplier not found"))?;

    Ok(DataResponse::new(supplier))
}

/// POST /api/suppliers
pub async fn create_supplier(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreateSupplierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = sqlx::query_as::<_, SupplierResponse>(&format!(
        r#"
        INSERT INTO suppliers (tenant_id, code, name, contact_name, phone, email, address, produce_categories)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {SUPPLIER_COLUMNS}
        "#
    ))
    .bind(auth.tenant_id)
    .bind(req.code.trim())
    .bind(req.name.trim())
    .bind(&req.contact_name)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(&req.address)
    .bind(&req.produce_categories)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(tenant_id = %auth.tenant_id, supplier_id = %supplier.id, code = %supplier.code, "Supplier created");

    Ok(Created(supplier))
}

/// PUT /api/suppliers/:id
pub async fn update_supplier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<UpdateSupplierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = sqlx::query_as::<_, SupplierResponse>(&format!(
        r#"
        UPDATE suppliers SET
            code = COALESCE($3, code),
            name = COALESCE($4, name),
            contact_name = COALESCE($5, contact_name),
            phone = COALESCE($6, phone),
            email = COALESCE($7, email),
            address = COALESCE($8, address),
            produce_categories = COALESCE($9, produce_categories),
            active = COALESCE($10, active),
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        RETURNING {SUPPLIER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(auth.tenant_id)
    .bind(req.code.as_deref().map(str::trim))
    .bind(req.name.as_deref().map(str::trim))
    .bind(&req.contact_name)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(&req.address)
    .bind(&req.produce_categories)
    .bind(req.active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Supplier not found"))?;

    Ok(DataResponse::new(supplier))
}

/// DELETE /api/suppliers/:id
///
/// Managers only. Suppliers with deliveries on record cannot be deleted;
/// deactivate them instead.
pub async fn delete_supplier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(Role::Manager)?;

    let result = sqlx::query("DELETE FROM suppliers WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(auth.tenant_id)
        .execute(&state.db)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => {
                ApiError::conflict("Supplier has receivings on record; deactivate it instead")
            }
            other => other,
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Supplier not found"));
    }

    tracing::info!(tenant_id = %auth.tenant_id, supplier_id = %id, "Supplier deleted");

    Ok(NoContent)
}
