//! Employee routes

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams, ValidateJson};
use crate::app::AppState;
use crate::auth::{RequireAuth, Role};
use crate::domain::employees::{
    CreateEmployeeRequest, EmployeeQuery, EmployeeResponse, UpdateEmployeeRequest,
};
use crate::error::ApiError;

const EMPLOYEE_COLUMNS: &str = "id, employee_code, full_name, department, position, phone, \
     email, hourly_rate, hired_on, active, created_at, updated_at";

/// GET /api/employees
pub async fn list_employees(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmployeeQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams::new(query.page, query.per_page);
    let search = query.search.as_deref().map(|s| format!("%{}%", s.trim()));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM employees
        WHERE tenant_id = $1
          AND ($2::text IS NULL OR department = $2)
          AND ($3::boolean IS NULL OR active = $3)
          AND ($4::text IS NULL OR full_name ILIKE $4 OR employee_code ILIKE $4)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(&query.department)
    .bind(query.active)
    .bind(&search)
    .fetch_one(&state.db)
    .await?;

    let employees = sqlx::query_as::<_, EmployeeResponse>(&format!(
        r#"
        SELECT {EMPLOYEE_COLUMNS}
        FROM employees
        WHERE tenant_id = $1
          AND ($2::text IS NULL OR department = $2)
          AND ($3::boolean IS NULL OR active = $3)
          AND ($4::text IS NULL OR full_name ILIKE $4 OR employee_code ILIKE $4)
        ORDER BY full_name ASC
        LIMIT $5 OFFSET $6
        "#
    ))
    .bind(auth.tenant_id)
    .bind(&query.department)
    .bind(query.active)
    .bind(&search)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(employees, &pagination, total))
}

/// GET /api/employees/:id
pub async fn get_employee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let employee = sqlx::query_as::<_, EmployeeResponse>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1 AND tenant_id = $2"
    ))
    .bind(id)
    .bind(auth.tenant_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    Ok(DataResponse::new(employee))
}

/// POST /api/employees
pub async fn create_employee(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreateEmployeeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let employee = sqlx::query_as::<_, EmployeeResponse>(&format!(
        r#"
        INSERT INTO employees
            (tenant_id, employee_code, full_name, department, position, phone, email, hourly_rate, hired_on)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {EMPLOYEE_COLUMNS}
        "#
    ))
    .bind(auth.tenant_id)
    .bind(req.employee_code.trim())
    .bind(req.full_name.trim())
    .bind(&req.department)
    .bind(&req.position)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(req.hourly_rate)
    .bind(req.hired_on)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        employee_id = %employee.id,
        employee_code = %employee.employee_code,
        "Employee created"
    );

    Ok(Created(employee))
}

/// PUT /api/employees/:id
pub async fn update_employee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<UpdateEmployeeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let employee = sqlx::query_as::<_, EmployeeResponse>(&format!(
        r#"
        UPDATE employees SET
            employee_code = COALESCE($3, employee_code),
            full_name = COALESCE($4, full_name),
            department = COALESCE($5, department),
            position = COALESCE($6, position),
            phone = COALESCE($7, phone),
            email = COALESCE($8, email),
            hourly_rate = COALESCE($9, hourly_rate),
            hired_on = COALESCE($10, hired_on),
            active = COALESCE($11, active),
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        RETURNING {EMPLOYEE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(auth.tenant_id)
    .bind(req.employee_code.as_deref().map(str::trim))
    .bind(req.full_name.as_deref().map(str::trim))
    .bind(&req.department)
    .bind(&req.position)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(req.hourly_rate)
    .bind(req.hired_on)
    .bind(req.active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    Ok(DataResponse::new(employee))
}

/// DELETE /api/employees/:id
///
/// Managers only. Employees with attendance, payroll or cold-room history
/// must be deactivated instead.
pub async fn delete_employee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(Role::Manager)?;

    let result = sqlx::query("DELETE FROM employees WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(auth.tenant_id)
        .execute(&state.db)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => {
                ApiError::conflict("Employee has history on record; deactivate instead")
            }
            other => other,
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Employee not found"));
    }

    tracing::info!(tenant_id = %auth.tenant_id, employee_id = %id, "Employee deleted");

    Ok(NoContent)
}
