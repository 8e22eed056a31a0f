//! Payroll routes
//!
//! A payroll run freezes the pay of every active employee for a period,
//! computed from closed attendance records and the tenant's payroll policy.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams, ValidateJson};
use crate::app::AppState;
use crate::auth::{RequireAuth, Role};
use crate::domain::payroll::{
    compute_pay, CreatePayrollRunRequest, PayComputation, PayrollLineResponse, PayrollRunQuery,
    PayrollRunResponse, WorkedInterval,
};
use crate::error::ApiError;
use crate::routes::settings::load_tenant_settings;

#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    period_start: NaiveDate,
    period_end: NaiveDate,
    total_gross: Decimal,
    total_tax: Decimal,
    total_net: Decimal,
    employee_count: i32,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<RunRow> for PayrollRunResponse {
    fn from(row: RunRow) -> Self {
        Self {
            id: row.id,
            period_start: row.period_start,
            period_end: row.period_end,
            total_gross: row.total_gross,
            total_tax: row.total_tax,
            total_net: row.total_net,
            employee_count: row.employee_count,
            created_by: row.created_by,
            created_at: row.created_at,
            lines: None,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: Uuid,
    employee_id: Uuid,
    employee_code: String,
    employee_name: String,
    days_worked: i32,
    incomplete_records: i32,
    regular_hours: Decimal,
    overtime_hours: Decimal,
    hourly_rate: Decimal,
    gross_pay: Decimal,
    tax: Decimal,
    net_pay: Decimal,
}

impl From<LineRow> for PayrollLineResponse {
    fn from(row: LineRow) -> Self {
        Self {
            id: row.id,
            employee_id: row.employee_id,
            employee_code: row.employee_code,
            employee_name: row.employee_name,
            pay: PayComputation {
                days_worked: row.days_worked,
                incomplete_records: row.incomplete_records,
                regular_hours: row.regular_hours,
                overtime_hours: row.overtime_hours,
                hourly_rate: row.hourly_rate,
                gross_pay: row.gross_pay,
                tax: row.tax,
                net_pay: row.net_pay,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PayableEmployee {
    id: Uuid,
    hourly_rate: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct AttendanceInterval {
    employee_id: Uuid,
    work_date: NaiveDate,
    check_in: DateTime<Utc>,
    check_out: Option<DateTime<Utc>>,
}

const RUN_COLUMNS: &str = "id, period_start, period_end, total_gross, total_tax, total_net, \
     employee_count, created_by, created_at";

async fn fetch_run(db: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<PayrollRunResponse, ApiError> {
    let row = sqlx::query_as::<_, RunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM payroll_runs WHERE id = $1 AND tenant_id = $2"
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Payroll run not found"))?;

    let lines = sqlx::query_as::<_, LineRow>(
        r#"
        SELECT l.id, l.employee_id, e.employee_code, e.full_name AS employee_name,
               l.days_worked, l.incomplete_records, l.regular_hours, l.overtime_hours,
               l.hourly_rate, l.gross_pay, l.tax, l.net_pay
        FROM payroll_lines l
        JOIN employees e ON e.id = l.employee_id
        WHERE l.payroll_run_id = $1
        ORDER BY e.full_name ASC
        "#,
    )
    .bind(id)
    .fetch_all(db)
    .await?;

    let mut run = PayrollRunResponse::from(row);
    run.lines = Some(lines.into_iter().map(Into::into).collect());
    Ok(run)
}

/// POST /api/payroll/runs
///
/// Managers only. Periods of runs within a tenant never overlap.
pub async fn create_payroll_run(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreatePayrollRunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(Role::Manager)?;

    let settings = load_tenant_settings(&state.db, auth.tenant_id).await?;

    let mut tx = state.db.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("payroll:{}", auth.tenant_id))
        .execute(&mut *tx)
        .await?;

    let overlapping: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM payroll_runs
            WHERE tenant_id = $1 AND period_start <= $3 AND period_end >= $2
        )
        "#,
    )
    .bind(auth.tenant_id)
    .bind(req.period_start)
    .bind(req.period_end)
    .fetch_one(&mut *tx)
    .await?;

    if overlapping {
        return Err(ApiError::conflict(
            "A payroll run already covers part of this period",
        ));
    }

    let employees = sqlx::query_as::<_, PayableEmployee>(
        "SELECT id, hourly_rate FROM employees WHERE tenant_id = $1 AND active ORDER BY full_name",
    )
    .bind(auth.tenant_id)
    .fetch_all(&mut *tx)
    .await?;

    let records = sqlx::query_as::<_, AttendanceInterval>(
        r#"
        SELECT employee_id, work_date, check_in, check_out
        FROM attendance
        WHERE tenant_id = $1 AND work_date BETWEEN $2 AND $3
        "#,
    )
    .bind(auth.tenant_id)
    .bind(req.period_start)
    .bind(req.period_end)
    .fetch_all(&mut *tx)
    .await?;

    let mut by_employee: HashMap<Uuid, Vec<WorkedInterval>> = HashMap::new();
    for record in records {
        by_employee
            .entry(record.employee_id)
            .or_default()
            .push(WorkedInterval {
                work_date: record.work_date,
                check_in: record.check_in,
                check_out: record.check_out,
            });
    }

    let lines: Vec<(Uuid, PayComputation)> = employees
        .iter()
        .map(|employee| {
            let intervals = by_employee
                .get(&employee.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            (
                employee.id,
                compute_pay(intervals, employee.hourly_rate, &settings.payroll),
            )
        })
        .collect();

    let total_gross: Decimal = lines.iter().map(|(_, pay)| pay.gross_pay).sum();
    let total_tax: Decimal = lines.iter().map(|(_, pay)| pay.tax).sum();
    let total_net: Decimal = lines.iter().map(|(_, pay)| pay.net_pay).sum();
    let incomplete: i32 = lines.iter().map(|(_, pay)| pay.incomplete_records).sum();

    let run_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO payroll_runs
            (tenant_id, period_start, period_end, total_gross, total_tax, total_net, employee_count, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(auth.tenant_id)
    .bind(req.period_start)
    .bind(req.period_end)
    .bind(total_gross)
    .bind(total_tax)
    .bind(total_net)
    .bind(lines.len() as i32)
    .bind(auth.user_id)
    .fetch_one(&mut *tx)
    .await?;

    for (employee_id, pay) in &lines {
        sqlx::query(
            r#"
            INSERT INTO payroll_lines
                (payroll_run_id, employee_id, days_worked, incomplete_records, regular_hours,
                 overtime_hours, hourly_rate, gross_pay, tax, net_pay)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(run_id)
        .bind(employee_id)
        .bind(pay.days_worked)
        .bind(pay.incomplete_records)
        .bind(pay.regular_hours)
        .bind(pay.overtime_hours)
        .bind(pay.hourly_rate)
        .bind(pay.gross_pay)
        .bind(pay.tax)
        .bind(pay.net_pay)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        payroll_run_id = %run_id,
        period_start = %req.period_start,
        period_end = %req.period_end,
        employees = lines.len(),
        incomplete_records = incomplete,
        total_gross = %total_gross,
        "Payroll run created"
    );

    Ok(Created(fetch_run(&state.db, auth.tenant_id, run_id).await?))
}

/// GET /api/payroll/runs
pub async fn list_payroll_runs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PayrollRunQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams::new(query.page, query.per_page);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payroll_runs WHERE tenant_id = $1")
        .bind(auth.tenant_id)
        .fetch_one(&state.db)
        .await?;

    let rows = sqlx::query_as::<_, RunRow>(&format!(
        r#"
        SELECT {RUN_COLUMNS}
        FROM payroll_runs
        WHERE tenant_id = $1
        ORDER BY period_start DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(auth.tenant_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data: Vec<PayrollRunResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Paginated::new(data, &pagination, total))
}

/// GET /api/payroll/runs/:id
pub async fn get_payroll_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    Ok(DataResponse::new(fetch_run(&state.db, auth.tenant_id, id).await?))
}

/// DELETE /api/payroll/runs/:id
pub async fn delete_payroll_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(Role::Manager)?;

    let result = sqlx::query("DELETE FROM payroll_runs WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(auth.tenant_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Payroll run not found"));
    }

    tracing::info!(tenant_id = %auth.tenant_id, payroll_run_id = %id, "Payroll run deleted");

    Ok(NoContent)
}
