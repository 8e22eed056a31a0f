//! Quality control routes
//!
//! Inspections are evaluated against the tenant's QC criteria; the final
//! decision drives the receiving's status.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{ensure_range, Created, DataResponse, Paginated, PaginationParams, ValidateJson};
use crate::app::AppState;
use crate::auth::{RequireAuth, Role};
use crate::domain::quality::{
    evaluate, CreateQualityCheckRequest, Finding, QcDecision, QualityCheckQuery,
    QualityCheckResponse, QualityStats, QualityStatsQuery,
};
use crate::domain::receiving::ReceivingStatus;
use crate::error::ApiError;
use crate::routes::{dashboard, settings::load_tenant_settings};
use crate::services::alerts;

#[derive(Debug, sqlx::FromRow)]
struct QualityCheckRow {
    id: Uuid,
    receiving_id: Uuid,
    grn_number: String,
    line_id: Option<Uuid>,
    inspector_id: Uuid,
    pulp_temp_c: Option<f64>,
    brix: Option<f64>,
    defect_pct: Option<f64>,
    sample_size: Option<i32>,
    visual_grade: Option<String>,
    computed_decision: String,
    decision: String,
    findings: serde_json::Value,
    override_reason: Option<String>,
    notes: Option<String>,
    inspected_at: DateTime<Utc>,
}

impl TryFrom<QualityCheckRow> for QualityCheckResponse {
    type Error = ApiError;

    fn try_from(row: QualityCheckRow) -> Result<Self, Self::Error> {
        let findings: Vec<Finding> = serde_json::from_value(row.findings)
            .map_err(|e| ApiError::internal(format!("Failed to parse QC findings: {}", e)))?;

        Ok(Self {
            id: row.id,
            receiving_id: row.receiving_id,
            grn_number: row.grn_number,
            line_id: row.line_id,
            inspector_id: row.inspector_id,
            pulp_temp_c: row.pulp_temp_c,
            brix: row.brix,
            defect_pct: row.defect_pct,
            sample_size: row.sample_size,
            visual_grade: row.visual_grade,
            computed_decision: QcDecision::from_db(&row.computed_decision),
            decision: QcDecision::from_db(&row.decision),
            findings,
            override_reason: row.override_reason,
            notes: row.notes,
            inspected_at: row.inspected_at,
        })
    }
}

const CHECK_SELECT: &str = r#"
    SELECT q.id, q.receiving_id, r.grn_number, q.line_id, q.inspector_id, q.pulp_temp_c,
           q.brix, q.defect_pct, q.sample_size, q.visual_grade, q.computed_decision,
           q.decision, q.findings, q.override_reason, q.notes, q.inspected_at
    FROM quality_checks q
    JOIN receivings r ON r.id = q.receiving_id
"#;

async fn fetch_check(db: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<QualityCheckResponse, ApiError> {
    sqlx::query_as::<_, QualityCheckRow>(&format!(
        "{CHECK_SELECT} WHERE q.id = $1 AND q.tenant_id = $2"
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Quality check not found"))?
    .try_into()
}

/// POST /api/quality-checks
///
/// Record an inspection. Overriding the computed decision needs the manager
/// role and a reason.
pub async fn create_quality_check(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<CreateQualityCheckRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.decision_override.is_some() {
        auth.require_role(Role::Manager)?;
        if req.override_reason_missing() {
            return Err(ApiError::bad_request(
                "override_reason is required when overriding the QC decision",
            ));
        }
    }

    let settings = load_tenant_settings(&state.db, auth.tenant_id).await?;
    let evaluation = evaluate(&req.measurements(), &settings.qc);
    let decision = req.decision_override.unwrap_or(evaluation.decision);
    let findings = serde_json::to_value(&evaluation.findings)
        .map_err(|e| ApiError::internal(format!("Failed to serialize QC findings: {}", e)))?;

    let mut tx = state.db.begin().await?;

    let grn_number: String = sqlx::query_scalar(
        "SELECT grn_number FROM receivings WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(req.receiving_id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Receiving not found"))?;

    if let Some(line_id) = req.line_id {
        let belongs: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM receiving_lines WHERE id = $1 AND receiving_id = $2)",
        )
        .bind(line_id)
        .bind(req.receiving_id)
        .fetch_one(&mut *tx)
        .await?;

        if !belongs {
            return Err(ApiError::bad_request("line_id does not belong to this receiving"));
        }
    }

    let check_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO quality_checks
            (tenant_id, receiving_id, line_id, inspector_id, pulp_temp_c, brix, defect_pct,
             sample_size, visual_grade, computed_decision, decision, findings,
             override_reason, notes, inspected_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING id
        "#,
    )
    .bind(auth.tenant_id)
    .bind(req.receiving_id)
    .bind(req.line_id)
    .bind(auth.user_id)
    .bind(req.pulp_temp_c)
    .bind(req.brix)
    .bind(req.defect_pct)
    .bind(req.sample_size)
    .bind(&req.visual_grade)
    .bind(evaluation.decision.as_str())
    .bind(decision.as_str())
    .bind(&findings)
    .bind(req.decision_override.and(req.override_reason.as_deref()))
    .bind(&req.notes)
    .bind(req.inspected_at.unwrap_or_else(Utc::now))
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE receivings SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(req.receiving_id)
        .bind(ReceivingStatus::from(decision).as_str())
        .execute(&mut *tx)
        .await?;

    if decision == QcDecision::Rejected {
        alerts::qc_rejection(
            &mut *tx,
            auth.tenant_id,
            req.receiving_id,
            check_id,
            &grn_number,
            &findings,
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        quality_check_id = %check_id,
        receiving_id = %req.receiving_id,
        computed = evaluation.decision.as_str(),
        decision = decision.as_str(),
        findings = evaluation.findings.len(),
        "Quality check recorded"
    );

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(Created(fetch_check(&state.db, auth.tenant_id, check_id).await?))
}

/// GET /api/quality-checks
pub async fn list_quality_checks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QualityCheckQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_range(query.from.as_ref(), query.to.as_ref())?;
    let pagination = PaginationParams::new(query.page, query.per_page);
    let decision = query.decision.map(|d| d.as_str());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM quality_checks q
        WHERE q.tenant_id = $1
          AND ($2::uuid IS NULL OR q.receiving_id = $2)
          AND ($3::text IS NULL OR q.decision = $3)
          AND ($4::timestamptz IS NULL OR q.inspected_at >= $4)
          AND ($5::timestamptz IS NULL OR q.inspected_at <= $5)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(query.receiving_id)
    .bind(decision)
    .bind(query.from)
    .bind(query.to)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, QualityCheckRow>(&format!(
        r#"
        {CHECK_SELECT}
        WHERE q.tenant_id = $1
          AND ($2::uuid IS NULL OR q.receiving_id = $2)
          AND ($3::text IS NULL OR q.decision = $3)
          AND ($4::timestamptz IS NULL OR q.inspected_at >= $4)
          AND ($5::timestamptz IS NULL OR q.inspected_at <= $5)
        ORDER BY q.inspected_at DESC
        LIMIT $6 OFFSET $7
        "#
    ))
    .bind(auth.tenant_id)
    .bind(query.receiving_id)
    .bind(decision)
    .bind(query.from)
    .bind(query.to)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data = rows
        .into_iter()
        .map(QualityCheckResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paginated::new(data, &pagination, total))
}

/// GET /api/quality-checks/:id
pub async fn get_quality_check(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    Ok(DataResponse::new(fetch_check(&state.db, auth.tenant_id, id).await?))
}

/// GET /api/quality-checks/stats
pub async fn get_quality_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QualityStatsQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    ensure_range(query.from.as_ref(), query.to.as_ref())?;

    let (accepted, on_hold, rejected): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE decision = 'accepted'),
            COUNT(*) FILTER (WHERE decision = 'on_hold'),
            COUNT(*) FILTER (WHERE decision = 'rejected')
        FROM quality_checks
        WHERE tenant_id = $1
          AND ($2::timestamptz IS NULL OR inspected_at >= $2)
          AND ($3::timestamptz IS NULL OR inspected_at <= $3)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(query.from)
    .bind(query.to)
    .fetch_one(&state.db)
    .await?;

    Ok(DataResponse::new(QualityStats::from_counts(accepted, on_hold, rejected)))
}
