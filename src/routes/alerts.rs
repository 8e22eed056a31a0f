//! Alert routes

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{DataResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::alerts::{AlertQuery, AlertResponse, Severity};
use crate::error::ApiError;
use crate::routes::dashboard;

#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    kind: String,
    severity: String,
    title: String,
    message: Option<String>,
    data: serde_json::Value,
    acknowledged_by: Option<Uuid>,
    acknowledged_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<AlertRow> for AlertResponse {
    fn from(row: AlertRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            severity: Severity::from_db(&row.severity),
            title: row.title,
            message: row.message,
            data: row.data,
            acknowledged_by: row.acknowledged_by,
            acknowledged_at: row.acknowledged_at,
            created_at: row.created_at,
        }
    }
}

const ALERT_COLUMNS: &str =
    "id, kind, severity, title, message, data, acknowledged_by, acknowledged_at, created_at";

/// GET /api/alerts
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams::new(query.page, query.per_page);
    let kind = query.kind.map(|k| k.to_string());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM alerts
        WHERE tenant_id = $1
          AND ($2::boolean IS NULL OR (acknowledged_at IS NOT NULL) = $2)
          AND ($3::text IS NULL OR kind = $3)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(query.acknowledged)
    .bind(&kind)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, AlertRow>(&format!(
        r#"
        SELECT {ALERT_COLUMNS}
        FROM alerts
        WHERE tenant_id = $1
          AND ($2::boolean IS NULL OR (acknowledged_at IS NOT NULL) = $2)
          AND ($3::text IS NULL OR kind = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#
    ))
    .bind(auth.tenant_id)
    .bind(query.acknowledged)
    .bind(&kind)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data: Vec<AlertResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Paginated::new(data, &pagination, total))
}

/// POST /api/alerts/:id/acknowledge
pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, AlertRow>(&format!(
        r#"
        UPDATE alerts SET acknowledged_by = $3, acknowledged_at = NOW()
        WHERE id = $1 AND tenant_id = $2 AND acknowledged_at IS NULL
        RETURNING {ALERT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(auth.tenant_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?;

    let Some(row) = row else {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM alerts WHERE id = $1 AND tenant_id = $2)")
                .bind(id)
                .bind(auth.tenant_id)
                .fetch_one(&state.db)
                .await?;

        return Err(if exists {
            ApiError::conflict("Alert has already been acknowledged")
        } else {
            ApiError::not_found("Alert not found")
        });
    };

    tracing::info!(tenant_id = %auth.tenant_id, alert_id = %id, user_id = %auth.user_id, "Alert acknowledged");

    dashboard::invalidate(&state, auth.tenant_id).await;

    Ok(DataResponse::new(AlertResponse::from(row)))
}
