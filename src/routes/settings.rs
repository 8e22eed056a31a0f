//! Tenant settings routes
//!
//! QC criteria, cold-room dwell policy and payroll policy, stored as one
//! JSON document per tenant.

use axum::{extract::State, response::IntoResponse};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{DataResponse, ValidateJson};
use crate::app::AppState;
use crate::auth::{RequireAuth, Role};
use crate::domain::settings::{TenantSettings, TenantSettingsResponse};
use crate::error::ApiError;

#[derive(Debug, sqlx::FromRow)]
struct TenantSettingsRow {
    tenant_id: Uuid,
    settings: serde_json::Value,
    updated_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TenantSettingsRow> for TenantSettingsResponse {
    type Error = ApiError;

    fn try_from(row: TenantSettingsRow) -> Result<Self, Self::Error> {
        let settings: TenantSettings = serde_json::from_value(row.settings)
            .map_err(|e| ApiError::internal(format!("Failed to parse tenant settings: {}", e)))?;

        Ok(Self {
            tenant_id: row.tenant_id,
            settings,
            updated_by: row.updated_by,
            updated_at: Some(row.updated_at),
        })
    }
}

async fn fetch_row(db: &PgPool, tenant_id: Uuid) -> Result<Option<TenantSettingsRow>, ApiError> {
    let row = sqlx::query_as::<_, TenantSettingsRow>(
        r#"
        SELECT tenant_id, settings, updated_by, updated_at
        FROM tenant_settings
        WHERE tenant_id = $1
        "#,
    )
    .bind(tenant_id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

/// Effective settings for a tenant; defaults when nothing was saved.
pub async fn load_tenant_settings(db: &PgPool, tenant_id: Uuid) -> Result<TenantSettings, ApiError> {
    match fetch_row(db, tenant_id).await? {
        Some(row) => Ok(TenantSettingsResponse::try_from(row)?.settings),
        None => Ok(TenantSettings::default()),
    }
}

/// GET /api/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let response = match fetch_row(&state.db, auth.tenant_id).await? {
        Some(row) => TenantSettingsResponse::try_from(row)?,
        None => TenantSettingsResponse {
            tenant_id: auth.tenant_id,
            settings: TenantSettings::default(),
            updated_by: None,
            updated_at: None,
        },
    };

    Ok(DataResponse::new(response))
}

/// PUT /api/settings
///
/// Replace the tenant's settings. Managers only.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidateJson(req): ValidateJson<TenantSettings>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(Role::Manager)?;

    let settings = serde_json::to_value(&req)
        .map_err(|e| ApiError::internal(format!("Failed to serialize settings: {}", e)))?;

    let row = sqlx::query_as::<_, TenantSettingsRow>(
        r#"
        INSERT INTO tenant_settings (tenant_id, settings, updated_by, updated_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (tenant_id) DO UPDATE SET
            settings = EXCLUDED.settings,
            updated_by = EXCLUDED.updated_by,
            updated_at = NOW()
        RETURNING tenant_id, settings, updated_by, updated_at
        "#,
    )
    .bind(auth.tenant_id)
    .bind(&settings)
    .bind(auth.user_id)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(tenant_id = %auth.tenant_id, user_id = %auth.user_id, "Tenant settings updated");

    Ok(DataResponse::new(TenantSettingsResponse::try_from(row)?))
}
