use axum::response::IntoResponse;
use serde::Serialize;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::auth::{RequireAuth, Role};

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub email: Option<String>,
}

/// GET /api/me
pub async fn get_me(auth: RequireAuth) -> impl IntoResponse {
    DataResponse::new(MeResponse {
        user_id: auth.user_id,
        tenant_id: auth.tenant_id,
        role: auth.role,
        email: auth.email.clone(),
    })
}
