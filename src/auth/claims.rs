use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Audience
    pub aud: String,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    #[serde(default)]
    pub nbf: Option<i64>,

    #[serde(default)]
    pub email: Option<String>,

    /// Provider-level role (e.g. "authenticated"), not the tenant role
    #[serde(default)]
    pub role: Option<String>,

    /// Server-controlled metadata carrying tenancy
    #[serde(default)]
    pub app_metadata: Option<AppMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppMetadata {
    /// Tenant (company site) the user belongs to
    #[serde(default)]
    pub tenant_id: Option<Uuid>,

    /// Role inside the tenant: admin, manager or staff
    #[serde(default)]
    pub role: Option<String>,
}
