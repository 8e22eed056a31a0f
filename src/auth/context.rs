use serde::Serialize;
use uuid::Uuid;

use super::Claims;
use crate::error::ApiError;

/// Role of a user inside their tenant, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Manager,
    Admin,
}

impl Role {
    /// Unknown or missing roles get the least privilege.
    pub fn from_claim(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("admin") => Self::Admin,
            Some("manager") => Self::Manager,
            _ => Self::Staff,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    InvalidSubject,
    MissingTenant,
}

/// Authenticated user context extracted from a verified JWT
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub email: Option<String>,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, ContextError> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ContextError::InvalidSubject)?;
        let metadata = claims.app_metadata.clone().unwrap_or_default();
        let tenant_id = metadata.tenant_id.ok_or(ContextError::MissingTenant)?;

        Ok(Self {
            user_id,
            tenant_id,
            role: Role::from_claim(metadata.role.as_deref()),
            email: claims.email.clone(),
        })
    }

    /// Fails with 403 unless the user holds at least `required`.
    pub fn require_role(&self, required: Role) -> Result<(), ApiError> {
        if self.role >= required {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.user_id,
                tenant_id = %self.tenant_id,
                role = self.role.as_str(),
                required = required.as_str(),
                "Insufficient role"
            );
            Err(ApiError::forbidden(format!(
                "This action requires the {} role",
                required.as_str()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::AppMetadata;

    fn claims(sub: &str, metadata: Option<AppMetadata>) -> Claims {
        Claims {
            sub: sub.to_string(),
            aud: "authenticated".to_string(),
            iss: "https://id.example.test".to_string(),
            iat: 0,
            exp: i64::MAX,
            nbf: None,
            email: Some("qc@example.test".to_string()),
            role: Some("authenticated".to_string()),
            app_metadata: metadata,
        }
    }

    #[test]
    fn builds_context_with_tenant_and_role() {
        let user = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let ctx = AuthContext::from_claims(&claims(
            &user.to_string(),
            Some(AppMetadata {
                tenant_id: Some(tenant),
                role: Some("Manager".to_string()),
            }),
        ))
        .unwrap();

        assert_eq!(ctx.user_id, user);
        assert_eq!(ctx.tenant_id, tenant);
        assert_eq!(ctx.role, Role::Manager);
    }

    #[test]
    fn rejects_tokens_without_tenant() {
        let err = AuthContext::from_claims(&claims(&Uuid::new_v4().to_string(), None)).unwrap_err();
        assert_eq!(err, ContextError::MissingTenant);
    }

    #[test]
    fn rejects_non_uuid_subject() {
        let err = AuthContext::from_claims(&claims("not-a-uuid", None)).unwrap_err();
        assert_eq!(err, ContextError::InvalidSubject);
    }

    #[test]
    fn role_hierarchy_is_enforced() {
        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: Role::from_claim(Some("something-else")),
            email: None,
        };
        assert_eq!(ctx.role, Role::Staff);
        assert!(ctx.require_role(Role::Staff).is_ok());
        assert!(matches!(
            ctx.require_role(Role::Manager),
            Err(ApiError::Forbidden(_))
        ));

        let admin = AuthContext {
            role: Role::Admin,
            ..ctx
        };
        assert!(admin.require_role(Role::Manager).is_ok());
    }
}
