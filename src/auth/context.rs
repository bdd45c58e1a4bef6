use uuid::Uuid;

use super::Claims;
use crate::domain::Principal;

/// Authenticated user context extracted from a verified token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;
        if claims.email.trim().is_empty() {
            return Err("Token carries no email");
        }
        let name = claims
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or_default();

        Ok(Self {
            principal: Principal::new(user_id, name, &claims.email),
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.principal.id
    }
}
