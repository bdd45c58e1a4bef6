use serde::{Deserialize, Serialize};

/// JWT claims carried by bearer tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: Option<i64>,

    /// User email
    pub email: String,

    /// Display name - optional
    #[serde(default)]
    pub name: Option<String>,

    /// Issuer, checked when configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience, checked when configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}
