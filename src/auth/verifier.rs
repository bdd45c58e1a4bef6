//! Bearer token verification (HS256)

use anyhow::{Context, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::Claims;
use crate::config::Settings;

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // A configured issuer or audience must also be present in the token
        let mut required = vec!["exp", "sub"];
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
            required.push("iss");
        }
        match audience {
            Some(aud) => {
                validation.set_audience(&[aud]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        validation.set_required_spec_claims(&required);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.jwt_secret,
            settings.jwt_issuer.as_deref(),
            settings.jwt_audience.as_deref(),
        )
    }

    /// Verify a JWT token and return the claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let token_data =
            decode::<Claims>(token, &self.key, &self.validation).context("JWT validation failed")?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    pub const SECRET: &str = "test-secret";

    /// Sign a token the way the identity provider would
    pub fn mint(user_id: Uuid, email: &str, name: &str, ttl: Duration) -> String {
        mint_scoped(user_id, email, name, ttl, None, None)
    }

    pub fn mint_scoped(
        user_id: Uuid,
        email: &str,
        name: &str,
        ttl: Duration,
        iss: Option<&str>,
        aud: Option<&str>,
    ) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
            email: email.to_string(),
            name: Some(name.to_string()),
            iss: iss.map(str::to_string),
            aud: aud.map(str::to_string),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes()))
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{mint, mint_scoped, SECRET};
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    #[test]
    fn accepts_valid_and_rejects_tampered_tokens() {
        let verifier = TokenVerifier::new(SECRET, None, None);
        let id = Uuid::new_v4();
        let token = mint(id, "ann@x", "Ann", Duration::hours(1));

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.email, "ann@x");

        let other = TokenVerifier::new("another-secret", None, None);
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_tokens() {
        let verifier = TokenVerifier::new(SECRET, None, None);
        let token = mint(Uuid::new_v4(), "ann@x", "Ann", Duration::hours(-2));
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn checks_issuer_when_configured() {
        let verifier = TokenVerifier::new(SECRET, Some("https://id.example"), None);
        let id = Uuid::new_v4();
        let hour = Duration::hours(1);

        let missing = mint(id, "ann@x", "Ann", hour);
        assert!(verifier.verify(&missing).is_err());

        let wrong = mint_scoped(id, "ann@x", "Ann", hour, Some("https://evil.example"), None);
        assert!(verifier.verify(&wrong).is_err());

        let right = mint_scoped(id, "ann@x", "Ann", hour, Some("https://id.example"), None);
        assert!(verifier.verify(&right).is_ok());
    }

    #[test]
    fn checks_audience_when_configured() {
        let verifier = TokenVerifier::new(SECRET, None, Some("tasktracker"));
        let id = Uuid::new_v4();
        let hour = Duration::hours(1);

        let missing = mint(id, "ann@x", "Ann", hour);
        assert!(verifier.verify(&missing).is_err());

        let wrong = mint_scoped(id, "ann@x", "Ann", hour, None, Some("billing"));
        assert!(verifier.verify(&wrong).is_err());

        let right = mint_scoped(id, "ann@x", "Ann", hour, None, Some("tasktracker"));
        assert!(verifier.verify(&right).is_ok());
    }

    #[test]
    fn issuer_and_audience_are_optional_when_unset() {
        let verifier = TokenVerifier::new(SECRET, None, None);
        let id = Uuid::new_v4();
        let token = mint_scoped(id, "ann@x", "Ann", Duration::hours(1), Some("any"), Some("any"));
        assert!(verifier.verify(&token).is_ok());
    }
}
