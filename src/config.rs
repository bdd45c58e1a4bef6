use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database; the in-memory store is used when unset
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Identity adapter
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,

    // Teams
    pub invitation_ttl_days: i64,

    pub max_body_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::parse(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Database
        let database_url = optional("DATABASE_URL");
        if database_url.is_none() && env.is_prod() {
            bail!("DATABASE_URL must be set in prod");
        }
        let database_max_connections = parsed("DATABASE_MAX_CONNECTIONS", 10)?;

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Identity adapter
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        let jwt_issuer = optional("JWT_ISSUER");
        let jwt_audience = optional("JWT_AUDIENCE");

        let invitation_ttl_days = parsed("INVITATION_TTL_DAYS", 7)?;
        if invitation_ttl_days <= 0 {
            bail!("INVITATION_TTL_DAYS must be positive");
        }
        let max_body_bytes = parsed("MAX_BODY_BYTES", 64 * 1024)?;

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            cors_allow_origins,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            invitation_ttl_days,
            max_body_bytes,
        })
    }

    pub fn invitation_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.invitation_ttl_days)
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Settings {
            env: Environment::Dev,
            server_addr: "127.0.0.1:0".to_string(),
            database_url: None,
            database_max_connections: 1,
            cors_allow_origins: vec!["http://localhost:3000".to_string()],
            jwt_secret: crate::auth::verifier::testing::SECRET.to_string(),
            jwt_issuer: None,
            jwt_audience: None,
            invitation_ttl_days: 7,
            max_body_bytes: 64 * 1024,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an optional variable, falling back to `default` when unset
fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing_defaults_to_dev() {
        assert_eq!(Environment::parse("PRODUCTION"), Environment::Prod);
        assert_eq!(Environment::parse("staging"), Environment::Staging);
        assert_eq!(Environment::parse("whatever"), Environment::Dev);
    }
}
