//! API server configuration.

use std::fmt;

use f2f_core::auth::jwt::ensure_signing_key;
use f2f_core::auth::secret::BCRYPT_COST;
use f2f_core::oauth::ClientCredentials;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is required")]
    Missing { var: &'static str },

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Public origin used to build OAuth callback URLs.
    pub base_url: String,
    /// Mark the session cookie `Secure`.
    pub secure_cookie: bool,
    /// bcrypt cost for refresh-secret hashes.
    pub refresh_hash_cost: u32,
    pub facebook: Option<ClientCredentials>,
    pub instagram: Option<ClientCredentials>,
    /// Run embedded migrations at startup.
    pub auto_migrate: bool,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("pg_connection_url", &self.pg_connection_url)
            .field("jwt_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("secure_cookie", &self.secure_cookie)
            .field("refresh_hash_cost", &self.refresh_hash_cost)
            .field("facebook", &self.facebook)
            .field("instagram", &self.instagram)
            .field("auto_migrate", &self.auto_migrate)
            .finish()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable            | Default                          |
    /// |---------------------|----------------------------------|
    /// | `BIND_ADDR`         | `127.0.0.1:8080`                 |
    /// | `DATABASE_URL`      | `postgres://localhost:5432/f2f`  |
    /// | `JWT_SECRET`        | required, at least 32 bytes      |
    /// | `BASE_URL`          | `http://localhost:8080`          |
    /// | `SECURE_COOKIE`     | `false`                          |
    /// | `REFRESH_HASH_COST` | `10`                             |
    /// | `FACEBOOK_KEY` / `FACEBOOK_SECRET`   | provider disabled |
    /// | `INSTAGRAM_KEY` / `INSTAGRAM_SECRET` | provider disabled |
    /// | `AUTO_MIGRATE`      | `false`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing { var: "JWT_SECRET" })?;
        ensure_signing_key(jwt_secret.as_bytes()).map_err(|e| ConfigError::Invalid {
            var: "JWT_SECRET",
            reason: e.to_string(),
        })?;

        let refresh_hash_cost = match var("REFRESH_HASH_COST") {
            None => BCRYPT_COST,
            Some(raw) => parse_hash_cost(&raw)?,
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".into()),
            pg_connection_url: var("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/f2f".into()),
            jwt_secret,
            base_url: var("BASE_URL").unwrap_or_else(|| "http://localhost:8080".into()),
            secure_cookie: parse_flag("SECURE_COOKIE", var("SECURE_COOKIE"))?,
            refresh_hash_cost,
            facebook: client_credentials(var("FACEBOOK_KEY"), var("FACEBOOK_SECRET")),
            instagram: client_credentials(var("INSTAGRAM_KEY"), var("INSTAGRAM_SECRET")),
            auto_migrate: parse_flag("AUTO_MIGRATE", var("AUTO_MIGRATE"))?,
        })
    }
}

fn parse_flag(name: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var: name,
            reason: format!("expected a boolean, got {raw:?}"),
        }),
    }
}

fn parse_hash_cost(raw: &str) -> Result<u32, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: "REFRESH_HASH_COST",
        reason,
    };
    let cost: u32 = raw
        .parse()
        .map_err(|_| invalid(format!("not a number: {raw:?}")))?;
    if !(4..=31).contains(&cost) {
        return Err(invalid(format!("must be between 4 and 31, got {cost}")));
    }
    Ok(cost)
}

/// A provider is enabled only when both its key and secret are set.
fn client_credentials(key: Option<String>, secret: Option<String>) -> Option<ClientCredentials> {
    Some(ClientCredentials {
        client_id: key?,
        client_secret: secret?,
    })
}
