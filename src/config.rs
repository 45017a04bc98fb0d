// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `KEYCLOAK_SERVER_URL` | Keycloak base URL | `http://localhost:8080` |
//! | `KEYCLOAK_REALM` | Realm name | `microservices-realm` |
//! | `KEYCLOAK_CLIENT_ID` | Expected token audience | `auth-service` |
//! | `KEYCLOAK_ISSUER` | Expected token issuer | `<server>/realms/<realm>` |
//! | `KEYCLOAK_JWKS_URL` | Explicit JWKS endpoint | discovery via issuer |
//! | `JWT_ALGORITHMS` | Accepted signing algorithms | `RS256` |
//! | `JWT_LEEWAY_SECS` | Clock-skew tolerance | `0` |
//! | `JWKS_CACHE_TTL_SECS` | Key cache TTL | `300` |
//! | `JWKS_FETCH_TIMEOUT_SECS` | Key fetch timeout | `10` |
//! | `JWKS_REFRESH_COOLDOWN_SECS` | Pause for automatic key refreshes after a failed one | `10` |
//! | `ROLE_CLIENTS` | Clients whose roles count | all clients |
//! | `CORS_ORIGIN` | Allowed frontend origin | `http://localhost:3000` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `5000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

use crate::auth::jwks::{KeyCacheConfig, KeySource};
use crate::auth::verifier::{is_asymmetric, VerifierConfig};
use crate::auth::RoleScope;
use crate::logging::LogFormat;

pub const KEYCLOAK_SERVER_URL_ENV: &str = "KEYCLOAK_SERVER_URL";
pub const KEYCLOAK_REALM_ENV: &str = "KEYCLOAK_REALM";
pub const KEYCLOAK_CLIENT_ID_ENV: &str = "KEYCLOAK_CLIENT_ID";
pub const KEYCLOAK_ISSUER_ENV: &str = "KEYCLOAK_ISSUER";
pub const KEYCLOAK_JWKS_URL_ENV: &str = "KEYCLOAK_JWKS_URL";
pub const JWT_ALGORITHMS_ENV: &str = "JWT_ALGORITHMS";
pub const JWT_LEEWAY_ENV: &str = "JWT_LEEWAY_SECS";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_FETCH_TIMEOUT_ENV: &str = "JWKS_FETCH_TIMEOUT_SECS";
pub const JWKS_REFRESH_COOLDOWN_ENV: &str = "JWKS_REFRESH_COOLDOWN_SECS";
pub const ROLE_CLIENTS_ENV: &str = "ROLE_CLIENTS";
pub const CORS_ORIGIN_ENV: &str = "CORS_ORIGIN";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
const DEFAULT_REALM: &str = "microservices-realm";
const DEFAULT_CLIENT_ID: &str = "auth-service";
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {value}")]
    InvalidUrl { name: &'static str, value: String },

    #[error("{name} must be a non-negative integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} contains an unsupported algorithm: {value}")]
    InvalidAlgorithm { name: &'static str, value: String },

    #[error("{name} must be `json` or `pretty`, got {value:?}")]
    InvalidLogFormat { name: &'static str, value: String },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },
}

/// Settings for the whole service.
#[derive(Debug, Clone)]
pub struct Settings {
    pub issuer: String,
    pub audience: String,
    pub key_source: KeySource,
    pub algorithms: Vec<Algorithm>,
    pub leeway_secs: u64,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub refresh_cooldown: Duration,
    pub role_scope: RoleScope,
    pub cors_origin: String,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load from process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let server_url = var(KEYCLOAK_SERVER_URL_ENV).unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let server_url = server_url.trim_end_matches('/').to_string();
        let realm = var(KEYCLOAK_REALM_ENV).unwrap_or_else(|| DEFAULT_REALM.to_string());

        let issuer = var(KEYCLOAK_ISSUER_ENV).unwrap_or_else(|| format!("{server_url}/realms/{realm}"));
        parse_url(KEYCLOAK_ISSUER_ENV, &issuer)?;

        let key_source = match var(KEYCLOAK_JWKS_URL_ENV) {
            Some(url) => {
                parse_url(KEYCLOAK_JWKS_URL_ENV, &url)?;
                KeySource::Jwks(url)
            }
            None => KeySource::Discovery(format!(
                "{}/.well-known/openid-configuration",
                issuer.trim_end_matches('/')
            )),
        };

        let algorithms = match var(JWT_ALGORITHMS_ENV) {
            Some(list) => parse_algorithms(&list)?,
            None => vec![Algorithm::RS256],
        };

        let role_scope = match var(ROLE_CLIENTS_ENV) {
            Some(list) => RoleScope::Clients(split_list(&list).map(str::to_string).collect::<BTreeSet<_>>()),
            None => RoleScope::AllClients,
        };

        let log_format = match var(LOG_FORMAT_ENV) {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidLogFormat {
                name: LOG_FORMAT_ENV,
                value,
            })?,
            None => LogFormat::Pretty,
        };

        let cors_origin = var(CORS_ORIGIN_ENV).unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());
        parse_url(CORS_ORIGIN_ENV, &cors_origin)?;

        Ok(Self {
            issuer,
            audience: var(KEYCLOAK_CLIENT_ID_ENV).unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            key_source,
            algorithms,
            leeway_secs: parse_number(JWT_LEEWAY_ENV, var(JWT_LEEWAY_ENV), 0)?,
            cache_ttl: Duration::from_secs(parse_number(JWKS_CACHE_TTL_ENV, var(JWKS_CACHE_TTL_ENV), 300)?),
            fetch_timeout: Duration::from_secs(parse_number(
                JWKS_FETCH_TIMEOUT_ENV,
                var(JWKS_FETCH_TIMEOUT_ENV),
                10,
            )?),
            refresh_cooldown: Duration::from_secs(parse_number(
                JWKS_REFRESH_COOLDOWN_ENV,
                var(JWKS_REFRESH_COOLDOWN_ENV),
                10,
            )?),
            role_scope,
            cors_origin,
            host: var(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_number(PORT_ENV, var(PORT_ENV), 5000)?,
            log_format,
        })
    }

    pub fn key_cache_config(&self) -> KeyCacheConfig {
        KeyCacheConfig::default()
            .with_ttl(self.cache_ttl)
            .with_fetch_timeout(self.fetch_timeout)
            .with_refresh_cooldown(self.refresh_cooldown)
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            algorithms: self.algorithms.clone(),
            leeway: self.leeway_secs,
            role_scope: self.role_scope.clone(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value).map(|_| ()).map_err(|_| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
    })
}

fn parse_number<T: FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
    }
}

/// Parse an algorithm allow-list. Symmetric algorithms are refused outright.
fn parse_algorithms(list: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let mut algorithms = Vec::new();
    for name in split_list(list) {
        let alg = Algorithm::from_str(name)
            .ok()
            .filter(|alg| is_asymmetric(*alg))
            .ok_or_else(|| ConfigError::InvalidAlgorithm {
                name: JWT_ALGORITHMS_ENV,
                value: name.to_string(),
            })?;
        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }
    if algorithms.is_empty() {
        return Err(ConfigError::Empty {
            name: JWT_ALGORITHMS_ENV,
        });
    }
    Ok(algorithms)
}
