// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behavior
//!
//! - Keys are fetched from an explicit JWKS URL or from the `jwks_uri` of an
//!   OpenID discovery document (resolved once, then remembered)
//! - The whole key set is swapped atomically; readers never see a partial set
//! - A `kid` miss or an expired set triggers one refresh before giving up
//! - Concurrent refreshes are coalesced: callers queued behind an in-flight
//!   fetch reuse its result
//! - After a failed automatic refresh, further ones wait out a cooldown
//! - Fail closed: once the TTL has passed and a refresh fails, lookups fail
//!
//! ## Usage
//!
//! Construct one `KeyCache` at startup, `warm()` it, and share it via `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::{Mutex, OnceCell, RwLock};

/// Default key set TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default timeout for one JWKS or discovery request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause for automatic refreshes after a failed one.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(10);

/// Where the provider publishes its signing keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Direct JWKS endpoint, e.g. `<issuer>/protocol/openid-connect/certs`
    Jwks(String),
    /// OpenID discovery document, e.g. `<issuer>/.well-known/openid-configuration`
    Discovery(String),
}

/// Tuning for [`KeyCache`].
#[derive(Debug, Clone)]
pub struct KeyCacheConfig {
    /// How long a fetched key set is trusted without refetching
    pub ttl: Duration,
    /// Per-request timeout for provider calls
    pub fetch_timeout: Duration,
    /// How long automatic refreshes are suppressed after a failed one
    pub refresh_cooldown: Duration,
    /// Extra attempts after a failed fetch
    pub fetch_retries: u32,
    /// Backoff step between attempts (multiplied by attempt number)
    pub retry_backoff: Duration,
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            fetch_retries: 1,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

impl KeyCacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.fetch_retries = retries;
        self.retry_backoff = backoff;
        self
    }
}

/// Key family of a published key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    Ec,
    Okp,
}

impl KeyFamily {
    /// Whether a key of this family can verify `alg`.
    pub fn supports(&self, alg: Algorithm) -> bool {
        match self {
            KeyFamily::Rsa => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            KeyFamily::Ec => matches!(alg, Algorithm::ES256 | Algorithm::ES384),
            KeyFamily::Okp => matches!(alg, Algorithm::EdDSA),
        }
    }
}

/// One public verification key.
#[derive(Clone)]
pub struct KeyMaterial {
    pub kid: String,
    pub family: KeyFamily,
    /// Algorithm pinned by the JWK `alg` field, if any
    pub algorithm: Option<Algorithm>,
    pub key: DecodingKey,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Key cache errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyCacheError {
    /// No usable key with this `kid`, even after a refresh attempt.
    #[error("no signing key with kid {kid}")]
    KeyNotFound { kid: String },

    /// Transport or HTTP failure talking to the provider.
    #[error("failed to fetch keys from {url}: {error}")]
    FetchFailed { url: String, error: String },

    /// Provider answered with something that is not a JWKS / discovery document.
    #[error("failed to parse response from {url}: {error}")]
    ParseFailed { url: String, error: String },

    /// An automatic refresh was skipped because one ran too recently.
    #[error("key refresh attempted too recently")]
    CoolingDown,

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Snapshot reported by [`KeyCache::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCacheStatus {
    /// Whether a key set within its TTL is held
    pub fresh: bool,
    pub key_count: usize,
    pub age: Option<Duration>,
}

/// An immutable, fully built key set.
struct KeySet {
    keys: HashMap<String, KeyMaterial>,
    fetched_at: Instant,
}

struct CacheState {
    current: Option<Arc<KeySet>>,
    /// Incremented on every successful swap
    generation: u64,
    /// Set when an automatic refresh fails; cleared by any successful swap
    last_failure: Option<Instant>,
}

#[derive(Deserialize)]
struct RawJwks {
    keys: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

/// Read-through cache of the provider's public signing keys.
pub struct KeyCache {
    source: KeySource,
    config: KeyCacheConfig,
    /// JWKS endpoint resolved from discovery
    jwks_uri: OnceCell<String>,
    state: RwLock<CacheState>,
    /// Held for the duration of a fetch so only one is in flight
    refresh_lock: Mutex<()>,
    client: reqwest::Client,
}

impl KeyCache {
    pub fn new(source: KeySource, config: KeyCacheConfig) -> Result<Self, KeyCacheError> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(config.fetch_timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| KeyCacheError::Client(e.to_string()))?;

        Ok(Self {
            source,
            config,
            jwks_uri: OnceCell::new(),
            state: RwLock::new(CacheState {
                current: None,
                generation: 0,
                last_failure: None,
            }),
            refresh_lock: Mutex::new(()),
            client,
        })
    }

    /// Return the key for `kid`, refreshing once on a miss or an expired set.
    ///
    /// Any failure is reported as `KeyNotFound`; fetch problems are logged.
    pub async fn get_key(&self, kid: &str) -> Result<KeyMaterial, KeyCacheError> {
        let (snapshot, generation) = {
            let state = self.state.read().await;
            (state.current.clone(), state.generation)
        };

        if let Some(set) = snapshot.as_deref() {
            if self.is_fresh(set) {
                if let Some(key) = set.keys.get(kid) {
                    return Ok(key.clone());
                }
                tracing::debug!(kid, "kid not in cached key set, refreshing");
            } else {
                tracing::debug!("cached key set expired, refreshing");
            }
        }

        match self.refresh_after(generation).await {
            Ok(set) => set.keys.get(kid).cloned().ok_or_else(|| {
                tracing::debug!(kid, "kid not published by provider");
                KeyCacheError::KeyNotFound {
                    kid: kid.to_string(),
                }
            }),
            Err(e) => {
                tracing::warn!(kid, error = %e, "key refresh failed");
                Err(KeyCacheError::KeyNotFound {
                    kid: kid.to_string(),
                })
            }
        }
    }

    /// Fetch the full key set now and swap it in, ignoring the cooldown.
    ///
    /// On failure the previous set stays in place until its TTL runs out.
    pub async fn refresh(&self) -> Result<(), KeyCacheError> {
        let _in_flight = self.refresh_lock.lock().await;
        self.fetch_and_swap().await.map(|_| ())
    }

    /// Initial fetch at startup. Failure is logged, not fatal.
    pub async fn warm(&self) -> bool {
        match self.refresh().await {
            Ok(()) => {
                let status = self.status().await;
                tracing::info!(key_count = status.key_count, "signing keys cached");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch signing keys at startup (will retry on first token)");
                false
            }
        }
    }

    pub async fn status(&self) -> KeyCacheStatus {
        let state = self.state.read().await;
        match state.current.as_deref() {
            Some(set) => KeyCacheStatus {
                fresh: self.is_fresh(set),
                key_count: set.keys.len(),
                age: Some(set.fetched_at.elapsed()),
            },
            None => KeyCacheStatus {
                fresh: false,
                key_count: 0,
                age: None,
            },
        }
    }

    fn is_fresh(&self, set: &KeySet) -> bool {
        set.fetched_at.elapsed() < self.config.ttl
    }

    /// Single-flight refresh on behalf of a caller that observed `generation`.
    async fn refresh_after(&self, generation: u64) -> Result<Arc<KeySet>, KeyCacheError> {
        let _in_flight = self.refresh_lock.lock().await;

        {
            let state = self.state.read().await;
            if state.generation != generation {
                if let Some(set) = state.current.clone() {
                    return Ok(set);
                }
            }
            if let Some(failed) = state.last_failure {
                if failed.elapsed() < self.config.refresh_cooldown {
                    return Err(KeyCacheError::CoolingDown);
                }
            }
        }

        let result = self.fetch_and_swap().await;
        if result.is_err() {
            self.state.write().await.last_failure = Some(Instant::now());
        }
        result
    }

    /// Caller must hold `refresh_lock`.
    async fn fetch_and_swap(&self) -> Result<Arc<KeySet>, KeyCacheError> {
        let set = Arc::new(self.fetch_key_set().await?);

        let mut state = self.state.write().await;
        state.current = Some(Arc::clone(&set));
        state.generation += 1;
        state.last_failure = None;
        tracing::debug!(
            generation = state.generation,
            key_count = set.keys.len(),
            "key set swapped"
        );
        Ok(set)
    }

    async fn fetch_key_set(&self) -> Result<KeySet, KeyCacheError> {
        let url = self.resolve_jwks_uri().await?;
        let raw: RawJwks = self.get_json_with_retry(&url).await?;
        Ok(build_key_set(raw))
    }

    async fn resolve_jwks_uri(&self) -> Result<String, KeyCacheError> {
        let discovery_url = match &self.source {
            KeySource::Jwks(url) => return Ok(url.clone()),
            KeySource::Discovery(url) => url,
        };

        self.jwks_uri
            .get_or_try_init(|| async {
                let doc: DiscoveryDocument = self.get_json_with_retry(discovery_url).await?;
                tracing::info!(jwks_uri = %doc.jwks_uri, "resolved JWKS endpoint from discovery");
                Ok::<_, KeyCacheError>(doc.jwks_uri)
            })
            .await
            .cloned()
    }

    /// `get_json` with linear backoff between a bounded number of retries.
    async fn get_json_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, KeyCacheError> {
        let mut attempt = 0;
        loop {
            match self.get_json::<T>(url).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.fetch_retries => {
                    attempt += 1;
                    tracing::warn!(url, attempt, error = %e, "provider fetch failed, retrying");
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, KeyCacheError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KeyCacheError::FetchFailed {
                url: url.to_string(),
                error: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(KeyCacheError::FetchFailed {
                url: url.to_string(),
                error: format!("HTTP {}", response.status()),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| KeyCacheError::ParseFailed {
                url: url.to_string(),
                error: e.to_string(),
            })
    }
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("source", &self.source)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Build a key set, skipping entries that cannot verify signatures.
fn build_key_set(raw: RawJwks) -> KeySet {
    let keys = raw
        .keys
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Jwk>(value) {
            Ok(jwk) => key_material(&jwk),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparseable JWK");
                None
            }
        })
        .map(|key| (key.kid.clone(), key))
        .collect();

    KeySet {
        keys,
        fetched_at: Instant::now(),
    }
}

/// Convert a JWK into verification material.
///
/// Skips keys without a `kid`, encryption keys, and symmetric keys.
fn key_material(jwk: &Jwk) -> Option<KeyMaterial> {
    let kid = jwk.common.key_id.clone()?;

    match &jwk.common.public_key_use {
        None | Some(PublicKeyUse::Signature) => {}
        Some(_) => {
            tracing::debug!(kid = kid.as_str(), "Skipping non-signing JWK");
            return None;
        }
    }

    let family = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => KeyFamily::Rsa,
        AlgorithmParameters::EllipticCurve(_) => KeyFamily::Ec,
        AlgorithmParameters::OctetKeyPair(_) => KeyFamily::Okp,
        _ => {
            tracing::debug!(kid = kid.as_str(), "Skipping symmetric JWK");
            return None;
        }
    };

    let algorithm = match jwk.common.key_algorithm.as_ref() {
        None => None,
        Some(declared) => match signing_algorithm(declared) {
            Some(alg) if family.supports(alg) => Some(alg),
            _ => {
                tracing::debug!(kid = kid.as_str(), "Skipping JWK with non-signing alg");
                return None;
            }
        },
    };

    match DecodingKey::from_jwk(jwk) {
        Ok(key) => Some(KeyMaterial {
            kid,
            family,
            algorithm,
            key,
        }),
        Err(e) => {
            tracing::debug!(kid = kid.as_str(), error = %e, "Skipping JWK (cannot create DecodingKey)");
            None
        }
    }
}

fn signing_algorithm(declared: &KeyAlgorithm) -> Option<Algorithm> {
    match declared {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}
