// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! Order of checks:
//!
//! 1. Structural envelope (`header.payload.signature`)
//! 2. Header `alg` against the asymmetric allow-list
//! 3. Key resolution by `kid`
//! 4. Signature
//! 5. `exp`, `nbf`, `iss`, `aud`
//! 6. Role flattening
//!
//! The header is parsed here rather than by `jsonwebtoken` so that `none`
//! and unknown algorithm names are classified as unsupported, not malformed.

use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::claims::{Claims, RoleScope};
use super::error::VerificationError;
use super::jwks::KeyCache;

/// Every algorithm the verifier can ever accept. HMAC and `none` are absent.
pub const ASYMMETRIC_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Whether `alg` is an asymmetric signing algorithm.
pub fn is_asymmetric(alg: Algorithm) -> bool {
    ASYMMETRIC_ALGORITHMS.contains(&alg)
}

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Accepted header algorithms; non-asymmetric entries are dropped
    pub algorithms: Vec<Algorithm>,
    /// Clock-skew tolerance for `exp` / `nbf`, in seconds
    pub leeway: u64,
    pub role_scope: RoleScope,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            algorithms: vec![Algorithm::RS256],
            leeway: 0,
            role_scope: RoleScope::AllClients,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Verifies tokens against the provider's published keys.
#[derive(Debug)]
pub struct TokenVerifier {
    keys: Arc<KeyCache>,
    algorithms: Vec<Algorithm>,
    leeway: u64,
    role_scope: RoleScope,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeyCache>, config: VerifierConfig) -> Self {
        let mut algorithms = config.algorithms;
        algorithms.retain(|alg| is_asymmetric(*alg));
        Self {
            keys,
            algorithms,
            leeway: config.leeway,
            role_scope: config.role_scope,
        }
    }

    pub fn keys(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    /// Verify `raw_token` and return its claims.
    ///
    /// May trigger one key refresh; otherwise pure.
    pub async fn verify(
        &self,
        raw_token: &str,
        expected_issuer: &str,
        expected_audience: &str,
    ) -> Result<Claims, VerificationError> {
        let header = parse_header(raw_token)?;

        let alg = Algorithm::from_str(&header.alg)
            .map_err(|_| VerificationError::UnsupportedAlgorithm)?;
        if !self.algorithms.contains(&alg) {
            return Err(VerificationError::UnsupportedAlgorithm);
        }

        let kid = header.kid.ok_or(VerificationError::UnknownKey)?;
        let key = self
            .keys
            .get_key(&kid)
            .await
            .map_err(|_| VerificationError::UnknownKey)?;

        // A key pinned to one algorithm never verifies another.
        if key.algorithm.is_some_and(|pinned| pinned != alg) || !key.family.supports(alg) {
            return Err(VerificationError::InvalidSignature);
        }

        let mut validation = Validation::new(alg);
        validation.leeway = self.leeway;
        validation.validate_nbf = true;
        validation.set_issuer(&[expected_issuer]);
        validation.set_audience(&[expected_audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data = decode::<Map<String, Value>>(raw_token, &key.key, &validation)
            .map_err(|e| classify(e.kind()))?;

        Claims::from_document(&data.claims, &self.role_scope)
    }
}

/// Split the envelope, check every segment is base64url and parse the header.
///
/// Nothing decoded here is trusted; the payload is only checked for encoding.
fn parse_header(raw_token: &str) -> Result<TokenHeader, VerificationError> {
    let mut segments = raw_token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(VerificationError::Malformed);
    };
    // An empty signature is left to the algorithm check, so unsigned tokens
    // are reported as unsupported rather than malformed.
    if header.is_empty() || payload.is_empty() {
        return Err(VerificationError::Malformed);
    }

    let decode = |segment: &str| {
        URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|_| VerificationError::Malformed)
    };
    let bytes = decode(header)?;
    decode(payload)?;
    if !signature.is_empty() {
        decode(signature)?;
    }
    serde_json::from_slice(&bytes).map_err(|_| VerificationError::Malformed)
}

fn classify(kind: &ErrorKind) -> VerificationError {
    match kind {
        ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
        ErrorKind::ExpiredSignature => VerificationError::Expired,
        ErrorKind::ImmatureSignature => VerificationError::NotYetValid,
        ErrorKind::InvalidIssuer => VerificationError::IssuerMismatch,
        ErrorKind::InvalidAudience => VerificationError::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) => match claim.as_str() {
            "iss" => VerificationError::IssuerMismatch,
            "aud" => VerificationError::AudienceMismatch,
            _ => VerificationError::Malformed,
        },
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidKeyFormat => {
            VerificationError::InvalidSignature
        }
        _ => VerificationError::Malformed,
    }
}
