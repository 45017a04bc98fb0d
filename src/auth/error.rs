// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification failures and access denials.
//!
//! `VerificationError` classifies why a bearer token was rejected.
//! `Denied` is the closed set of outcomes the route layer sees; it maps
//! authentication failures to 401 and authorization failures to 403.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ErrorBody;

/// Why a token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// Not a well-formed `header.payload.signature` structure
    #[error("token is malformed")]
    Malformed,
    /// Header names an algorithm outside the allow-list
    #[error("token algorithm is not accepted")]
    UnsupportedAlgorithm,
    /// No published key matches the header `kid`
    #[error("token signing key is unknown")]
    UnknownKey,
    /// Signature does not match the resolved key
    #[error("token signature is invalid")]
    InvalidSignature,
    /// `exp` is in the past
    #[error("token has expired")]
    Expired,
    /// `nbf` is in the future
    #[error("token is not yet valid")]
    NotYetValid,
    /// `iss` does not match the configured issuer
    #[error("token issuer is not accepted")]
    IssuerMismatch,
    /// `aud` does not contain the configured audience
    #[error("token audience is not accepted")]
    AudienceMismatch,
}

impl VerificationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            VerificationError::Malformed => "malformed",
            VerificationError::UnsupportedAlgorithm => "unsupported_algorithm",
            VerificationError::UnknownKey => "unknown_key",
            VerificationError::InvalidSignature => "invalid_signature",
            VerificationError::Expired => "expired",
            VerificationError::NotYetValid => "not_yet_valid",
            VerificationError::IssuerMismatch => "issuer_mismatch",
            VerificationError::AudienceMismatch => "audience_mismatch",
        }
    }

    /// Failures that suggest a forged or tampered token.
    pub fn is_security_relevant(&self) -> bool {
        matches!(
            self,
            VerificationError::UnsupportedAlgorithm | VerificationError::InvalidSignature
        )
    }
}

/// Why access to a protected operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denied {
    /// The operation needs a token and none was presented
    #[error("authorization token required")]
    MissingToken,
    /// A token was presented but failed verification
    #[error("invalid token: {0}")]
    InvalidToken(VerificationError),
    /// The caller is authenticated but lacks the required role(s)
    #[error("insufficient role")]
    InsufficientRole,
}

impl Denied {
    /// 401 means "prove who you are", 403 means "you did and it isn't enough".
    pub fn status_code(&self) -> StatusCode {
        match self {
            Denied::MissingToken | Denied::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Denied::InsufficientRole => StatusCode::FORBIDDEN,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Denied::MissingToken => ErrorBody {
                error: "Authorization token required".to_string(),
                details: None,
            },
            Denied::InvalidToken(reason) => ErrorBody {
                error: "Invalid or expired token".to_string(),
                details: Some(reason.code().to_string()),
            },
            Denied::InsufficientRole => ErrorBody {
                error: "Insufficient permissions".to_string(),
                details: None,
            },
        }
    }
}

impl From<VerificationError> for Denied {
    fn from(err: VerificationError) -> Self {
        Denied::InvalidToken(err)
    }
}

impl IntoResponse for Denied {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.body())).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
