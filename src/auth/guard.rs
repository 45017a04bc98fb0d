// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization guard: the single access-decision entry point.
//!
//! `Unauthenticated -> Verifying -> Authorized | Denied`, with no retries.
//! Given the same token, requirement, and key cache state, the decision is
//! always the same.

use super::claims::{Claims, Principal};
use super::error::{Denied, VerificationError};
use super::roles::{satisfies, RoleRequirement};
use super::verifier::TokenVerifier;

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// No token was presented
    Anonymous,
    Authenticated(Principal),
}

impl Caller {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Caller::Anonymous => None,
            Caller::Authenticated(principal) => Some(principal),
        }
    }

    pub fn into_principal(self) -> Option<Principal> {
        match self {
            Caller::Anonymous => None,
            Caller::Authenticated(principal) => Some(principal),
        }
    }
}

/// Verifies tokens for one issuer/audience pair and applies role requirements.
#[derive(Debug)]
pub struct AuthGuard {
    verifier: TokenVerifier,
    issuer: String,
    audience: String,
}

impl AuthGuard {
    pub fn new(
        verifier: TokenVerifier,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Decide access for one invocation of a protected operation.
    pub async fn authorize(
        &self,
        raw_token: Option<&str>,
        requirement: &RoleRequirement,
    ) -> Result<Caller, Denied> {
        if raw_token.is_none() && !requirement.is_unrestricted() {
            return Err(Denied::MissingToken);
        }
        let caller = self.authenticate(raw_token).await?;
        self.check(&caller, requirement)?;
        Ok(caller)
    }

    /// Verify an optional token; absence yields [`Caller::Anonymous`].
    pub async fn authenticate(&self, raw_token: Option<&str>) -> Result<Caller, Denied> {
        let Some(token) = raw_token else {
            return Ok(Caller::Anonymous);
        };
        let claims = self.validate(token).await?;
        Ok(Caller::Authenticated(Principal::from(claims)))
    }

    /// Apply `requirement` to an already authenticated caller.
    pub fn check(&self, caller: &Caller, requirement: &RoleRequirement) -> Result<(), Denied> {
        match caller {
            Caller::Anonymous if requirement.is_unrestricted() => Ok(()),
            Caller::Anonymous => Err(Denied::MissingToken),
            Caller::Authenticated(principal) => {
                if satisfies(&principal.roles, requirement) {
                    Ok(())
                } else {
                    tracing::debug!(
                        user_id = %principal.user_id,
                        requirement = %requirement,
                        "insufficient role"
                    );
                    Err(Denied::InsufficientRole)
                }
            }
        }
    }

    /// Verify a token against the configured issuer and audience.
    pub async fn validate(&self, token: &str) -> Result<Claims, VerificationError> {
        self.verifier
            .verify(token, &self.issuer, &self.audience)
            .await
            .inspect_err(|reason| log_rejection(*reason))
    }
}

fn log_rejection(reason: VerificationError) {
    if reason.is_security_relevant() {
        tracing::warn!(target: "security", reason = reason.code(), "rejected bearer token");
    } else {
        tracing::debug!(reason = reason.code(), "rejected bearer token");
    }
}
