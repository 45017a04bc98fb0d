// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors that run the authorization guard.
//!
//! ```rust,ignore
//! async fn admin(guarded: Guarded<AdminOnly>) -> impl IntoResponse {
//!     // only callers holding the `admin` role reach here
//! }
//!
//! async fn me(Auth(principal): Auth) -> impl IntoResponse {
//!     // any authenticated caller
//! }
//! ```
//!
//! If the [`super::middleware::authenticate`] layer already resolved the
//! caller, the extractors reuse it and only evaluate the role requirement.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::roles::{RoleRequirement, ROLE_ADMIN, ROLE_USER};
use super::{Caller, Denied, Principal, VerificationError};
use crate::state::AppState;

/// Extract the bearer token from `Authorization`, if the header is present.
///
/// A header with another scheme or an empty token is treated as a malformed token.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, Denied> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| Denied::InvalidToken(VerificationError::Malformed))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(Denied::InvalidToken(VerificationError::Malformed))?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(Denied::InvalidToken(VerificationError::Malformed));
    }
    Ok(Some(token))
}

/// Static role policy of a protected operation.
pub trait AccessPolicy {
    fn requirement() -> RoleRequirement;
}

/// `user` or `admin`.
pub struct UserOrAdmin;

impl AccessPolicy for UserOrAdmin {
    fn requirement() -> RoleRequirement {
        RoleRequirement::any_of([ROLE_USER, ROLE_ADMIN])
    }
}

/// `admin` only.
pub struct AdminOnly;

impl AccessPolicy for AdminOnly {
    fn requirement() -> RoleRequirement {
        RoleRequirement::all_of([ROLE_ADMIN])
    }
}

async fn resolve(
    parts: &Parts,
    state: &AppState,
    requirement: &RoleRequirement,
) -> Result<Caller, Denied> {
    if let Some(caller) = parts.extensions.get::<Caller>() {
        state.guard.check(caller, requirement)?;
        return Ok(caller.clone());
    }
    let token = bearer_token(&parts.headers)?;
    state.guard.authorize(token, requirement).await
}

/// Caller that passed policy `P`.
pub struct Guarded<P> {
    pub caller: Caller,
    policy: PhantomData<fn() -> P>,
}

impl<P> Guarded<P> {
    pub fn principal(&self) -> Option<&Principal> {
        self.caller.principal()
    }
}

impl<P: AccessPolicy> FromRequestParts<AppState> for Guarded<P> {
    type Rejection = Denied;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = resolve(parts, state, &P::requirement()).await?;
        Ok(Guarded {
            caller,
            policy: PhantomData,
        })
    }
}

/// Any authenticated caller; rejects anonymous requests with 401.
pub struct Auth(pub Principal);

impl FromRequestParts<AppState> for Auth {
    type Rejection = Denied;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve(parts, state, &RoleRequirement::Unrestricted).await? {
            Caller::Authenticated(principal) => Ok(Auth(principal)),
            Caller::Anonymous => Err(Denied::MissingToken),
        }
    }
}

/// Public operations: anonymous callers pass, presented tokens must be valid.
pub struct MaybeAuth(pub Caller);

impl FromRequestParts<AppState> for MaybeAuth {
    type Rejection = Denied;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state, &RoleRequirement::Unrestricted)
            .await
            .map(MaybeAuth)
    }
}
