// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Keycloak JWT verification and role-based authorization.
//!
//! ## Auth Flow
//!
//! 1. Client obtains an access token from Keycloak
//! 2. Client sends `Authorization: Bearer <JWT>`
//! 3. This service:
//!    - Resolves the signing key by `kid` from the realm JWKS (cached)
//!    - Verifies signature, expiry, not-before, issuer, audience
//!    - Flattens realm and client roles into one set
//!    - Evaluates the operation's role requirement
//!
//! ## Security
//!
//! - Only asymmetric algorithms are accepted; HMAC and `none` never are
//! - Missing or invalid tokens are 401, insufficient roles are 403
//! - The key cache fails closed once its TTL has passed

pub mod claims;
pub mod error;
pub mod extractor;
pub mod guard;
pub mod jwks;
pub mod middleware;
pub mod roles;
pub mod verifier;

pub use claims::{Claims, Principal, RoleScope};
pub use error::{Denied, VerificationError};
pub use extractor::{AccessPolicy, AdminOnly, Auth, Guarded, MaybeAuth, UserOrAdmin};
pub use guard::{AuthGuard, Caller};
pub use jwks::{KeyCache, KeyCacheConfig, KeyCacheError, KeySource};
pub use roles::{satisfies, RoleRequirement};
pub use verifier::{TokenVerifier, VerifierConfig};
