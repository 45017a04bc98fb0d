// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Demonstration endpoints, one per role requirement.
//!
//! | Route | Requirement |
//! |-------|-------------|
//! | `GET /api/public` | none |
//! | `GET /api/protected` | any authenticated caller |
//! | `GET /api/admin` | `admin` |
//! | `GET /api/user-data` | `user` or `admin` |

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{AdminOnly, Auth, Caller, Denied, Guarded, MaybeAuth, Principal, UserOrAdmin};
use crate::error::ErrorBody;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicResponse {
    pub message: String,
    pub data: String,
    /// Present when the caller presented a valid token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProtectedResponse {
    pub message: String,
    pub authenticated_user: String,
    pub user_id: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminResponse {
    pub message: String,
    pub admin_user: String,
    pub admin_actions: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDataResponse {
    pub message: String,
    pub user: UserData,
}

/// Caller profile; `email` is always present and `null` when unknown.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserData {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl From<Principal> for UserData {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.user_id,
            username: principal.username,
            email: principal.email,
            roles: principal.roles.into_iter().collect(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Public endpoint; no authentication required.
#[utoipa::path(
    get,
    path = "/api/public",
    tag = "Demo",
    responses(
        (status = 200, description = "Public data", body = PublicResponse),
        (status = 401, description = "A token was presented but is invalid", body = ErrorBody)
    )
)]
pub async fn public(MaybeAuth(caller): MaybeAuth) -> Json<PublicResponse> {
    let greeting = match caller {
        Caller::Authenticated(principal) => Some(format!("Hello, {}", principal.username)),
        Caller::Anonymous => None,
    };
    Json(PublicResponse {
        message: "This is a public endpoint".to_string(),
        data: "Anyone can access this".to_string(),
        greeting,
    })
}

/// Any authenticated caller.
#[utoipa::path(
    get,
    path = "/api/protected",
    tag = "Demo",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller identity", body = ProtectedResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn protected(Auth(principal): Auth) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: "This is a protected endpoint".to_string(),
        authenticated_user: principal.username,
        user_id: principal.user_id,
        roles: principal.roles.into_iter().collect(),
    })
}

/// Requires the `admin` role.
#[utoipa::path(
    get,
    path = "/api/admin",
    tag = "Demo",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Admin data", body = AdminResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Insufficient permissions", body = ErrorBody)
    )
)]
pub async fn admin(guarded: Guarded<AdminOnly>) -> Result<Json<AdminResponse>, Denied> {
    let principal = guarded.caller.into_principal().ok_or(Denied::MissingToken)?;
    Ok(Json(AdminResponse {
        message: "This is an admin-only endpoint".to_string(),
        admin_user: principal.username,
        admin_actions: ["view_all_users", "manage_roles", "system_config"]
            .into_iter()
            .map(String::from)
            .collect(),
    }))
}

/// Requires `user` or `admin`.
#[utoipa::path(
    get,
    path = "/api/user-data",
    tag = "Demo",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller profile", body = UserDataResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Insufficient permissions", body = ErrorBody)
    )
)]
pub async fn user_data(guarded: Guarded<UserOrAdmin>) -> Result<Json<UserDataResponse>, Denied> {
    let principal = guarded.caller.into_principal().ok_or(Denied::MissingToken)?;
    Ok(Json(UserDataResponse {
        message: "User data endpoint".to_string(),
        user: principal.into(),
    }))
}
