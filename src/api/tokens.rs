// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token introspection for other services and the frontend.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{Auth, Claims, Principal};
use crate::error::{ApiError, ErrorBody};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateRequest {
    /// Raw access token, without the `Bearer ` prefix.
    #[serde(default)]
    pub token: Option<String>,
}

/// Outcome of `POST /auth/validate`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure class, e.g. `expired` or `audience_mismatch`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserInfoResponse {
    pub user_info: Principal,
}

/// Validate an access token and return its claims.
#[utoipa::path(
    post,
    path = "/auth/validate",
    tag = "Auth",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Token is valid", body = ValidateResponse),
        (status = 400, description = "No token supplied", body = ErrorBody),
        (status = 401, description = "Token is invalid", body = ValidateResponse)
    )
)]
pub async fn validate(
    State(state): State<AppState>,
    body: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let token = body
        .ok()
        .and_then(|Json(request)| request.token)
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Token required"))?;

    let response = match state.guard.validate(token.trim()).await {
        Ok(claims) => (
            StatusCode::OK,
            Json(ValidateResponse {
                valid: true,
                claims: Some(claims),
                error: None,
                details: None,
            }),
        ),
        Err(reason) => (
            StatusCode::UNAUTHORIZED,
            Json(ValidateResponse {
                valid: false,
                claims: None,
                error: Some("Invalid or expired token".to_string()),
                details: Some(reason.code().to_string()),
            }),
        ),
    };
    Ok(response.into_response())
}

/// Identity of the presented token's subject.
#[utoipa::path(
    get,
    path = "/auth/userinfo",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller identity", body = UserInfoResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn userinfo(Auth(principal): Auth) -> Json<UserInfoResponse> {
    Json(UserInfoResponse {
        user_info: principal,
    })
}
