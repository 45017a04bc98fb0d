// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall health status ("healthy" or "degraded").
    pub status: String,
    pub service: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Signing key availability ("ok" or "unavailable").
    pub jwks: String,
    /// Number of verification keys currently held.
    pub key_count: usize,
    /// Seconds since the key set was fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_age_secs: Option<u64>,
}

/// Health check endpoint handler.
///
/// Returns 503 when no unexpired key set is held and a refresh fails, since
/// every protected request would be denied in that state.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Signing keys unavailable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let keys = state.keys();
    let mut status = keys.status().await;
    if !status.fresh {
        if let Err(e) = keys.refresh().await {
            tracing::warn!(error = %e, "health check could not refresh signing keys");
        }
        status = keys.status().await;
    }

    let response = HealthResponse {
        status: if status.fresh { "healthy" } else { "degraded" }.to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        checks: HealthChecks {
            jwks: if status.fresh { "ok" } else { "unavailable" }.to_string(),
            key_count: status.key_count,
            key_age_secs: status.age.map(|age| age.as_secs()),
        },
    };

    let code = if status.fresh {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}
