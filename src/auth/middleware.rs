// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Verifies the bearer token (if any) once for a whole router subtree and
//! stores the resulting [`Caller`] in the request extensions. Role checks
//! stay with the per-handler extractors.
//!
//! ```rust,ignore
//! let api = Router::new()
//!     .route("/admin", get(admin))
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), authenticate));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::extractor::bearer_token;
use super::Caller;
use crate::state::AppState;

/// Resolve the caller or reject the request with 401.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let caller = {
        let token = match bearer_token(request.headers()) {
            Ok(token) => token.map(str::to_owned),
            Err(denied) => return denied.into_response(),
        };
        match state.guard.authenticate(token.as_deref()).await {
            Ok(caller) => caller,
            Err(denied) => return denied.into_response(),
        }
    };

    if let Caller::Authenticated(principal) = &caller {
        tracing::debug!(user_id = %principal.user_id, "request authenticated");
    }
    request.extensions_mut().insert(caller);
    next.run(request).await
}
