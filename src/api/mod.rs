// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{middleware::authenticate, Claims, Principal},
    config::{ConfigError, CORS_ORIGIN_ENV},
    error::ErrorBody,
    state::AppState,
};

pub mod health;
pub mod protected;
pub mod tokens;

/// Build the application router.
///
/// Every `/api/*` request passes through the [`authenticate`] layer, so an
/// invalid token is rejected even on the public endpoint.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/public", get(protected::public))
        .route("/protected", get(protected::protected))
        .route("/admin", get(protected::admin))
        .route("/user-data", get(protected::user_data))
        .layer(from_fn_with_state(state.clone(), authenticate));

    let request_id = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(health::health))
        .route("/auth/validate", post(tokens::validate))
        .route("/auth/userinfo", get(tokens::userinfo))
        .nest("/api", api_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
}

/// CORS restricted to a single frontend origin.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, ConfigError> {
    let origin = HeaderValue::from_str(origin.trim_end_matches('/')).map_err(|_| {
        ConfigError::InvalidUrl {
            name: CORS_ORIGIN_ENV,
            value: origin.to_string(),
        }
    })?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        protected::public,
        protected::protected,
        protected::admin,
        protected::user_data,
        tokens::validate,
        tokens::userinfo
    ),
    components(
        schemas(
            ErrorBody,
            Claims,
            Principal,
            health::HealthResponse,
            health::HealthChecks,
            protected::PublicResponse,
            protected::ProtectedResponse,
            protected::AdminResponse,
            protected::UserDataResponse,
            protected::UserData,
            tokens::ValidateRequest,
            tokens::ValidateResponse,
            tokens::UserInfoResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service and signing key status"),
        (name = "Auth", description = "Token introspection"),
        (name = "Demo", description = "Endpoints guarded by each role requirement")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
