// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use keycloak_gate::{
    api::{cors_layer, router},
    auth::{AuthGuard, KeyCache, TokenVerifier},
    config::Settings,
    logging,
    state::AppState,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let settings = Settings::from_env()?;
    logging::init(settings.log_format)?;

    let keys = Arc::new(KeyCache::new(
        settings.key_source.clone(),
        settings.key_cache_config(),
    )?);
    // A provider that is down at startup is not fatal; requests fail closed until it recovers.
    if !keys.warm().await {
        tracing::warn!("starting without signing keys");
    }

    let verifier = TokenVerifier::new(keys, settings.verifier_config());
    let guard = AuthGuard::new(verifier, settings.issuer.clone(), settings.audience.clone());
    let app = router(AppState::new(guard)).layer(cors_layer(&settings.cors_origin)?);

    let addr = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        address = %addr,
        issuer = %settings.issuer,
        audience = %settings.audience,
        "keycloak-gate listening (docs at /docs)"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
