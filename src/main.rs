// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calorie tracker bridge server
//!
//! Runs next to the app shell, resolves the user's identity and profile,
//! and answers profile and AI limit questions on a loopback port.

use calorie_tracker::{
    config::Config,
    db::SupabaseDb,
    services::{AuthClient, ProfileService, UsageLimiter},
    storage::{FileStore, LocalStorage},
    time_utils::{Clock, SystemClock},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
    })?;
    tracing::info!(port = config.port, "Starting calorie tracker bridge");

    // Local persistent storage
    let store = FileStore::new(&config.storage_dir);
    tracing::info!(dir = %store.dir().display(), "Local storage ready");
    let storage = LocalStorage::new(Arc::new(store));

    // Auth client and the REST client that borrows its session
    let auth = AuthClient::new(&config.supabase_url, &config.supabase_anon_key, storage.clone())?;
    let db = Arc::new(SupabaseDb::new(
        &config.supabase_url,
        &config.supabase_anon_key,
        auth.shared_session(),
    )?);
    let auth = Arc::new(auth);

    let profile_service = ProfileService::new(
        auth.clone(),
        db.clone(),
        storage,
        config.profile_fetch_timeout,
        config.loading_deadline,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let limiter = UsageLimiter::new(profile_service.clone(), db, clock.clone());

    // Listen before resolving so no transition is missed
    profile_service.spawn_auth_listener();
    profile_service.initialize().await;

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        auth,
        profile_service: profile_service.clone(),
        limiter,
        clock,
    });

    // Build router
    let app = calorie_tracker::routes::create_router(state);

    // Start server
    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Bridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    profile_service.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["calorie_tracker=debug", "info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry().with(filter).with(format).init();
}
