// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch core: ride-hailing passenger/driver matching (§1).
//!
//! Structured like the teacher's `coopmux` crate: a config/state/transport
//! layering around a domain core, with one `run` entry point that `main.rs`
//! calls after parsing configuration and installing tracing.

pub mod auth;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod geo;
pub mod matcher;
pub mod ride_state_machine;
pub mod state;
pub mod store;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use config::DispatchConfig;
use state::AppState;

/// Bind, recover in-flight dispatch, and serve until shutdown is requested.
pub async fn run(config: DispatchConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, shutdown.clone()));

    matcher::recover_in_flight_rides(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        shutdown.clone(),
    )
    .await;

    let router = transport::build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "dispatch core listening");

    let shutdown_signal = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown_signal.cancelled().await })
        .await?;

    Ok(())
}
