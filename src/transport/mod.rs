// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route table and middleware wiring, grounded in the teacher's
//! `transport::build_router_inner`.

pub mod http;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::identity_layer;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(http::healthz))
        .route("/api/v1/rides", post(http::create_ride).get(http::list_my_rides))
        .route("/api/v1/rides/{id}", get(http::ride_status))
        .route("/api/v1/rides/{id}/cancel", post(http::cancel_ride))
        .route("/api/v1/drivers/me/availability", post(http::set_availability))
        .route("/api/v1/drivers/me/location", post(http::set_location))
        .route("/api/v1/drivers/me/rides", get(http::list_my_assigned_rides))
        .route("/api/v1/drivers/me/offers", get(http::offers_active))
        .route("/api/v1/drivers/me/offers/{id}/accept", post(http::accept_offer))
        .route("/api/v1/drivers/me/rides/{id}/status", post(http::driver_ride_status))
        .layer(middleware::from_fn(identity_layer))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
