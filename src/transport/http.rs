// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the §6.1 request surface.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::clock::epoch_ms;
use crate::domain::{Availability, Driver, DriverId, Ride, RideId, RideOffer, RideStatus, Stop};
use crate::error::{ApiError, DispatchError};
use crate::geo::Coords;
use crate::matcher;
use crate::state::AppState;

// -- DTOs ---------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub open_rides: usize,
    pub searching_rides: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRideRequest {
    pub pickup_text: String,
    #[serde(default)]
    pub pickup_lat: Option<f64>,
    #[serde(default)]
    pub pickup_lng: Option<f64>,
    #[serde(default)]
    pub dropoff_text: Option<String>,
    #[serde(default)]
    pub dropoff_lat: Option<f64>,
    #[serde(default)]
    pub dropoff_lng: Option<f64>,
}

fn coords_from_pair(lat: Option<f64>, lng: Option<f64>) -> Result<Option<Coords>, DispatchError> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Ok(Some(Coords::new(lat, lng)?)),
        (None, None) => Ok(None),
        _ => Err(DispatchError::InvalidArgument),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverSummary {
    pub id: DriverId,
    pub availability: Availability,
}

impl From<Driver> for DriverSummary {
    fn from(d: Driver) -> Self {
        Self { id: d.id, availability: d.availability }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideResponse {
    #[serde(flatten)]
    pub ride: Ride,
    pub assigned_driver: Option<DriverSummary>,
}

async fn to_ride_response(state: &AppState, ride: Ride) -> RideResponse {
    let assigned_driver = match ride.assigned_driver_id {
        Some(driver_id) => state.store.get_driver(driver_id).await.map(DriverSummary::from),
        None => None,
    };
    RideResponse { ride, assigned_driver }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAvailabilityRequest {
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub is_online: Option<bool>,
}

fn resolve_online(req: &SetAvailabilityRequest) -> Result<bool, DispatchError> {
    if let Some(ref explicit) = req.availability {
        return match explicit.to_uppercase().as_str() {
            "ONLINE" => Ok(true),
            "OFFLINE" => Ok(false),
            // BUSY is pushed only by the Matcher (§4.3); a driver cannot
            // self-assign it.
            _ => Err(DispatchError::InvalidArgument),
        };
    }
    req.is_online.ok_or(DispatchError::InvalidArgument)
}

#[derive(Debug, Deserialize)]
pub struct SetLocationRequest {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideSummary {
    pub id: RideId,
    pub pickup: Stop,
    pub dropoff: Stop,
    pub status: RideStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferView {
    #[serde(flatten)]
    pub offer: RideOffer,
    pub ride: RideSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideStatusUpdateRequest {
    pub new_status: RideStatus,
}

// -- Handlers -------------------------------------------------------------

/// `GET /healthz` — no auth required.
pub async fn healthz(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let searching = s.store.list_searching_rides().await.len();
    Json(HealthResponse { status: "running".to_owned(), open_rides: searching, searching_rides: searching })
}

/// `POST /api/v1/rides` — `ride.create`.
pub async fn create_ride(
    State(s): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<CreateRideRequest>,
) -> Result<Json<RideResponse>, ApiError> {
    let passenger_id = identity.as_passenger()?;
    if req.pickup_text.trim().is_empty() {
        return Err(DispatchError::InvalidArgument.into());
    }

    let pickup_coords = coords_from_pair(req.pickup_lat, req.pickup_lng)?;
    let dropoff_coords = coords_from_pair(req.dropoff_lat, req.dropoff_lng)?;

    let pickup = Stop { text: req.pickup_text, coords: pickup_coords };
    let dropoff = Stop { text: req.dropoff_text.unwrap_or_default(), coords: dropoff_coords };

    let ride = s.store.create_ride(passenger_id, pickup, dropoff).await;
    tracing::info!(ride_id = %ride.id, passenger_id = %passenger_id, "ride created");

    matcher::spawn_ride_dispatch(
        Arc::clone(&s.store),
        Arc::clone(&s.config),
        s.shutdown.clone(),
        ride.id,
    );

    Ok(Json(to_ride_response(&s, ride).await))
}

/// `GET /api/v1/rides/{id}` — `ride.status`.
pub async fn ride_status(
    State(s): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    let passenger_id = identity.as_passenger()?;
    let ride = s.store.get_ride(RideId(id)).await.ok_or(DispatchError::NotFound)?;
    if ride.passenger_id != passenger_id {
        return Err(DispatchError::Forbidden.into());
    }
    Ok(Json(to_ride_response(&s, ride).await))
}

/// `GET /api/v1/rides` — `ride.listMine`, newest first, bounded.
pub async fn list_my_rides(
    State(s): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<RideResponse>>, ApiError> {
    let passenger_id = identity.as_passenger()?;
    let rides = s.store.list_rides_by_passenger(passenger_id, s.config.rides_history_read_limit).await;
    let mut out = Vec::with_capacity(rides.len());
    for ride in rides {
        out.push(to_ride_response(&s, ride).await);
    }
    Ok(Json(out))
}

/// `POST /api/v1/rides/{id}/cancel` — passenger cancellation (§4.6).
pub async fn cancel_ride(
    State(s): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    let passenger_id = identity.as_passenger()?;
    let ride = s.store.cancel_ride_as_passenger(RideId(id), passenger_id).await?;
    tracing::info!(ride_id = %ride.id, "ride canceled by passenger");
    Ok(Json(to_ride_response(&s, ride).await))
}

/// `POST /api/v1/drivers/me/availability` — `driver.setAvailability`.
pub async fn set_availability(
    State(s): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<SetAvailabilityRequest>,
) -> Result<Json<Driver>, ApiError> {
    let driver_id = identity.as_driver()?;
    let online = resolve_online(&req)?;
    let driver = s.store.set_driver_availability(driver_id, online).await?;
    tracing::info!(driver_id = %driver_id, online, "driver availability updated");
    Ok(Json(driver))
}

/// `POST /api/v1/drivers/me/location` — `driver.setLocation`.
pub async fn set_location(
    State(s): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<SetLocationRequest>,
) -> Result<Json<Driver>, ApiError> {
    let driver_id = identity.as_driver()?;
    let coords = Coords::new(req.lat, req.lng)?;
    let driver = s.store.set_driver_location(driver_id, coords).await?;
    Ok(Json(driver))
}

/// `GET /api/v1/drivers/me/rides` — symmetric with `ride.listMine`, backed
/// by the Store's `listRidesByDriver` (§4.1).
pub async fn list_my_assigned_rides(
    State(s): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<RideResponse>>, ApiError> {
    let driver_id = identity.as_driver()?;
    let rides = s.store.list_rides_by_driver(driver_id, s.config.rides_history_read_limit).await;
    let mut out = Vec::with_capacity(rides.len());
    for ride in rides {
        out.push(to_ride_response(&s, ride).await);
    }
    Ok(Json(out))
}

/// `GET /api/v1/drivers/me/offers` — `driver.offersActive`.
///
/// Implicitly runs the expiration sweep for the caller before returning,
/// and returns only SENT offers with `expiresAt > now`, bounded and newest
/// first (§6.1).
pub async fn offers_active(
    State(s): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<OfferView>>, ApiError> {
    let driver_id = identity.as_driver()?;
    let now = epoch_ms();
    let offers = s.store.list_active_offers_for_driver(driver_id, now, s.config.offers_active_read_limit).await;

    let mut out = Vec::with_capacity(offers.len());
    for offer in offers {
        if let Some(ride) = s.store.get_ride(offer.ride_id).await {
            out.push(OfferView {
                offer,
                ride: RideSummary { id: ride.id, pickup: ride.pickup, dropoff: ride.dropoff, status: ride.status },
            });
        }
    }
    Ok(Json(out))
}

/// `POST /api/v1/drivers/me/offers/{id}/accept` — `driver.offerAccept` (§4.4).
pub async fn accept_offer(
    State(s): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    let driver_id = identity.as_driver()?;
    let now = epoch_ms();
    let ride = s.store.accept_offer_atomic(crate::domain::OfferId(id), driver_id, now).await?;
    tracing::info!(ride_id = %ride.id, driver_id = %driver_id, "offer accepted");
    Ok(Json(to_ride_response(&s, ride).await))
}

/// `POST /api/v1/drivers/me/rides/{id}/status` — `driver.rideStatus` (§4.6).
pub async fn driver_ride_status(
    State(s): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<RideStatusUpdateRequest>,
) -> Result<Json<RideResponse>, ApiError> {
    let driver_id = identity.as_driver()?;
    let ride_id = RideId(id);
    let count = s.store.update_ride_status_if_owner(ride_id, driver_id, req.new_status).await?;
    if count == 0 {
        return Err(DispatchError::Forbidden.into());
    }
    let ride = s.store.get_ride(ride_id).await.ok_or(DispatchError::NotFound)?;
    Ok(Json(to_ride_response(&s, ride).await))
}
