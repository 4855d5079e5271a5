// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase Controller (§4.5): the per-ride broadcast-offer state machine.
//!
//! Structured like the teacher's `spawn_health_checker` — one independent
//! `tokio::spawn`ed task per ride, racing its sleep against the shared
//! shutdown `CancellationToken` in a `tokio::select!` — except here the
//! task's lifetime is one ride's dispatch, not a forever loop. No timer
//! handle is kept anywhere the Store can't reconstruct: on crash, §4.5's
//! recovery rule re-derives the same state from `ride.phase` and
//! `ride.phaseExpiresAt` alone.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::clock::{deadline_ms, epoch_ms};
use crate::config::DispatchConfig;
use crate::domain::{Ride, RideId};
use crate::store::{NewOffer, Store};

/// Outcome of one offer-emission wave (§4.5 steps 1-6).
enum PhaseEmit {
    /// Ride is no longer dispatchable (terminal, assigned, or gone).
    Stopped,
    /// Zero candidates this wave.
    NoCandidates,
    /// Offers went out; the wave's TTL to wait out before the next check.
    Created(Duration),
}

/// Outcome of a phase-end reconciliation (§4.5 step 8 / crash recovery).
enum PhaseEnd {
    Stopped,
    NextPhase(u8),
    /// Phase 3 exhausted but a conservative re-check budget remains (design
    /// notes: avoid racing a FAILED verdict against a driver coming online
    /// just as the last wave expires).
    RetryPhase3,
    Fail,
}

/// Expire sweep + reload + persist-phase + candidate selection + offer
/// emission, in one pass (§4.5 steps 1-6).
async fn emit_phase(store: &Store, cfg: &DispatchConfig, ride_id: RideId, phase: u8) -> PhaseEmit {
    let now = epoch_ms();
    store.expire_sent_offers(ride_id, now).await;

    let ride: Ride = match store.get_ride(ride_id).await {
        Some(r) => r,
        None => return PhaseEmit::Stopped,
    };
    if ride.status.is_terminal() || ride.assigned_driver_id.is_some() {
        return PhaseEmit::Stopped;
    }

    let params = cfg.phase(phase);
    let expires_at_ms = now + params.ttl.as_millis() as u64;
    if store.update_ride_phase(ride_id, phase, params.radius_km, expires_at_ms).await.is_err() {
        return PhaseEmit::Stopped;
    }

    let candidates =
        store.list_candidate_drivers(ride.pickup.coords, params.radius_km, cfg.earth_radius_km).await;
    let records: Vec<NewOffer> = candidates
        .iter()
        .map(|d| NewOffer { ride_id, driver_id: d.id, sent_at_ms: now, expires_at_ms })
        .collect();
    let created = store.create_offers_skip_duplicates(records).await;

    if created == 0 {
        PhaseEmit::NoCandidates
    } else {
        tracing::info!(ride_id = %ride_id, phase, created, "offers sent");
        PhaseEmit::Created(params.ttl)
    }
}

/// Phase-end reconciliation: repeat the expire sweep, reload, and decide
/// whether to advance, retry, fail, or stop (§4.5 step 8).
async fn phase_end(
    store: &Store,
    ride_id: RideId,
    phase: u8,
    phase3_retries_left: &mut u8,
) -> PhaseEnd {
    let now = epoch_ms();
    store.expire_sent_offers(ride_id, now).await;

    let ride = match store.get_ride(ride_id).await {
        Some(r) => r,
        None => return PhaseEnd::Stopped,
    };
    if ride.status.is_terminal() || ride.assigned_driver_id.is_some() {
        return PhaseEnd::Stopped;
    }

    if phase < 3 {
        return PhaseEnd::NextPhase(phase + 1);
    }
    if *phase3_retries_left > 0 {
        *phase3_retries_left -= 1;
        tracing::debug!(ride_id = %ride_id, "phase 3 exhausted, re-checking once before failing");
        return PhaseEnd::RetryPhase3;
    }
    PhaseEnd::Fail
}

/// Sleep until `deadline_ms`, or return early if shutdown is requested.
/// Returns `false` if shutdown fired first.
async fn wait_until(shutdown: &CancellationToken, deadline_ms: u64) -> bool {
    let now = epoch_ms();
    let remaining = Duration::from_millis(deadline_ms.saturating_sub(now));
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(remaining) => true,
    }
}

/// Drive one ride's dispatch from `start_phase` onward.
///
/// `resume_deadline_ms`, when set, means "skip the initial offer wave and
/// go straight to waiting out the remainder of an in-flight phase" — used
/// by crash recovery to re-arm a timer for the interval actually left
/// (§4.5 "Rides with phaseExpiresAt > now have their timer re-armed for
/// the remaining interval"). `None` starts a fresh wave immediately.
async fn run_ride_dispatch(
    store: Arc<Store>,
    cfg: Arc<DispatchConfig>,
    shutdown: CancellationToken,
    ride_id: RideId,
    start_phase: u8,
    mut resume_deadline_ms: Option<u64>,
) {
    let mut phase = start_phase;
    let mut phase3_retries_left = 1u8;

    loop {
        if let Some(deadline_ms) = resume_deadline_ms.take() {
            if !wait_until(&shutdown, deadline_ms).await {
                return;
            }
            match phase_end(&store, ride_id, phase, &mut phase3_retries_left).await {
                PhaseEnd::Stopped => return,
                PhaseEnd::Fail => {
                    tracing::info!(ride_id = %ride_id, "no driver found, ride failed");
                    let _ = store.fail_ride(ride_id).await;
                    return;
                }
                PhaseEnd::NextPhase(p) => {
                    phase = p;
                    continue;
                }
                PhaseEnd::RetryPhase3 => continue,
            }
        }

        match emit_phase(&store, &cfg, ride_id, phase).await {
            PhaseEmit::Stopped => return,
            PhaseEmit::NoCandidates => {
                if phase < 3 {
                    phase += 1;
                    continue;
                }
                if phase3_retries_left > 0 {
                    phase3_retries_left -= 1;
                    continue;
                }
                tracing::info!(ride_id = %ride_id, "no driver found, ride failed");
                let _ = store.fail_ride(ride_id).await;
                return;
            }
            PhaseEmit::Created(ttl) => {
                resume_deadline_ms = Some(deadline_ms(ttl));
            }
        }
    }
}

/// Spawn a fresh dispatch task for a just-created ride, starting at phase 1.
pub fn spawn_ride_dispatch(
    store: Arc<Store>,
    cfg: Arc<DispatchConfig>,
    shutdown: CancellationToken,
    ride_id: RideId,
) {
    tokio::spawn(run_ride_dispatch(store, cfg, shutdown, ride_id, 1, None));
}

/// Crash recovery (§4.5): reconcile every SEARCHING ride on startup, then
/// resume its dispatch task from where the Store says it left off.
pub async fn recover_in_flight_rides(store: Arc<Store>, cfg: Arc<DispatchConfig>, shutdown: CancellationToken) {
    let rides = store.list_searching_rides().await;
    for ride in rides {
        let resume_deadline_ms = ride.phase_expires_at_ms;
        tracing::info!(
            ride_id = %ride.id,
            phase = ride.phase,
            "recovering in-flight ride dispatch after restart"
        );
        tokio::spawn(run_ride_dispatch(
            Arc::clone(&store),
            Arc::clone(&cfg),
            shutdown.clone(),
            ride.id,
            ride.phase,
            resume_deadline_ms,
        ));
    }
}
