// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The transactional persistence abstraction of §4.1.
//!
//! Grounded in the teacher's `MuxState`: a single shared struct guarding its
//! maps behind `tokio` locks (`coopmux::state::MuxState::sessions`). Here
//! every mutation goes through one `tokio::sync::Mutex<StoreInner>` so that
//! the multi-row invariants of §3 (I2-I4) are maintained inside a single
//! critical section, matching §5's requirement that "all multi-row
//! invariants are maintained inside single Store transactions." A
//! coarse-grained mutex is a correct, if not maximally concurrent,
//! implementation of "serializable or equivalent isolation" for an
//! in-process store; nothing in §4-§5 requires finer-grained locking.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::clock::epoch_ms;
use crate::domain::{
    Availability, Driver, DriverId, OfferStatus, PassengerId, Ride, RideId, RideOffer, RideStatus,
    Stop,
};
use crate::error::DispatchError;
use crate::geo::{distance_km, Coords};
use crate::ride_state_machine::can_transition;

/// One candidate's worth of a new offer, prior to id assignment.
pub struct NewOffer {
    pub ride_id: RideId,
    pub driver_id: DriverId,
    pub sent_at_ms: u64,
    pub expires_at_ms: u64,
}

struct StoreInner {
    rides: HashMap<RideId, Ride>,
    drivers: HashMap<DriverId, Driver>,
    offers: HashMap<crate::domain::OfferId, RideOffer>,
}

pub struct Store {
    inner: Mutex<StoreInner>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                rides: HashMap::new(),
                drivers: HashMap::new(),
                offers: HashMap::new(),
            }),
        }
    }

    // -- Rides ----------------------------------------------------------

    pub async fn create_ride(
        &self,
        passenger_id: PassengerId,
        pickup: Stop,
        dropoff: Stop,
    ) -> Ride {
        let mut inner = self.inner.lock().await;
        let ride = Ride {
            id: RideId::new(),
            passenger_id,
            assigned_driver_id: None,
            pickup,
            dropoff,
            status: RideStatus::Searching,
            phase: 1,
            search_radius_km: 5.0,
            phase_expires_at_ms: None,
            created_at_ms: epoch_ms(),
        };
        inner.rides.insert(ride.id, ride.clone());
        ride
    }

    pub async fn get_ride(&self, id: RideId) -> Option<Ride> {
        self.inner.lock().await.rides.get(&id).cloned()
    }

    pub async fn list_rides_by_passenger(&self, passenger_id: PassengerId, limit: usize) -> Vec<Ride> {
        let inner = self.inner.lock().await;
        let mut rides: Vec<Ride> =
            inner.rides.values().filter(|r| r.passenger_id == passenger_id).cloned().collect();
        rides.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        rides.truncate(limit);
        rides
    }

    /// All rides currently SEARCHING, for the §4.5 crash-recovery scan.
    pub async fn list_searching_rides(&self) -> Vec<Ride> {
        let inner = self.inner.lock().await;
        inner.rides.values().filter(|r| r.status == RideStatus::Searching).cloned().collect()
    }

    pub async fn list_rides_by_driver(&self, driver_id: DriverId, limit: usize) -> Vec<Ride> {
        let inner = self.inner.lock().await;
        let mut rides: Vec<Ride> = inner
            .rides
            .values()
            .filter(|r| r.assigned_driver_id == Some(driver_id))
            .cloned()
            .collect();
        rides.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        rides.truncate(limit);
        rides
    }

    /// Conditional on the ride not being terminal (I5).
    pub async fn update_ride_phase(
        &self,
        id: RideId,
        phase: u8,
        radius_km: f64,
        phase_expires_at_ms: u64,
    ) -> Result<Ride, DispatchError> {
        let mut inner = self.inner.lock().await;
        let ride = inner.rides.get_mut(&id).ok_or(DispatchError::NotFound)?;
        if ride.status.is_terminal() {
            return Err(DispatchError::Conflict);
        }
        ride.phase = phase;
        ride.search_radius_km = radius_km;
        ride.phase_expires_at_ms = Some(phase_expires_at_ms);
        if ride.status == RideStatus::Open {
            ride.status = RideStatus::Searching;
        }
        Ok(ride.clone())
    }

    /// Marks a ride FAILED (Matcher exhaustion), CANCELED (passenger/driver
    /// request), or COMPLETED (driver request) via the §4.6 gate, clearing
    /// `phaseExpiresAt`. A terminal transition also releases any assigned
    /// driver back to ONLINE (I6: a BUSY driver always owns a non-terminal
    /// ride) in the same locked transaction.
    fn transition_ride_locked(
        inner: &mut StoreInner,
        id: RideId,
        to: RideStatus,
    ) -> Result<Ride, DispatchError> {
        let ride = {
            let ride = inner.rides.get_mut(&id).ok_or(DispatchError::NotFound)?;
            if !can_transition(ride.status, to) {
                return Err(DispatchError::Conflict);
            }
            ride.status = to;
            if to.is_terminal() {
                ride.phase_expires_at_ms = None;
            }
            ride.clone()
        };
        if to.is_terminal() {
            if let Some(driver_id) = ride.assigned_driver_id {
                if let Some(driver) = inner.drivers.get_mut(&driver_id) {
                    driver.availability = Availability::Online;
                }
            }
        }
        Ok(ride)
    }

    pub async fn fail_ride(&self, id: RideId) -> Result<Ride, DispatchError> {
        let mut inner = self.inner.lock().await;
        Self::transition_ride_locked(&mut inner, id, RideStatus::Failed)
    }

    pub async fn cancel_ride_as_passenger(
        &self,
        id: RideId,
        passenger_id: PassengerId,
    ) -> Result<Ride, DispatchError> {
        let mut inner = self.inner.lock().await;
        let owner_matches =
            inner.rides.get(&id).map(|r| r.passenger_id == passenger_id).ok_or(DispatchError::NotFound)?;
        if !owner_matches {
            return Err(DispatchError::Forbidden);
        }
        Self::transition_ride_locked(&mut inner, id, RideStatus::Canceled)
    }

    /// Updates only when `current.assignedDriverId = driverId`; returns
    /// rows affected (0 surfaces `Forbidden` at the caller per §4.6).
    pub async fn update_ride_status_if_owner(
        &self,
        id: RideId,
        driver_id: DriverId,
        new_status: RideStatus,
    ) -> Result<usize, DispatchError> {
        let mut inner = self.inner.lock().await;
        let ride = inner.rides.get(&id).ok_or(DispatchError::NotFound)?;
        if ride.assigned_driver_id != Some(driver_id) {
            return Ok(0);
        }
        Self::transition_ride_locked(&mut inner, id, new_status)?;
        Ok(1)
    }

    // -- Drivers ----------------------------------------------------------

    /// Lazily creates a driver entry defaulting to OFFLINE. Registration
    /// itself is out of scope (§1); this only tracks the mutable
    /// availability/location the core actually owns.
    async fn ensure_driver_locked(inner: &mut StoreInner, driver_id: DriverId) -> &mut Driver {
        inner.drivers.entry(driver_id).or_insert_with(|| Driver {
            id: driver_id,
            availability: Availability::Offline,
            location: None,
        })
    }

    pub async fn get_driver(&self, driver_id: DriverId) -> Option<Driver> {
        self.inner.lock().await.drivers.get(&driver_id).cloned()
    }

    /// Drivers may only move between ONLINE and OFFLINE (§4.3); the BUSY
    /// transition is pushed only by `accept_offer_atomic`. Going OFFLINE
    /// while BUSY is rejected to preserve I6.
    pub async fn set_driver_availability(
        &self,
        driver_id: DriverId,
        online: bool,
    ) -> Result<Driver, DispatchError> {
        let mut inner = self.inner.lock().await;
        let driver = Self::ensure_driver_locked(&mut inner, driver_id).await;
        if driver.availability == Availability::Busy {
            return Err(DispatchError::Conflict);
        }
        driver.availability = if online { Availability::Online } else { Availability::Offline };
        Ok(driver.clone())
    }

    pub async fn set_driver_location(
        &self,
        driver_id: DriverId,
        coords: Coords,
    ) -> Result<Driver, DispatchError> {
        let mut inner = self.inner.lock().await;
        let driver = Self::ensure_driver_locked(&mut inner, driver_id).await;
        driver.location = Some(coords);
        Ok(driver.clone())
    }

    /// Called after an acceptance commits; pushes the driver to BUSY (step
    /// 10 of §4.4). Not exposed outside the Store.
    fn set_driver_busy_locked(inner: &mut StoreInner, driver_id: DriverId) {
        if let Some(driver) = inner.drivers.get_mut(&driver_id) {
            driver.availability = Availability::Busy;
        }
    }

    /// Candidate selection (§4.5 step 4): all ONLINE drivers, narrowed by
    /// radius when the ride has pickup coordinates. A driver with no
    /// location is eligible only when the ride itself has none.
    pub async fn list_candidate_drivers(
        &self,
        pickup: Option<Coords>,
        radius_km: f64,
        earth_radius_km: f64,
    ) -> Vec<Driver> {
        let inner = self.inner.lock().await;
        inner
            .drivers
            .values()
            .filter(|d| d.availability.is_online())
            .filter(|d| match (pickup, d.location) {
                (Some(p), Some(loc)) => distance_km(p, loc, earth_radius_km) <= radius_km,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect()
    }

    // -- Offers -----------------------------------------------------------

    /// One record per candidate; duplicates on `(rideId, driverId)` are
    /// silently skipped (I2).
    pub async fn create_offers_skip_duplicates(&self, records: Vec<NewOffer>) -> usize {
        let mut inner = self.inner.lock().await;
        let mut created = 0usize;
        for rec in records {
            let exists = inner
                .offers
                .values()
                .any(|o| o.ride_id == rec.ride_id && o.driver_id == rec.driver_id);
            if exists {
                continue;
            }
            let offer = RideOffer {
                id: crate::domain::OfferId::new(),
                ride_id: rec.ride_id,
                driver_id: rec.driver_id,
                status: OfferStatus::Sent,
                sent_at_ms: rec.sent_at_ms,
                expires_at_ms: rec.expires_at_ms,
                accepted_at_ms: None,
                rejected_at_ms: None,
            };
            inner.offers.insert(offer.id, offer);
            created += 1;
        }
        created
    }

    /// Sets status EXPIRED for all SENT offers on `ride_id` whose
    /// `expiresAt <= now`. Must run before candidate/offer reads so a
    /// driver is never offered a ride while a prior SENT offer lingers.
    pub async fn expire_sent_offers(&self, ride_id: RideId, now_ms: u64) -> usize {
        let mut inner = self.inner.lock().await;
        let mut count = 0usize;
        for offer in inner.offers.values_mut() {
            if offer.ride_id == ride_id && offer.status == OfferStatus::Sent && offer.expires_at_ms <= now_ms
            {
                offer.status = OfferStatus::Expired;
                count += 1;
            }
        }
        count
    }

    /// Active (SENT, unexpired) offers for a driver, newest first, bounded
    /// at `limit`. Runs its own expire sweep across every ride the driver
    /// has a SENT offer against, per §6.1's `driver.offersActive` contract.
    pub async fn list_active_offers_for_driver(
        &self,
        driver_id: DriverId,
        now_ms: u64,
        limit: usize,
    ) -> Vec<RideOffer> {
        let mut inner = self.inner.lock().await;
        for offer in inner.offers.values_mut() {
            if offer.driver_id == driver_id && offer.status == OfferStatus::Sent && offer.expires_at_ms <= now_ms
            {
                offer.status = OfferStatus::Expired;
            }
        }
        let mut active: Vec<RideOffer> = inner
            .offers
            .values()
            .filter(|o| o.driver_id == driver_id && o.status == OfferStatus::Sent && o.expires_at_ms > now_ms)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.sent_at_ms.cmp(&a.sent_at_ms));
        active.truncate(limit);
        active
    }

    pub async fn get_offer(&self, id: crate::domain::OfferId) -> Option<RideOffer> {
        self.inner.lock().await.offers.get(&id).cloned()
    }

    /// The critical section of §4.4, executed as a single lock hold so
    /// exactly one concurrent acceptance for a ride can ever succeed.
    pub async fn accept_offer_atomic(
        &self,
        offer_id: crate::domain::OfferId,
        driver_id: DriverId,
        now_ms: u64,
    ) -> Result<Ride, DispatchError> {
        let mut inner = self.inner.lock().await;

        // 1. Load offer, requiring ownership.
        let offer_ride_id = {
            let offer = inner.offers.get(&offer_id).ok_or(DispatchError::NotFound)?;
            if offer.driver_id != driver_id {
                return Err(DispatchError::NotFound);
            }
            offer.ride_id
        };

        // 2-3. Must still be SENT and unexpired.
        {
            let offer = inner.offers.get_mut(&offer_id).ok_or(DispatchError::Internal)?;
            if offer.status != OfferStatus::Sent {
                return Err(DispatchError::Conflict);
            }
            if offer.expires_at_ms <= now_ms {
                offer.status = OfferStatus::Expired;
                return Err(DispatchError::Conflict);
            }
        }

        // 4-6. Ride must still be unassigned and dispatchable.
        {
            let ride = inner.rides.get(&offer_ride_id).ok_or(DispatchError::NotFound)?;
            if ride.assigned_driver_id.is_some() {
                return Err(DispatchError::Conflict);
            }
            if matches!(ride.status, RideStatus::Failed | RideStatus::Canceled | RideStatus::Completed) {
                return Err(DispatchError::Conflict);
            }
        }

        // 7. Assign the ride to the caller.
        let ride = {
            let ride = inner.rides.get_mut(&offer_ride_id).ok_or(DispatchError::Internal)?;
            ride.assigned_driver_id = Some(driver_id);
            ride.status = RideStatus::Accepted;
            ride.phase_expires_at_ms = None;
            ride.clone()
        };

        // 8. Accept this offer.
        {
            let offer = inner.offers.get_mut(&offer_id).ok_or(DispatchError::Internal)?;
            offer.status = OfferStatus::Accepted;
            offer.accepted_at_ms = Some(now_ms);
        }

        // 9. Expire every other SENT offer for this ride.
        for offer in inner.offers.values_mut() {
            if offer.ride_id == offer_ride_id && offer.id != offer_id && offer.status == OfferStatus::Sent {
                offer.status = OfferStatus::Expired;
            }
        }

        // 10. Caller driver becomes BUSY.
        Self::set_driver_busy_locked(&mut inner, driver_id);

        // 11. Return the updated ride.
        Ok(ride)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
