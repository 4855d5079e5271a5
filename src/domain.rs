// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entities and enums of §3 — the Store's persisted shapes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coords;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(PassengerId);
uuid_id!(DriverId);
uuid_id!(RideId);
uuid_id!(OfferId);

/// A driver's availability (§3). `isOnline` from the source is a derived
/// view over this tri-state — see DESIGN.md "dual availability flags".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Offline,
    Online,
    Busy,
}

impl Availability {
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// A registered driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: DriverId,
    pub availability: Availability,
    pub location: Option<Coords>,
}

/// Ordered lifecycle set for a ride request (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Open,
    Searching,
    Accepted,
    Arriving,
    InProgress,
    Completed,
    Canceled,
    Failed,
}

impl RideStatus {
    /// Terminal statuses freeze status/assignedDriverId/phaseExpiresAt (I5).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed)
    }
}

/// A stop's free-text label plus optional coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub text: String,
    pub coords: Option<Coords>,
}

/// A passenger's demand for a ride (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: RideId,
    pub passenger_id: PassengerId,
    pub assigned_driver_id: Option<DriverId>,
    pub pickup: Stop,
    pub dropoff: Stop,
    pub status: RideStatus,
    pub phase: u8,
    pub search_radius_km: f64,
    pub phase_expires_at_ms: Option<u64>,
    pub created_at_ms: u64,
}

/// Status of a standing offer (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Sent,
    Accepted,
    Rejected,
    Expired,
}

/// A time-bounded proposal of one ride to one driver (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideOffer {
    pub id: OfferId,
    pub ride_id: RideId,
    pub driver_id: DriverId,
    pub status: OfferStatus,
    pub sent_at_ms: u64,
    pub expires_at_ms: u64,
    pub accepted_at_ms: Option<u64>,
    pub rejected_at_ms: Option<u64>,
}
