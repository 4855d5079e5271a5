// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Great-circle distance between two coordinates.

use crate::error::DispatchError;

/// A latitude/longitude pair, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lng: f64,
}

impl Coords {
    pub fn new(lat: f64, lng: f64) -> Result<Self, DispatchError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(DispatchError::InvalidArgument);
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(DispatchError::InvalidArgument);
        }
        Ok(Self { lat, lng })
    }
}

/// Great-circle distance in kilometers via the haversine formula.
pub fn distance_km(a: Coords, b: Coords, earth_radius_km: f64) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let sin_dlat2 = (dlat / 2.0).sin();
    let sin_dlng2 = (dlng / 2.0).sin();

    let h = sin_dlat2 * sin_dlat2 + lat1.cos() * lat2.cos() * sin_dlng2 * sin_dlng2;
    let c = 2.0 * h.min(1.0).sqrt().asin();
    (earth_radius_km * c).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EARTH_RADIUS_KM: f64 = 6371.0;

    #[test]
    fn rejects_out_of_range_latitude() {
        assert_eq!(Coords::new(91.0, 0.0), Err(DispatchError::InvalidArgument));
        assert_eq!(Coords::new(-91.0, 0.0), Err(DispatchError::InvalidArgument));
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        assert_eq!(Coords::new(0.0, 181.0), Err(DispatchError::InvalidArgument));
        assert_eq!(Coords::new(0.0, -181.0), Err(DispatchError::InvalidArgument));
    }

    #[test]
    fn rejects_non_finite_input() {
        assert_eq!(Coords::new(f64::NAN, 0.0), Err(DispatchError::InvalidArgument));
        assert_eq!(Coords::new(0.0, f64::INFINITY), Err(DispatchError::InvalidArgument));
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = Coords::new(41.015, 28.979).unwrap();
        assert!(distance_km(p, p, EARTH_RADIUS_KM) < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Coords::new(41.0082, 28.9784).unwrap();
        let b = Coords::new(40.7128, -74.0060).unwrap();
        let d1 = distance_km(a, b, EARTH_RADIUS_KM);
        let d2 = distance_km(b, a, EARTH_RADIUS_KM);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn known_distance_istanbul_to_new_york() {
        let istanbul = Coords::new(41.0082, 28.9784).unwrap();
        let new_york = Coords::new(40.7128, -74.0060).unwrap();
        let d = distance_km(istanbul, new_york, EARTH_RADIUS_KM);
        // ~8050 km great-circle distance, generous tolerance.
        assert!((d - 8050.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn short_hop_is_finite_and_non_negative() {
        let a = Coords::new(41.01, 28.98).unwrap();
        let b = Coords::new(41.02, 28.99).unwrap();
        let d = distance_km(a, b, EARTH_RADIUS_KM);
        assert!(d.is_finite());
        assert!(d >= 0.0);
        assert!(d < 5.0);
    }
}
