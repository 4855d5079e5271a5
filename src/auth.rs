// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth Gate (§4.7): the core never inspects credentials, only the shape
//! of an already-authenticated identity. Grounded in the teacher's
//! `transport::auth` module, which performs its own bearer-token check
//! before handing off to route handlers — here the upstream authenticator
//! is modeled as having already run, attaching trusted identity headers.

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::domain::{DriverId, PassengerId};
use crate::error::DispatchError;

/// The authenticated caller of an entry point (§4.7).
#[derive(Debug, Clone, Copy)]
pub enum Identity {
    Passenger(PassengerId),
    Driver(DriverId),
}

impl Identity {
    pub fn as_passenger(self) -> Result<PassengerId, DispatchError> {
        match self {
            Self::Passenger(id) => Ok(id),
            Self::Driver(_) => Err(DispatchError::Unauthorized),
        }
    }

    pub fn as_driver(self) -> Result<DriverId, DispatchError> {
        match self {
            Self::Driver(id) => Ok(id),
            Self::Passenger(_) => Err(DispatchError::Unauthorized),
        }
    }
}

const PASSENGER_HEADER: &str = "x-passenger-id";
const DRIVER_HEADER: &str = "x-driver-id";

fn parse_uuid_header(parts: &Parts, name: &str) -> Option<uuid::Uuid> {
    parts.headers.get(name).and_then(|v| v.to_str().ok()).and_then(|s| uuid::Uuid::parse_str(s).ok())
}

/// Middleware that resolves trusted identity headers into request
/// extensions before any handler runs. Unparseable/missing headers are
/// allowed through here — routes that require an identity extract
/// [`Identity`] and reject with `Unauthorized` themselves, mirroring the
/// teacher's per-route exemption list in `auth_layer` rather than a single
/// blanket gate (some routes, like `GET /healthz`, need neither).
pub async fn identity_layer(req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    if let Some(uuid) = parse_uuid_header(&parts, PASSENGER_HEADER) {
        parts.extensions.insert(Identity::Passenger(PassengerId(uuid)));
    } else if let Some(uuid) = parse_uuid_header(&parts, DRIVER_HEADER) {
        parts.extensions.insert(Identity::Driver(DriverId(uuid)));
    }
    let req = Request::from_parts(parts, body);
    next.run(req).await
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Identity>().copied().ok_or_else(|| {
            let (status, body) = DispatchError::Unauthorized.to_http_response("missing identity");
            (StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::UNAUTHORIZED), body)
                .into_response()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_passenger_rejects_driver_identity() {
        let identity = Identity::Driver(DriverId::new());
        assert_eq!(identity.as_passenger(), Err(DispatchError::Unauthorized));
    }

    #[test]
    fn as_driver_rejects_passenger_identity() {
        let identity = Identity::Passenger(PassengerId::new());
        assert_eq!(identity.as_driver(), Err(DispatchError::Unauthorized));
    }
}
