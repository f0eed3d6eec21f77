// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Authorization middleware for the administrative router.
//!
//! Reads the client certificate serial from the trusted header set by the TLS
//! terminator, runs the [`AuthorizationService`] decision and either rejects
//! the request or forwards it with a [`CallerIdentity`] extension.

use axum::{
    extract::{Request, State},
    http::{header::InvalidHeaderName, HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::application::authorization::{AuthorizationRequest, AuthorizationService};
use crate::domain::identity::Identity;
use crate::presentation::api::ApiError;

/// The authenticated operator behind the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(pub Identity);

#[derive(Clone)]
pub struct AuthorizationLayerState {
    service: Arc<dyn AuthorizationService>,
    serial_header: HeaderName,
}

impl AuthorizationLayerState {
    pub fn new(
        service: Arc<dyn AuthorizationService>,
        serial_header: &str,
    ) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            service,
            serial_header: HeaderName::from_bytes(serial_header.trim().as_bytes())?,
        })
    }
}

pub async fn authorize_request(
    State(state): State<AuthorizationLayerState>,
    mut request: Request,
    next: Next,
) -> Response {
    let serial = request
        .headers()
        .get(&state.serial_header)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let auth_request = AuthorizationRequest {
        serial,
        method: request.method().clone(),
        path: request.uri().path().to_string(),
    };

    match state.service.authorize(&auth_request).await {
        Ok(decision) => {
            request
                .extensions_mut()
                .insert(CallerIdentity(decision.operator));
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
