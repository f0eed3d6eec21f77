// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Request Authorization
//!
//! Per-request decision, terminal on the first failure:
//!
//! 1. Read the client certificate serial forwarded by the TLS terminator.
//! 2. Resolve it to a currently valid operator identity through the certifier.
//! 3. Derive the required permission from the HTTP method.
//! 4. Resolve the addressed entities through the [`EntityResolverRegistry`].
//! 5. Check every (entity, permission) pair against the operator's ACL.
//!
//! A store outage at any step is `ServiceUnavailable`, never a denial.

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::access_control::AccessControlService;
use crate::application::certifier::CertifierService;
use crate::application::entity_resolver::EntityResolverRegistry;
use crate::domain::access_control::Permission;
use crate::domain::clock::Clock;
use crate::domain::errors::AuthorityError;
use crate::domain::events::AuthorityEvent;
use crate::domain::identity::Identity;
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Client certificate serial, as forwarded by the TLS terminator.
    pub serial: Option<String>,
    pub method: Method,
    pub path: String,
}

/// An allowed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub operator: Identity,
    pub required: Permission,
    pub targets: Vec<Identity>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthorizationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthorizationError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AuthorizationError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthorizationError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthorizationError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthorizationError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthorizationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            AuthorizationError::Unauthenticated(_) => "unauthenticated",
            AuthorizationError::Forbidden(_) => "forbidden",
            AuthorizationError::BadRequest(_) => "bad_request",
            AuthorizationError::NotFound(_) => "not_found",
            AuthorizationError::ServiceUnavailable(_) => "unavailable",
            AuthorizationError::Internal(_) => "error",
        }
    }

    /// Mapping for failures while resolving the caller. Anything the caller
    /// could have caused is an authentication failure.
    fn from_caller_lookup(err: AuthorityError) -> Self {
        match err {
            AuthorityError::ServiceUnavailable(msg) => AuthorizationError::ServiceUnavailable(msg),
            e @ (AuthorityError::Corrupted(_) | AuthorityError::Internal(_)) => {
                AuthorizationError::Internal(e.to_string())
            }
            other => AuthorizationError::Unauthenticated(other.to_string()),
        }
    }
}

impl From<AuthorityError> for AuthorizationError {
    fn from(err: AuthorityError) -> Self {
        match err {
            e @ AuthorityError::PermissionDenied { .. } => AuthorizationError::Forbidden(e.to_string()),
            AuthorityError::InvalidArgument(msg) => AuthorizationError::BadRequest(msg),
            AuthorityError::NotFound(msg) => AuthorizationError::NotFound(msg),
            AuthorityError::ServiceUnavailable(msg) => AuthorizationError::ServiceUnavailable(msg),
            e @ (AuthorityError::Expired { .. } | AuthorityError::NotYetValid { .. }) => {
                AuthorizationError::Unauthenticated(e.to_string())
            }
            other => AuthorizationError::Internal(other.to_string()),
        }
    }
}

/// Permission a request method needs. Unknown methods need both bits.
pub fn required_permission(method: &Method) -> Permission {
    match *method {
        Method::GET | Method::HEAD | Method::OPTIONS => Permission::READ,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE => Permission::WRITE,
        _ => Permission::READ_WRITE,
    }
}

#[async_trait]
pub trait AuthorizationService: Send + Sync {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationDecision, AuthorizationError>;
}

pub struct StandardAuthorizationService {
    certifier: Arc<dyn CertifierService>,
    access_control: Arc<dyn AccessControlService>,
    resolvers: EntityResolverRegistry,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl StandardAuthorizationService {
    pub fn new(
        certifier: Arc<dyn CertifierService>,
        access_control: Arc<dyn AccessControlService>,
        resolvers: EntityResolverRegistry,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            certifier,
            access_control,
            resolvers,
            clock,
            event_bus,
        }
    }

    async fn decide(
        &self,
        request: &AuthorizationRequest,
        operator: &mut Option<Identity>,
    ) -> Result<AuthorizationDecision, AuthorizationError> {
        let serial = request
            .serial
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AuthorizationError::Unauthenticated("missing client certificate serial".to_string())
            })?;

        let caller = self
            .certifier
            .get_verified_certificate_identity(serial)
            .await
            .map_err(AuthorizationError::from_caller_lookup)?;
        if !caller.is_operator() {
            return Err(AuthorizationError::Unauthenticated(format!(
                "identity must be for an operator, got {}",
                caller
            )));
        }
        *operator = Some(caller.clone());

        let required = required_permission(&request.method);
        let read_only = required == Permission::READ;
        let targets = self.resolvers.resolve(&request.path, read_only)?;

        let checks: Vec<(Identity, Permission)> =
            targets.iter().map(|t| (t.clone(), required)).collect();
        self.access_control.check_permissions(&caller, &checks).await?;

        Ok(AuthorizationDecision {
            operator: caller,
            required,
            targets,
        })
    }
}

#[async_trait]
impl AuthorizationService for StandardAuthorizationService {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationDecision, AuthorizationError> {
        let mut operator = None;
        let result = self.decide(request, &mut operator).await;

        let outcome = match &result {
            Ok(decision) => {
                debug!(
                    operator = %decision.operator,
                    method = %request.method,
                    path = %request.path,
                    required = %decision.required,
                    "Request authorized"
                );
                "allowed"
            }
            Err(err) => {
                let who = operator
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".to_string());
                warn!(
                    operator = %who,
                    method = %request.method,
                    path = %request.path,
                    error = %err,
                    "Request rejected"
                );
                if matches!(
                    err,
                    AuthorizationError::Unauthenticated(_) | AuthorizationError::Forbidden(_)
                ) {
                    self.event_bus.publish(AuthorityEvent::AuthorizationDenied {
                        operator: operator.clone(),
                        method: request.method.to_string(),
                        path: request.path.clone(),
                        reason: err.to_string(),
                        denied_at: self.clock.now(),
                    });
                }
                err.outcome()
            }
        };
        metrics::counter!("sentinel_authorization_decisions_total", "outcome" => outcome)
            .increment(1);

        result
    }
}
