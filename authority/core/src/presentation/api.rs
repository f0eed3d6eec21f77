// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Administrative REST surface of the authority.
//!
//! Every route except `/health` runs behind [`authorize_request`], including
//! the fallback, so unknown paths need the supervisor wildcard set like any
//! other unresolvable request. Binary material (CSRs, certificates) travels
//! as standard base64 DER.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::application::access_control::AccessControlService;
use crate::application::authorization::AuthorizationError;
use crate::application::certifier::{CertifierService, SignCsrRequest};
use crate::domain::access_control::AccessControlEntity;
use crate::domain::certificate::{CaCategory, CertificateRecord, SerialNumber};
use crate::domain::errors::AuthorityError;
use crate::domain::identity::Identity;
use crate::presentation::middleware::{authorize_request, AuthorizationLayerState, CallerIdentity};

pub struct AppState {
    pub certifier: Arc<dyn CertifierService>,
    pub access_control: Arc<dyn AccessControlService>,
    /// Grace period used by `POST /v1/certificates/gc` when the caller gives none.
    pub gc_grace_period: Duration,
    pub start_time: Instant,
}

pub fn app(state: AppState, authorization: AuthorizationLayerState) -> Router {
    let state = Arc::new(state);

    let protected = Router::new()
        .route("/v1/ca/{category}", get(get_ca))
        .route("/v1/certificates", get(list_certificates).post(sign_csr))
        .route("/v1/certificates/import", post(add_certificate))
        .route("/v1/certificates/gc", post(collect_garbage))
        .route(
            "/v1/certificates/{serial}",
            get(get_certificate).delete(revoke_certificate),
        )
        .route("/v1/operators", get(list_operators))
        .route(
            "/v1/operators/{operator_id}/acl",
            get(get_operator_acl)
                .put(set_operator_acl)
                .patch(update_operator_acl)
                .delete(delete_operator_acl),
        )
        .route(
            "/v1/operators/{operator_id}/certificates",
            get(find_operator_certificates),
        )
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(authorization, authorize_request));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

/// JSON error body `{"error": ...}` with the matching status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Details stay in the log.
    fn internal(err: &dyn std::fmt::Display) -> Self {
        error!(error = %err, "Request failed with internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<AuthorityError> for ApiError {
    fn from(err: AuthorityError) -> Self {
        let status = match &err {
            AuthorityError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AuthorityError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthorityError::AlreadyExists(_) => StatusCode::CONFLICT,
            AuthorityError::Expired { .. } | AuthorityError::NotYetValid { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AuthorityError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            AuthorityError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthorityError::Corrupted(_) | AuthorityError::Internal(_) => {
                return Self::internal(&err)
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<AuthorizationError> for ApiError {
    fn from(err: AuthorizationError) -> Self {
        match err {
            AuthorizationError::Internal(_) => Self::internal(&err),
            other => Self::new(other.status_code(), other.to_string()),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn decode_base64(field: &str, value: &str) -> ApiResult<Vec<u8>> {
    STANDARD
        .decode(value.trim())
        .map_err(|e| ApiError::bad_request(format!("{} is not valid base64: {}", field, e)))
}

fn parse_category(category: Option<&str>) -> ApiResult<CaCategory> {
    match category {
        Some(name) => Ok(CaCategory::new(name)?),
        None => Ok(CaCategory::default_category()),
    }
}

fn operator_from_path(operator_id: &str) -> ApiResult<Identity> {
    Ok(Identity::new_operator(operator_id)?)
}

#[derive(Debug, Serialize)]
struct SerialList {
    serial_numbers: Vec<SerialNumber>,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "no such route")
}

async fn get_ca(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let category = parse_category(Some(&category))?;
    let der = state.certifier.get_ca(&category).await?;
    Ok(Json(json!({
        "category": category,
        "certificate": STANDARD.encode(der),
    })))
}

#[derive(Debug, Deserialize)]
pub struct SignCsrBody {
    pub identity: Identity,
    pub valid_for_secs: u64,
    /// Base64 DER PKCS#10 request.
    pub csr: String,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssuedCertificateBody {
    pub serial_number: SerialNumber,
    /// Base64 DER.
    pub certificate: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

async fn sign_csr(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    Json(body): Json<SignCsrBody>,
) -> ApiResult<(StatusCode, Json<IssuedCertificateBody>)> {
    let request = SignCsrRequest {
        identity: body.identity,
        valid_for: Duration::from_secs(body.valid_for_secs),
        csr_der: decode_base64("csr", &body.csr)?,
        category: parse_category(body.category.as_deref())?,
    };
    let issued = state.certifier.sign_csr(request).await?;
    info!(caller = %caller.0, serial = %issued.serial_number, "Certificate signed on request");
    Ok((
        StatusCode::CREATED,
        Json(IssuedCertificateBody {
            serial_number: issued.serial_number,
            certificate: STANDARD.encode(issued.certificate_der),
            not_before: issued.not_before,
            not_after: issued.not_after,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct AddCertificateBody {
    pub identity: Identity,
    /// Base64 DER.
    pub certificate: String,
    /// When set, the certificate must have been issued by this CA.
    pub category: Option<String>,
}

async fn add_certificate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddCertificateBody>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let der = decode_base64("certificate", &body.certificate)?;
    let category = body.category.as_deref().map(CaCategory::new).transpose()?;
    let serial = state
        .certifier
        .add_certificate(body.identity, der, category)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "serial_number": serial }))))
}

async fn list_certificates(State(state): State<Arc<AppState>>) -> ApiResult<Json<SerialList>> {
    Ok(Json(SerialList {
        serial_numbers: state.certifier.list_certificates().await?,
    }))
}

async fn get_certificate(
    State(state): State<Arc<AppState>>,
    Path(serial): Path<String>,
) -> ApiResult<Json<CertificateRecord>> {
    Ok(Json(state.certifier.get_identity(&serial).await?))
}

async fn revoke_certificate(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    Path(serial): Path<String>,
) -> ApiResult<StatusCode> {
    state.certifier.revoke_certificate(&serial).await?;
    info!(caller = %caller.0, serial = %serial, "Certificate revoked on request");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct GarbageCollectionParams {
    pub grace_period_secs: Option<u64>,
}

async fn collect_garbage(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GarbageCollectionParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let grace = params
        .grace_period_secs
        .map(Duration::from_secs)
        .unwrap_or(state.gc_grace_period);
    let collected = state.certifier.collect_garbage(grace).await?;
    Ok(Json(json!({ "collected": collected })))
}

async fn list_operators(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let operators = state.access_control.list_operators().await?;
    Ok(Json(json!({ "operators": operators })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AclBody {
    pub entries: Vec<AccessControlEntity>,
}

async fn get_operator_acl(
    State(state): State<Arc<AppState>>,
    Path(operator_id): Path<String>,
) -> ApiResult<Json<AclBody>> {
    let operator = operator_from_path(&operator_id)?;
    let entries = state.access_control.get_operator_acl(&operator).await?;
    Ok(Json(AclBody { entries }))
}

async fn set_operator_acl(
    State(state): State<Arc<AppState>>,
    Path(operator_id): Path<String>,
    Json(body): Json<AclBody>,
) -> ApiResult<StatusCode> {
    let operator = operator_from_path(&operator_id)?;
    state.access_control.set_operator(&operator, body.entries).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_operator_acl(
    State(state): State<Arc<AppState>>,
    Path(operator_id): Path<String>,
    Json(body): Json<AclBody>,
) -> ApiResult<StatusCode> {
    let operator = operator_from_path(&operator_id)?;
    state
        .access_control
        .update_operator(&operator, body.entries)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_operator_acl(
    State(state): State<Arc<AppState>>,
    Path(operator_id): Path<String>,
) -> ApiResult<StatusCode> {
    let operator = operator_from_path(&operator_id)?;
    state.access_control.delete_operator(&operator).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn find_operator_certificates(
    State(state): State<Arc<AppState>>,
    Path(operator_id): Path<String>,
) -> ApiResult<Json<SerialList>> {
    let operator = operator_from_path(&operator_id)?;
    Ok(Json(SerialList {
        serial_numbers: state.certifier.find_certificates(&operator).await?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_error_statuses() {
        let cases = [
            (AuthorityError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (AuthorityError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AuthorityError::AlreadyExists("x".into()), StatusCode::CONFLICT),
            (AuthorityError::ServiceUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AuthorityError::Corrupted("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = ApiError::from(AuthorityError::Corrupted("ACL stored under 'x'".into()));
        assert_eq!(err.message, "internal error");
    }

    #[test]
    fn test_base64_and_category_parsing() {
        assert!(decode_base64("csr", "!!!").is_err());
        assert_eq!(decode_base64("csr", " AQI= ").unwrap(), vec![1, 2]);
        assert_eq!(parse_category(None).unwrap(), CaCategory::default_category());
        assert_eq!(
            parse_category(Some("bad name")).unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
    }
}
