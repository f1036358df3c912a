//! HTTP surface for the lifecycle service.
//!
//! Routes, mounted under `/v1/ca`:
//!   GET  /v1/ca/root                 root certificate PEM (public, no auth)
//!   GET  /v1/ca/health               engine probe plus inventory counts
//!   POST /v1/ca/issue                issue a certificate
//!   POST /v1/ca/revoke               revoke the active certificate for a CN
//!   GET  /v1/ca/inventory            list records (`?status=active|revoked|all`)
//!   GET  /v1/ca/inventory/expiring   active records due within `?within=168h`
//!
//! Failures are a JSON envelope `{"error": <code>, "message": ...}`
//! with the status from [`ErrorCode::http_status`].

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use warden_common::error::ErrorCode;

use crate::error::CaError;
use crate::inventory::StatusFilter;
use crate::protocol::{
    ErrorBody, HealthResponse, InventoryResponse, IssueRequest, RevokeRequest,
};
use crate::service::CaService;

/// Default window for `/inventory/expiring` (7 days).
const DEFAULT_EXPIRY_WINDOW: Duration = Duration::from_secs(7 * 24 * 3600);

pub fn router(service: Arc<CaService>) -> Router {
    let routes = Router::new()
        .route("/root", get(root_certificate))
        .route("/health", get(health))
        .route("/issue", post(issue))
        .route("/revoke", post(revoke))
        .route("/inventory", get(list_inventory))
        .route("/inventory/expiring", get(list_expiring))
        .with_state(service);
    Router::new().nest("/v1/ca", routes)
}

fn error_response(err: &CaError) -> Response {
    let code = ErrorCode::from(err);
    let status = StatusCode::from_u16(code.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorBody {
        error: code,
        message: err.to_string(),
    };
    (status, Json(body)).into_response()
}

async fn root_certificate(State(service): State<Arc<CaService>>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/x-pem-file")],
        service.root_certificate_pem(),
    )
        .into_response()
}

async fn health(State(service): State<Arc<CaService>>) -> Response {
    let health = service.health();
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        status: if health.healthy { "ok" } else { "degraded" }.to_string(),
        active_certificates: health.active_certificates,
        root_fingerprint: health.root_fingerprint,
        detail: health.detail,
    };
    (status, Json(body)).into_response()
}

async fn issue(
    State(service): State<Arc<CaService>>,
    Json(req): Json<IssueRequest>,
) -> Response {
    match service.issue(req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn revoke(
    State(service): State<Arc<CaService>>,
    Json(req): Json<RevokeRequest>,
) -> Response {
    match service.revoke(req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

async fn list_inventory(
    State(service): State<Arc<CaService>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let filter = match query.status.as_deref().map(StatusFilter::parse) {
        Some(Ok(filter)) => filter,
        Some(Err(err)) => return error_response(&err),
        None => StatusFilter::default(),
    };
    let body = InventoryResponse {
        certificates: service.list(filter),
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
struct ExpiringQuery {
    within: Option<String>,
}

async fn list_expiring(
    State(service): State<Arc<CaService>>,
    Query(query): Query<ExpiringQuery>,
) -> Response {
    let window = match query.within.as_deref() {
        Some(raw) => match humantime::parse_duration(raw) {
            Ok(window) => window,
            Err(e) => {
                return error_response(&CaError::Validation(format!(
                    "invalid expiry window {raw:?}: {e}"
                )))
            }
        },
        None => DEFAULT_EXPIRY_WINDOW,
    };
    match service.expiring(window) {
        Ok(certificates) => {
            (StatusCode::OK, Json(InventoryResponse { certificates })).into_response()
        }
        Err(err) => error_response(&err),
    }
}
