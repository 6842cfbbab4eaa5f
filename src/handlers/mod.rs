//! # API Handlers
//!
//! Demo controllers whose only purpose is to raise each kind of fault, plus the
//! service information and OpenAPI endpoints.

use axum::{
    http::{StatusCode, Uri},
    response::Json,
};
use utoipa::OpenApi;

use crate::error::Fault;
use crate::models::ServiceInfo;
use crate::server::ApiDoc;

pub mod exception;
pub mod security;
pub mod validation;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// OpenAPI document describing the demo routes and the error record
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Fallback for unmatched routes
pub async fn fallback(uri: Uri) -> Fault {
    tracing::debug!(path = %uri.path(), "No route matched");
    Fault::declared(StatusCode::NOT_FOUND, "No message available")
}
