//! # API Endpoint Handlers
//!
//! Resource handlers translate between HTTP and one engine call. The engine
//! is synchronous and shared, so calls run inline.

use super::{
    AppState,
    types::{ErrorResponse, HealthResponse},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::collections::BTreeMap;
use trellis_core::{Record, Status, TrellisError, Verb};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// RESOURCE HANDLERS
// =============================================================================

/// `GET /`
pub async fn root_handler(
    State(state): State<AppState>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Response {
    into_http(state.call(Verb::Get, "", query, Record::new()))
}

/// `GET /{path}`
pub async fn resource_get_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Response {
    into_http(state.call(Verb::Get, &path, query, Record::new()))
}

/// `POST /{path}` with a JSON object body. An empty body submits nothing.
pub async fn resource_post_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Response {
    let values = match parse_body(&body) {
        Ok(values) => values,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response();
        }
    };
    into_http(state.call(Verb::Post, &path, query, values))
}

/// Decode a submitted JSON object.
pub fn parse_body(body: &[u8]) -> Result<Record, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Record::new());
    }
    serde_json::from_slice::<Record>(body).map_err(|e| format!("Invalid JSON body: {}", e))
}

// =============================================================================
// STATUS MAPPING
// =============================================================================

/// Map a call result onto an HTTP response.
fn into_http(result: Result<trellis_core::Response, TrellisError>) -> Response {
    let response = match result {
        Ok(response) => response,
        Err(e) => return error_response(&e),
    };

    match response.status() {
        Status::Ok => {
            let document = response.into_document().unwrap_or_default();
            match document.etag() {
                Ok(etag) => (
                    StatusCode::OK,
                    [(header::ETAG, format!("\"{}\"", etag))],
                    Json(document),
                )
                    .into_response(),
                Err(e) => {
                    tracing::warn!("ETag computation failed: {}", e);
                    (StatusCode::OK, Json(document)).into_response()
                }
            }
        }
        Status::NoContent => StatusCode::NO_CONTENT.into_response(),
        Status::SeeOther => match response.location() {
            Some(location) => {
                (StatusCode::SEE_OTHER, [(header::LOCATION, location.to_string())]).into_response()
            }
            None => error_response(&TrellisError::Internal(
                "See Other response without a location".to_string(),
            )),
        },
    }
}

fn error_response(err: &TrellisError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %err, "resource call failed");
    } else {
        tracing::debug!(error = %err, "resource call rejected");
    }
    (status, Json(ErrorResponse::from(err))).into_response()
}

// =============================================================================
// TESTS
// =============================================================================
