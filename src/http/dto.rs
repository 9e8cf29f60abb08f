//! HTTP-facing DTOs. Never leak internal OCPP payload types here — this
//! is a thin projection layer, kept deliberately separate from the wire
//! shapes in `dispatcher::payloads`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::correlation::Outcome;
use crate::support::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                message: message.into(),
                data: Some(data),
            }),
        )
    }
}

impl ApiResponse<()> {
    pub fn error(status: StatusCode, message: impl Into<String>) -> Response {
        (
            status,
            Json(Self {
                success: false,
                message: message.into(),
                data: None,
            }),
        )
            .into_response()
    }
}

/// Maps a domain error onto the HTTP status table from the external
/// interfaces contract (400 validation, 404 unknown, 408 timeout, 503
/// offline/dispatch failure, 500 internal).
pub fn domain_error_response(err: &DomainError) -> Response {
    let status = match err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Timeout => StatusCode::REQUEST_TIMEOUT,
        DomainError::Offline(_) | DomainError::DispatchFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Rejected(_) | DomainError::OcppError { .. } => StatusCode::OK,
        DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiResponse::<()>::error(status, err.to_string())
}

/// Translates an awaited outbound-operation outcome into an HTTP response,
/// per the façade contract: on delivery, return the outcome; on deadline,
/// return a timeout result without cancelling (a late response is logged
/// and dropped by the correlator).
pub fn outcome_response(outcome: Outcome) -> Response {
    match outcome {
        Ok(payload) => ApiResponse::ok("operation completed", payload).into_response(),
        Err(e) => domain_error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoteStartRequest {
    pub id_tag: String,
    #[serde(default)]
    pub connector_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteStopRequest {
    pub transaction_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TriggerMessageRequest {
    pub requested_message: String,
    #[serde(default)]
    pub connector_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeConfigurationRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ConfigurationQuery {
    #[serde(default)]
    pub key: Option<String>,
}

impl ConfigurationQuery {
    pub fn keys(&self) -> Vec<String> {
        self.key
            .as_deref()
            .map(|csv| csv.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct TransactionQuery {
    #[serde(default)]
    pub charge_point_id: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}
