//! Operator HTTP handlers. Each is a thin translation to C7 (orchestrator)
//! or C3/C1 (stored configuration, read models) — no OCPP semantics live
//! here.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use super::dto::*;
use super::AppState;
use crate::orchestrator::TriggerMessageType;
use crate::support::DomainError;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ApiResponse::ok(
        "ok",
        json!({
            "connected_clients": state.bus.connected_clients().len(),
        }),
    )
}

pub async fn list_connected_clients(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let clients: Vec<String> = state.bus.connected_clients().into_iter().collect();
    ApiResponse::ok("connected clients", clients)
}

pub async fn get_charge_point(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Response {
    match state.store.get_charge_point(&client_id).await {
        Ok(Some(cp)) => ApiResponse::ok("charge point", cp).into_response(),
        Ok(None) => ApiResponse::<()>::error(StatusCode::NOT_FOUND, "charge point not found"),
        Err(e) => domain_error_response(&DomainError::Internal(e.to_string())),
    }
}

pub async fn charge_point_status(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Response {
    match state.store.get_charge_point(&client_id).await {
        Ok(Some(cp)) => ApiResponse::ok("status", json!({ "online": cp.online })).into_response(),
        Ok(None) => ApiResponse::<()>::error(StatusCode::NOT_FOUND, "charge point not found"),
        Err(e) => domain_error_response(&DomainError::Internal(e.to_string())),
    }
}

pub async fn list_connectors(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Response {
    let cp = match state.store.get_charge_point(&client_id).await {
        Ok(Some(cp)) => cp,
        Ok(None) => return ApiResponse::<()>::error(StatusCode::NOT_FOUND, "charge point not found"),
        Err(e) => return domain_error_response(&DomainError::Internal(e.to_string())),
    };

    let mut connectors = Vec::new();
    for id in cp.known_connector_ids {
        if let Ok(Some(connector)) = state.store.get_connector(&client_id, id).await {
            connectors.push(connector);
        }
    }
    ApiResponse::ok("connectors", connectors).into_response()
}

pub async fn get_connector(
    State(state): State<Arc<AppState>>,
    Path((client_id, connector_id)): Path<(String, u32)>,
) -> Response {
    match state.store.get_connector(&client_id, connector_id).await {
        Ok(Some(connector)) => ApiResponse::ok("connector", connector).into_response(),
        Ok(None) => ApiResponse::<()>::error(StatusCode::NOT_FOUND, "connector not found"),
        Err(e) => domain_error_response(&DomainError::Internal(e.to_string())),
    }
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TransactionQuery>,
) -> Response {
    let Some(client_id) = query.charge_point_id else {
        return domain_error_response(&DomainError::Validation("chargePointId query parameter is required".into()));
    };

    let ids = match state.store.transaction_ids_for_client(&client_id).await {
        Ok(ids) => ids,
        Err(e) => return domain_error_response(&DomainError::Internal(e.to_string())),
    };

    let mut transactions = Vec::new();
    for id in ids {
        if let Ok(Some(tx)) = state.store.get_transaction(id).await {
            if query.active.map(|active| tx.is_active() == active).unwrap_or(true) {
                transactions.push(tx);
            }
        }
    }
    ApiResponse::ok("transactions", transactions).into_response()
}

pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<i64>,
) -> Response {
    match state.store.get_transaction(transaction_id).await {
        Ok(Some(tx)) => ApiResponse::ok("transaction", tx).into_response(),
        Ok(None) => ApiResponse::<()>::error(StatusCode::NOT_FOUND, "transaction not found"),
        Err(e) => domain_error_response(&DomainError::Internal(e.to_string())),
    }
}

pub async fn remote_start(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Json(req): Json<RemoteStartRequest>,
) -> Response {
    match state
        .orchestrator
        .remote_start_transaction(&client_id, &req.id_tag, req.connector_id)
        .await
    {
        Ok(issued) => outcome_response(issued.await_result().await),
        Err(e) => domain_error_response(&e),
    }
}

pub async fn remote_stop(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Json(req): Json<RemoteStopRequest>,
) -> Response {
    match state
        .orchestrator
        .remote_stop_transaction(&client_id, req.transaction_id)
        .await
    {
        Ok(issued) => outcome_response(issued.await_result().await),
        Err(e) => domain_error_response(&e),
    }
}

pub async fn trigger_message(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Json(req): Json<TriggerMessageRequest>,
) -> Response {
    let message = match req.requested_message.as_str() {
        "StatusNotification" => TriggerMessageType::StatusNotification,
        "Heartbeat" => TriggerMessageType::Heartbeat,
        "MeterValues" => TriggerMessageType::MeterValues,
        "BootNotification" => TriggerMessageType::BootNotification,
        other => {
            return domain_error_response(&DomainError::Validation(format!(
                "unsupported trigger message: {other}"
            )))
        }
    };

    match state
        .orchestrator
        .trigger_message(&client_id, message, req.connector_id)
        .await
    {
        Ok(issued) => outcome_response(issued.await_result().await),
        Err(e) => domain_error_response(&e),
    }
}

pub async fn get_stored_configuration(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(query): Query<ConfigurationQuery>,
) -> Response {
    match state.config.get(&client_id, &query.keys()).await {
        Ok((found, unknown)) => {
            ApiResponse::ok("stored configuration", json!({ "values": found, "unknown": unknown })).into_response()
        }
        Err(e) => domain_error_response(&DomainError::Internal(e.to_string())),
    }
}

pub async fn change_stored_configuration(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Json(req): Json<ChangeConfigurationRequest>,
) -> Response {
    match state.config.change(&client_id, &req.key, &req.value).await {
        Ok(result) => ApiResponse::ok("configuration changed", json!({ "status": format!("{result:?}") })).into_response(),
        Err(e) => domain_error_response(&DomainError::Internal(e.to_string())),
    }
}

pub async fn get_live_configuration(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(query): Query<ConfigurationQuery>,
) -> Response {
    match state.orchestrator.get_configuration_live(&client_id, query.keys()).await {
        Ok(issued) => outcome_response(issued.await_result().await),
        Err(e) => domain_error_response(&e),
    }
}

pub async fn change_live_configuration(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Json(req): Json<ChangeConfigurationRequest>,
) -> Response {
    match state
        .orchestrator
        .change_configuration_live(&client_id, &req.key, &req.value)
        .await
    {
        Ok(issued) => outcome_response(issued.await_result().await),
        Err(e) => domain_error_response(&e),
    }
}
