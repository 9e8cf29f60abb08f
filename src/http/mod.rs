//! HTTP Façade Contract: a stateless translation between operator
//! operations and the orchestrator/configuration registry/read models.

pub mod dto;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::bus::MessageBus;
use crate::config_registry::ConfigurationRegistry;
use crate::orchestrator::Orchestrator;
use crate::state_store::StateStore;

pub struct AppState {
    pub store: Arc<dyn StateStore>,
    pub bus: Arc<dyn MessageBus>,
    pub config: Arc<ConfigurationRegistry>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/charge-points", get(handlers::list_connected_clients))
        .route("/charge-points/{id}", get(handlers::get_charge_point))
        .route("/charge-points/{id}/status", get(handlers::charge_point_status))
        .route("/charge-points/{id}/connectors", get(handlers::list_connectors))
        .route(
            "/charge-points/{id}/connectors/{connector_id}",
            get(handlers::get_connector),
        )
        .route("/transactions", get(handlers::list_transactions))
        .route("/transactions/{id}", get(handlers::get_transaction))
        .route("/charge-points/{id}/remote-start", post(handlers::remote_start))
        .route("/charge-points/{id}/remote-stop", post(handlers::remote_stop))
        .route("/charge-points/{id}/trigger-message", post(handlers::trigger_message))
        .route(
            "/charge-points/{id}/configuration",
            get(handlers::get_stored_configuration).put(handlers::change_stored_configuration),
        )
        .route(
            "/charge-points/{id}/configuration/live",
            get(handlers::get_live_configuration).put(handlers::change_live_configuration),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
