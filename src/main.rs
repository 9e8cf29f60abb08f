//! Composition root. Wires the state store, bus, configuration registry,
//! correlator, transaction service, dispatcher, orchestrator and HTTP
//! façade together, then runs the inbound dispatch loop, the correlation
//! sweeper and the API server concurrently until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ocpp_processor::bus::InMemoryBus;
use ocpp_processor::config::{default_config_path, AppConfig};
use ocpp_processor::config_registry::ConfigurationRegistry;
use ocpp_processor::correlation::{spawn_sweeper, CorrelationRegistrar};
use ocpp_processor::dispatcher::Dispatcher;
use ocpp_processor::domain::AlwaysAccept;
use ocpp_processor::http::{create_api_router, AppState};
use ocpp_processor::orchestrator::Orchestrator;
use ocpp_processor::state_store::InMemoryStateStore;
use ocpp_processor::support::{listen_for_shutdown_signals, ShutdownSignal};
use ocpp_processor::transactions::TransactionService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = default_config_path();
    let config = AppConfig::load(&config_path)?;
    info!(path = %config_path.display(), "loaded configuration");

    PrometheusBuilder::new()
        .install()
        .map_err(|e| format!("failed to install prometheus recorder: {e}"))?;

    let state_store: Arc<dyn ocpp_processor::state_store::StateStore> = Arc::new(InMemoryStateStore::new());
    let (bus, inbound_rx) = InMemoryBus::new();
    let bus: Arc<dyn ocpp_processor::bus::MessageBus> = Arc::new(bus);

    let config_registry = Arc::new(ConfigurationRegistry::new(state_store.clone()));
    let correlation = Arc::new(CorrelationRegistrar::new(config.operation_timeout()));
    let transactions = Arc::new(TransactionService::new(state_store.clone()));

    let shutdown = ShutdownSignal::new();
    let sweeper_handle = spawn_sweeper(correlation.clone(), config.sweeper_interval(), shutdown.clone());

    let dispatcher = Arc::new(Dispatcher::new(
        bus.clone(),
        state_store.clone(),
        transactions.clone(),
        config_registry.clone(),
        Arc::new(AlwaysAccept),
        correlation.clone(),
    ));
    let dispatcher_handle = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.run(inbound_rx).await })
    };

    let orchestrator = Arc::new(Orchestrator::new(bus.clone(), correlation.clone()));

    let app_state = Arc::new(AppState {
        store: state_store.clone(),
        bus: bus.clone(),
        config: config_registry.clone(),
        orchestrator,
    });
    let router = create_api_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.api_host, config.server.api_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP façade listening");

    let shutdown_for_signals = shutdown.clone();
    tokio::spawn(listen_for_shutdown_signals(shutdown_for_signals));

    let shutdown_for_server = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown_for_server.wait().await })
        .await?;

    shutdown.trigger();
    sweeper_handle.abort();
    dispatcher_handle.abort();

    info!("shutdown complete");
    Ok(())
}
