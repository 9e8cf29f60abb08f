//! Inbound Protocol Dispatcher: routes a decoded inbound request to the
//! correct handler and emits a confirmation or an OCPP error. Dispatch is
//! a total match over [`InboundRequest`] — there is no reflection, no
//! catch-all branch that silently swallows an unrecognized payload shape.

mod payloads;

pub use payloads::*;

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::bus::{InboundEvent, MessageBus};
use crate::config_registry::{ChangeResult, ConfigurationRegistry};
use crate::correlation::CorrelationRegistrar;
use crate::domain::{AuthorizationStatus, Authorizer};
use crate::state_store::StateStore;
use crate::transactions::TransactionService;

pub struct Dispatcher {
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn StateStore>,
    transactions: Arc<TransactionService>,
    config: Arc<ConfigurationRegistry>,
    authorizer: Arc<dyn Authorizer>,
    correlation: Arc<CorrelationRegistrar>,
}

impl Dispatcher {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn StateStore>,
        transactions: Arc<TransactionService>,
        config: Arc<ConfigurationRegistry>,
        authorizer: Arc<dyn Authorizer>,
        correlation: Arc<CorrelationRegistrar>,
    ) -> Self {
        Self {
            bus,
            store,
            transactions,
            config,
            authorizer,
            correlation,
        }
    }

    /// Drains the bus's inbound event stream until it closes (normally on
    /// shutdown, once every sender side is dropped).
    pub async fn run(&self, mut inbound: tokio::sync::mpsc::UnboundedReceiver<InboundEvent>) {
        while let Some(event) = inbound.recv().await {
            self.handle_event(event).await;
        }
    }

    async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::Request {
                client_id,
                request_id,
                action,
                payload,
            } => self.handle_request(&client_id, &request_id, &action, payload).await,
            InboundEvent::Response {
                client_id,
                request_id: _,
                operation,
                payload,
            } => {
                // The wire request id visible here is assigned by the bus
                // and is not the issuer's correlation key; match by the
                // oldest open exchange for (client, operation) instead.
                self.correlation.deliver_first_by(&client_id, &operation, Ok(payload));
            }
            InboundEvent::Error {
                client_id,
                request_id: _,
                operation,
                error_code,
                error_description,
            } => {
                self.correlation.deliver_first_by(
                    &client_id,
                    &operation,
                    Err(crate::support::DomainError::OcppError {
                        code: error_code,
                        description: error_description,
                    }),
                );
            }
            InboundEvent::ClientConnected { client_id } => {
                info!(charge_point_id = client_id, "charge point connected");
            }
            InboundEvent::ClientDisconnected { client_id } => {
                info!(charge_point_id = client_id, "charge point disconnected");
                if let Ok(Some(mut cp)) = self.store.get_charge_point(&client_id).await {
                    cp.set_offline();
                    let _ = self.store.put_charge_point(&cp).await;
                }
            }
        }
    }

    async fn handle_request(&self, client_id: &str, request_id: &str, action: &str, payload: Value) {
        if let Ok(Some(mut cp)) = self.store.get_charge_point(client_id).await {
            cp.touch(Utc::now());
            let _ = self.store.put_charge_point(&cp).await;
        }

        let parsed = parse_inbound(action, payload);
        let outcome = match parsed {
            Ok(request) => self.dispatch(client_id, request).await,
            Err(_) => {
                warn!(charge_point_id = client_id, action, "unsupported or malformed inbound action");
                let _ = self
                    .bus
                    .reply_error(client_id, request_id, "NotSupported", "unrecognized action")
                    .await;
                return;
            }
        };

        match outcome {
            Ok(confirmation) => {
                let _ = self.bus.reply_result(client_id, request_id, confirmation).await;
            }
            Err(e) => {
                let _ = self
                    .bus
                    .reply_error(client_id, request_id, "InternalError", &e.to_string())
                    .await;
            }
        }
    }

    async fn dispatch(
        &self,
        client_id: &str,
        request: InboundRequest,
    ) -> Result<Value, crate::support::DomainError> {
        match request {
            InboundRequest::BootNotification(req) => {
                let cp = crate::domain::ChargePointInfo::boot(client_id, req.charge_point_vendor, req.charge_point_model);
                self.store
                    .put_charge_point(&cp)
                    .await
                    .map_err(|e| crate::support::DomainError::Internal(e.to_string()))?;

                let (interval_cfg, _) = self.config.get(client_id, &["HeartbeatInterval".to_string()]).await.map_err(|e| {
                    crate::support::DomainError::Internal(e.to_string())
                })?;
                let interval: i64 = interval_cfg
                    .get("HeartbeatInterval")
                    .and_then(|v| v.value.parse().ok())
                    .unwrap_or(300);

                Ok(json!({
                    "status": "Accepted",
                    "currentTime": Utc::now().to_rfc3339(),
                    "interval": interval,
                }))
            }

            InboundRequest::Heartbeat => Ok(json!({ "currentTime": Utc::now().to_rfc3339() })),

            InboundRequest::StatusNotification(req) => {
                let status = req.status.parse().map_err(crate::support::DomainError::Validation)?;
                self.transactions
                    .update_status(client_id, req.connector_id, status, req.error_code)
                    .await;
                Ok(json!({}))
            }

            InboundRequest::StartTransaction(req) => {
                let auth = self.authorizer.authorize(client_id, &req.id_tag).await;
                let tx = self
                    .transactions
                    .start_transaction(client_id, req.connector_id, &req.id_tag, req.meter_start, req.timestamp)
                    .await?;
                Ok(json!({
                    "transactionId": tx.id,
                    "idTagInfo": { "status": auth.as_ocpp_str() },
                }))
            }

            InboundRequest::StopTransaction(req) => {
                self.transactions
                    .stop_transaction(req.transaction_id, req.meter_stop, req.reason, req.timestamp)
                    .await;
                Ok(json!({ "idTagInfo": { "status": AuthorizationStatus::Accepted.as_ocpp_str() } }))
            }

            InboundRequest::MeterValues(req) => {
                if let Some(reading) = req.latest_energy_register_reading() {
                    self.transactions.apply_meter_reading(req.transaction_id, reading).await;
                }
                Ok(json!({}))
            }

            InboundRequest::GetConfiguration(req) => {
                let (found, unknown) = self
                    .config
                    .get(client_id, &req.key.unwrap_or_default())
                    .await
                    .map_err(|e| crate::support::DomainError::Internal(e.to_string()))?;

                let configuration_key: Vec<Value> = found
                    .into_iter()
                    .map(|(key, v)| json!({ "key": key, "readonly": v.read_only, "value": v.value }))
                    .collect();

                Ok(json!({ "configurationKey": configuration_key, "unknownKey": unknown }))
            }

            InboundRequest::ChangeConfiguration(req) => {
                let result = self
                    .config
                    .change(client_id, &req.key, &req.value)
                    .await
                    .map_err(|e| crate::support::DomainError::Internal(e.to_string()))?;

                let status = match result {
                    ChangeResult::Accepted => "Accepted",
                    ChangeResult::Rejected => "Rejected",
                    ChangeResult::RebootRequired => "RebootRequired",
                    ChangeResult::NotSupported => "NotSupported",
                };
                Ok(json!({ "status": status }))
            }

            InboundRequest::Authorize(req) => {
                let status = self.authorizer.authorize(client_id, &req.id_tag).await;
                Ok(json!({ "idTagInfo": { "status": status.as_ocpp_str() } }))
            }

            InboundRequest::DiagnosticsStatusNotification | InboundRequest::FirmwareStatusNotification => {
                Ok(json!({}))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::config_registry::ConfigurationRegistry;
    use crate::domain::AlwaysAccept;
    use crate::state_store::InMemoryStateStore;

    fn setup() -> (Arc<InMemoryBus>, Dispatcher) {
        let (bus, _rx) = InMemoryBus::new();
        let bus = Arc::new(bus);
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let transactions = Arc::new(TransactionService::new(store.clone()));
        let config = Arc::new(ConfigurationRegistry::new(store.clone()));
        let correlation = Arc::new(CorrelationRegistrar::new(std::time::Duration::from_secs(10)));
        let dispatcher = Dispatcher::new(
            bus.clone() as Arc<dyn MessageBus>,
            store,
            transactions,
            config,
            Arc::new(AlwaysAccept),
            correlation,
        );
        (bus, dispatcher)
    }

    #[tokio::test]
    async fn boot_notification_replies_accepted_with_interval() {
        let (_bus, dispatcher) = setup();
        let outcome = dispatcher
            .dispatch(
                "CP01",
                InboundRequest::BootNotification(BootNotificationPayload {
                    charge_point_vendor: "Acme".into(),
                    charge_point_model: "X1".into(),
                }),
            )
            .await
            .unwrap();
        assert_eq!(outcome["status"], "Accepted");
        assert_eq!(outcome["interval"], 300);
    }

    #[tokio::test]
    async fn start_then_stop_transaction_flow() {
        let (_bus, dispatcher) = setup();
        let start = dispatcher
            .dispatch(
                "CP01",
                InboundRequest::StartTransaction(StartTransactionPayload {
                    connector_id: 1,
                    id_tag: "TAG".into(),
                    meter_start: 1000,
                    timestamp: Utc::now(),
                }),
            )
            .await
            .unwrap();
        let tx_id = start["transactionId"].as_i64().unwrap();

        let stop = dispatcher
            .dispatch(
                "CP01",
                InboundRequest::StopTransaction(StopTransactionPayload {
                    transaction_id: tx_id,
                    meter_stop: 2000,
                    timestamp: Utc::now(),
                    reason: Some("Local".into()),
                }),
            )
            .await
            .unwrap();
        assert_eq!(stop["idTagInfo"]["status"], "Accepted");
    }

    #[tokio::test]
    async fn unsupported_action_does_not_panic_the_dispatcher() {
        assert!(parse_inbound("SomeVendorExtension", json!({})).is_err());
    }

    #[tokio::test]
    async fn change_then_get_configuration_round_trips() {
        let (_bus, dispatcher) = setup();
        let change = dispatcher
            .dispatch(
                "CP01",
                InboundRequest::ChangeConfiguration(ChangeConfigurationPayload {
                    key: "ResetRetries".into(),
                    value: "7".into(),
                }),
            )
            .await
            .unwrap();
        assert_eq!(change["status"], "Accepted");

        let get = dispatcher
            .dispatch(
                "CP01",
                InboundRequest::GetConfiguration(GetConfigurationPayload {
                    key: Some(vec!["ResetRetries".into()]),
                }),
            )
            .await
            .unwrap();
        let keys = get["configurationKey"].as_array().unwrap();
        assert_eq!(keys[0]["value"], "7");
    }
}
