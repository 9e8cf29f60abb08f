//! Outbound Operation Orchestrator: validates, checks connectivity, opens
//! a correlation exchange, and emits the outbound OCPP request. Every
//! operation follows the same shape: validate → check connectivity →
//! open → send → return the token for the caller to await.

use serde_json::json;
use std::sync::Arc;

use crate::bus::MessageBus;
use crate::correlation::{CorrelationRegistrar, Delivery, Outcome};
use crate::support::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMessageType {
    StatusNotification,
    Heartbeat,
    MeterValues,
    BootNotification,
}

impl TriggerMessageType {
    pub fn as_ocpp_str(&self) -> &'static str {
        match self {
            Self::StatusNotification => "StatusNotification",
            Self::Heartbeat => "Heartbeat",
            Self::MeterValues => "MeterValues",
            Self::BootNotification => "BootNotification",
        }
    }
}

/// A dispatched outbound operation, handed back to the caller (normally
/// the HTTP façade) to await with the operation's fixed deadline.
pub struct IssuedOperation {
    pub correlation_key: String,
    operation: &'static str,
    issued_at: std::time::Instant,
    delivery: Delivery,
}

impl IssuedOperation {
    pub async fn await_result(self) -> Outcome {
        let outcome = self.delivery.await_with_deadline().await;
        metrics::histogram!("ocpp_command_latency_seconds", "operation" => self.operation)
            .record(self.issued_at.elapsed().as_secs_f64());
        outcome
    }
}

pub struct Orchestrator {
    bus: Arc<dyn MessageBus>,
    correlation: Arc<CorrelationRegistrar>,
}

impl Orchestrator {
    pub fn new(bus: Arc<dyn MessageBus>, correlation: Arc<CorrelationRegistrar>) -> Self {
        Self { bus, correlation }
    }

    async fn issue(
        &self,
        client_id: &str,
        operation: &'static str,
        payload: serde_json::Value,
    ) -> Result<IssuedOperation, DomainError> {
        if !self.bus.is_connected(client_id) {
            return Err(DomainError::Offline(client_id.to_string()));
        }

        let (correlation_key, delivery) = self.correlation.open(client_id, operation);

        if let Err(e) = self.bus.send_request(client_id, operation, payload).await {
            self.correlation.cancel(&correlation_key);
            return Err(DomainError::DispatchFailed(e.to_string()));
        }

        Ok(IssuedOperation {
            correlation_key,
            operation,
            issued_at: std::time::Instant::now(),
            delivery,
        })
    }

    pub async fn remote_start_transaction(
        &self,
        client_id: &str,
        id_tag: &str,
        connector_id: Option<u32>,
    ) -> Result<IssuedOperation, DomainError> {
        if id_tag.is_empty() || id_tag.len() > 20 {
            return Err(DomainError::Validation("idTag must be 1-20 characters".into()));
        }

        let connector_id = connector_id.unwrap_or(1);
        self.issue(
            client_id,
            "RemoteStartTransaction",
            json!({ "idTag": id_tag, "connectorId": connector_id }),
        )
        .await
    }

    pub async fn remote_stop_transaction(
        &self,
        client_id: &str,
        transaction_id: i64,
    ) -> Result<IssuedOperation, DomainError> {
        if transaction_id <= 0 {
            return Err(DomainError::Validation("transactionId must be positive".into()));
        }

        self.issue(
            client_id,
            "RemoteStopTransaction",
            json!({ "transactionId": transaction_id }),
        )
        .await
    }

    pub async fn trigger_message(
        &self,
        client_id: &str,
        message: TriggerMessageType,
        connector_id: Option<i64>,
    ) -> Result<IssuedOperation, DomainError> {
        if let Some(id) = connector_id {
            if id < 0 {
                return Err(DomainError::Validation("connectorId must not be negative".into()));
            }
        }

        let mut payload = json!({ "requestedMessage": message.as_ocpp_str() });
        if let Some(id) = connector_id {
            payload["connectorId"] = json!(id);
        }

        self.issue(client_id, "TriggerMessage", payload).await
    }

    pub async fn get_configuration_live(
        &self,
        client_id: &str,
        keys: Vec<String>,
    ) -> Result<IssuedOperation, DomainError> {
        self.issue(client_id, "GetConfiguration", json!({ "key": keys })).await
    }

    pub async fn change_configuration_live(
        &self,
        client_id: &str,
        key: &str,
        value: &str,
    ) -> Result<IssuedOperation, DomainError> {
        self.issue(
            client_id,
            "ChangeConfiguration",
            json!({ "key": key, "value": value }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;

    fn setup() -> (Arc<InMemoryBus>, Orchestrator) {
        let (bus, _rx) = InMemoryBus::new();
        let bus = Arc::new(bus);
        let correlation = Arc::new(CorrelationRegistrar::new(std::time::Duration::from_secs(10)));
        let orchestrator = Orchestrator::new(bus.clone() as Arc<dyn MessageBus>, correlation);
        (bus, orchestrator)
    }

    #[tokio::test]
    async fn remote_start_fails_validation_without_bus_traffic() {
        let (bus, orchestrator) = setup();
        let _outbound = bus.connect("CP01");
        let err = orchestrator.remote_start_transaction("CP01", "", None).await;
        assert!(matches!(err, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn remote_start_offline_is_rejected_without_opening_an_exchange() {
        let (_bus, orchestrator) = setup();
        let err = orchestrator.remote_start_transaction("CP99", "TAG", None).await;
        assert!(matches!(err, Err(DomainError::Offline(_))));
    }

    #[tokio::test]
    async fn remote_start_issues_a_request_carrying_the_given_connector() {
        let (bus, orchestrator) = setup();
        let mut outbound = bus.connect("CP01");
        let issued = orchestrator.remote_start_transaction("CP01", "TAG", Some(2)).await.unwrap();

        let frame = outbound.recv().await.unwrap();
        match frame {
            crate::bus::OutboundFrame::Call { action, payload, .. } => {
                assert_eq!(action, "RemoteStartTransaction");
                assert_eq!(payload["connectorId"], 2);
            }
            _ => panic!("expected a Call frame"),
        }

        assert!(!issued.correlation_key.is_empty());
    }

    #[tokio::test]
    async fn unanswered_operation_times_out() {
        let (bus, _orchestrator) = setup();
        let _outbound = bus.connect("CP01");
        let correlation = Arc::new(CorrelationRegistrar::new(std::time::Duration::from_millis(5)));
        let orchestrator = Orchestrator::new(bus.clone() as Arc<dyn MessageBus>, correlation);

        let issued = orchestrator.remote_stop_transaction("CP01", 1000).await.unwrap();
        let outcome = issued.await_result().await;
        assert!(matches!(outcome, Err(DomainError::Timeout)));
    }

    #[tokio::test]
    async fn trigger_message_rejects_negative_connector_id() {
        let (bus, orchestrator) = setup();
        let _outbound = bus.connect("CP01");
        let err = orchestrator
            .trigger_message("CP01", TriggerMessageType::Heartbeat, Some(-1))
            .await;
        assert!(matches!(err, Err(DomainError::Validation(_))));
    }
}
