//! Channel-backed reference bus. Stands in for a real broker: a "client"
//! is anything holding the receiver half returned by [`InMemoryBus::connect`].

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{InboundEvent, MessageBus, OutboundFrame};
use crate::support::DomainError;

pub struct InMemoryBus {
    connections: DashMap<String, mpsc::UnboundedSender<OutboundFrame>>,
    inbound_tx: mpsc::UnboundedSender<InboundEvent>,
    message_counter: AtomicU64,
}

impl InMemoryBus {
    /// Returns the bus plus the receiving end of the inbound event stream,
    /// which the dispatcher owns and drains in its run loop.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                connections: DashMap::new(),
                inbound_tx,
                message_counter: AtomicU64::new(0),
            },
            inbound_rx,
        )
    }

    /// Registers a charge point session, returning the receiver it should
    /// poll for outbound frames. Emits `ClientConnected`.
    pub fn connect(&self, client_id: impl Into<String>) -> mpsc::UnboundedReceiver<OutboundFrame> {
        let client_id = client_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(client_id.clone(), tx);
        metrics::gauge!("ocpp_connected_charge_points").set(self.connections.len() as f64);
        let _ = self.inbound_tx.send(InboundEvent::ClientConnected { client_id });
        rx
    }

    /// Tears down a session. Emits `ClientDisconnected`.
    pub fn disconnect(&self, client_id: &str) {
        self.connections.remove(client_id);
        metrics::gauge!("ocpp_connected_charge_points").set(self.connections.len() as f64);
        let _ = self.inbound_tx.send(InboundEvent::ClientDisconnected {
            client_id: client_id.to_string(),
        });
    }

    /// Feeds an inbound request, as if it arrived from `client_id` over
    /// the wire. Used by the acceptor collaborator and by tests.
    pub fn push_inbound_request(
        &self,
        client_id: impl Into<String>,
        request_id: impl Into<String>,
        action: impl Into<String>,
        payload: Value,
    ) {
        let _ = self.inbound_tx.send(InboundEvent::Request {
            client_id: client_id.into(),
            request_id: request_id.into(),
            action: action.into(),
            payload,
        });
    }

    pub fn push_inbound_response(
        &self,
        client_id: impl Into<String>,
        request_id: impl Into<String>,
        operation: impl Into<String>,
        payload: Value,
    ) {
        let _ = self.inbound_tx.send(InboundEvent::Response {
            client_id: client_id.into(),
            request_id: request_id.into(),
            operation: operation.into(),
            payload,
        });
    }

    pub fn push_inbound_error(
        &self,
        client_id: impl Into<String>,
        request_id: impl Into<String>,
        operation: impl Into<String>,
        error_code: impl Into<String>,
        error_description: impl Into<String>,
    ) {
        let _ = self.inbound_tx.send(InboundEvent::Error {
            client_id: client_id.into(),
            request_id: request_id.into(),
            operation: operation.into(),
            error_code: error_code.into(),
            error_description: error_description.into(),
        });
    }

    fn next_message_id(&self) -> String {
        let n = self.message_counter.fetch_add(1, Ordering::SeqCst);
        format!("CS-{n}")
    }

    /// Sends a reply frame back down a connected client's channel. Used by
    /// the dispatcher to answer inbound requests.
    pub fn reply(&self, client_id: &str, frame: OutboundFrame) -> Result<(), DomainError> {
        match self.connections.get(client_id) {
            Some(sender) => sender
                .send(frame)
                .map_err(|_| DomainError::Offline(client_id.to_string())),
            None => {
                warn!(charge_point_id = client_id, "reply to disconnected client dropped");
                Err(DomainError::Offline(client_id.to_string()))
            }
        }
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn send_request(
        &self,
        client_id: &str,
        operation: &str,
        payload: Value,
    ) -> Result<String, DomainError> {
        let sender = self
            .connections
            .get(client_id)
            .ok_or_else(|| DomainError::Offline(client_id.to_string()))?;

        let unique_id = self.next_message_id();
        debug!(charge_point_id = client_id, operation, unique_id, "sending outbound call");
        sender
            .send(OutboundFrame::Call {
                unique_id: unique_id.clone(),
                action: operation.to_string(),
                payload,
            })
            .map_err(|_| DomainError::DispatchFailed(format!("channel closed for {client_id}")))?;
        Ok(unique_id)
    }

    async fn reply_result(
        &self,
        client_id: &str,
        request_id: &str,
        payload: Value,
    ) -> Result<(), DomainError> {
        self.reply(
            client_id,
            OutboundFrame::CallResult {
                unique_id: request_id.to_string(),
                payload,
            },
        )
    }

    async fn reply_error(
        &self,
        client_id: &str,
        request_id: &str,
        error_code: &str,
        error_description: &str,
    ) -> Result<(), DomainError> {
        self.reply(
            client_id,
            OutboundFrame::CallError {
                unique_id: request_id.to_string(),
                error_code: error_code.to_string(),
                error_description: error_description.to_string(),
            },
        )
    }

    fn connected_clients(&self) -> HashSet<String> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_request_fails_when_not_connected() {
        let (bus, _rx) = InMemoryBus::new();
        let err = bus.send_request("CP01", "RemoteStartTransaction", json!({})).await;
        assert!(matches!(err, Err(DomainError::Offline(_))));
    }

    #[tokio::test]
    async fn connect_then_send_delivers_frame() {
        let (bus, _rx) = InMemoryBus::new();
        let mut outbound = bus.connect("CP01");
        let id = bus
            .send_request("CP01", "RemoteStartTransaction", json!({"idTag": "T"}))
            .await
            .unwrap();
        let frame = outbound.recv().await.unwrap();
        match frame {
            OutboundFrame::Call { unique_id, action, .. } => {
                assert_eq!(unique_id, id);
                assert_eq!(action, "RemoteStartTransaction");
            }
            _ => panic!("expected Call frame"),
        }
    }

    #[tokio::test]
    async fn disconnect_removes_from_connected_set() {
        let (bus, _rx) = InMemoryBus::new();
        let _outbound = bus.connect("CP01");
        assert!(bus.is_connected("CP01"));
        bus.disconnect("CP01");
        assert!(!bus.is_connected("CP01"));
    }
}
