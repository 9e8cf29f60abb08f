//! Message Bus Interface: the transport contract linking WebSocket
//! acceptors with processor instances. Preserves per-client FIFO delivery
//! and exposes a connected-client snapshot. The real broker sits behind
//! this trait in production; [`memory::InMemoryBus`] is a channel-backed
//! reference implementation used for standalone runs and tests.

mod memory;

pub use memory::InMemoryBus;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;

use crate::support::DomainError;

/// An outbound OCPP-J frame as handed to whatever performs the actual
/// framing/send. `unique_id` is the wire-level request id assigned by the
/// bus, not the correlator's own correlation key.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Call {
        unique_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        unique_id: String,
        payload: Value,
    },
    CallError {
        unique_id: String,
        error_code: String,
        error_description: String,
    },
}

/// An inbound event the bus delivers to the dispatcher/correlator.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Request {
        client_id: String,
        request_id: String,
        action: String,
        payload: Value,
    },
    Response {
        client_id: String,
        request_id: String,
        /// The operation this response is assumed to correlate with, as
        /// known by the acceptor (wire CallResult frames carry no action).
        operation: String,
        payload: Value,
    },
    Error {
        client_id: String,
        request_id: String,
        operation: String,
        error_code: String,
        error_description: String,
    },
    ClientConnected {
        client_id: String,
    },
    ClientDisconnected {
        client_id: String,
    },
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Enqueues an outbound request, returning the wire-level message id
    /// the bus assigned it. Fails if the client is not connected.
    async fn send_request(
        &self,
        client_id: &str,
        operation: &str,
        payload: Value,
    ) -> Result<String, DomainError>;

    /// Answers an inbound request with a CallResult, echoing `request_id`.
    async fn reply_result(
        &self,
        client_id: &str,
        request_id: &str,
        payload: Value,
    ) -> Result<(), DomainError>;

    /// Answers an inbound request with a CallError, echoing `request_id`.
    async fn reply_error(
        &self,
        client_id: &str,
        request_id: &str,
        error_code: &str,
        error_description: &str,
    ) -> Result<(), DomainError>;

    fn connected_clients(&self) -> HashSet<String>;

    fn is_connected(&self, client_id: &str) -> bool {
        self.connected_clients().contains(client_id)
    }
}
