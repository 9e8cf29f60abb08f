//! Correlation Registrar: bridges a synchronous operator call with the
//! eventual, asynchronous OCPP response from a charge point.
//!
//! An exchange is opened before the outbound request is sent and resolved
//! exactly once: by a matching inbound response/error, by the caller
//! cancelling before send, or by the sweeper on deadline. PendingExchange
//! state lives only in the instance that opened it — it is never written
//! to the state store.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::support::DomainError;

pub type Outcome = Result<Value, DomainError>;

pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

struct PendingExchange {
    client_id: String,
    operation: String,
    created_at: Instant,
    deadline: Instant,
    sender: oneshot::Sender<Outcome>,
}

/// A single-slot rendezvous a caller awaits with a deadline.
pub struct Delivery {
    receiver: oneshot::Receiver<Outcome>,
    deadline: Instant,
}

impl Delivery {
    pub async fn await_with_deadline(self) -> Outcome {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, self.receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(DomainError::Internal("delivery channel dropped".into())),
            Err(_) => Err(DomainError::Timeout),
        }
    }
}

pub struct CorrelationRegistrar {
    pending: DashMap<String, PendingExchange>,
    issue_counter: AtomicU64,
    operation_timeout: Duration,
}

impl CorrelationRegistrar {
    pub fn new(operation_timeout: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            issue_counter: AtomicU64::new(0),
            operation_timeout,
        }
    }

    /// Opens a new exchange for `(client_id, operation)`, returning the
    /// correlation key and the delivery token the caller should await.
    /// Also lazily sweeps expired exchanges to bound map growth.
    pub fn open(&self, client_id: &str, operation: &str) -> (String, Delivery) {
        self.sweep_expired();

        let issue_id = self.issue_counter.fetch_add(1, Ordering::SeqCst);
        let key = format!("{client_id}:{operation}:{issue_id}");
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        let deadline = now + self.operation_timeout;

        self.pending.insert(
            key.clone(),
            PendingExchange {
                client_id: client_id.to_string(),
                operation: operation.to_string(),
                created_at: now,
                deadline,
                sender: tx,
            },
        );

        (key, Delivery { receiver: rx, deadline })
    }

    /// Resolves the exchange at `correlation_key` exactly once. A missing
    /// or already-closed exchange is not an error: the matching owner may
    /// have already timed out or cancelled.
    pub fn deliver(&self, correlation_key: &str, outcome: Outcome) -> bool {
        match self.pending.remove(correlation_key) {
            Some((_, exchange)) => {
                let _ = exchange.sender.send(outcome);
                true
            }
            None => {
                debug!(correlation_key, "delivery for unknown or already-closed exchange dropped");
                false
            }
        }
    }

    /// Resolves the oldest open exchange matching `(client_id, operation)`.
    /// Used when the inbound message cannot be matched to the exact wire
    /// request id the issuer used, because the bus assigns that id and it
    /// is not visible to the issuer at `open` time.
    pub fn deliver_first_by(&self, client_id: &str, operation: &str, outcome: Outcome) -> bool {
        let oldest = self
            .pending
            .iter()
            .filter(|entry| entry.client_id == client_id && entry.operation == operation)
            .min_by_key(|entry| entry.created_at)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => self.deliver(&key, outcome),
            None => {
                debug!(charge_point_id = client_id, operation, "no pending exchange to match inbound message");
                false
            }
        }
    }

    /// Closes the exchange without delivering anything, used by the owner
    /// when submission to the bus failed before the charge point ever saw
    /// the request.
    pub fn cancel(&self, correlation_key: &str) {
        self.pending.remove(correlation_key);
    }

    /// Closes every exchange past its deadline. Returns how many were
    /// swept. Safe to call concurrently with `deliver`: removal is a
    /// single atomic map operation per key.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| entry.key().clone())
            .collect();

        let mut swept = 0;
        for key in expired {
            if let Some((_, exchange)) = self.pending.remove(&key) {
                let _ = exchange.sender.send(Err(DomainError::Timeout));
                swept += 1;
            }
        }
        if swept > 0 {
            warn!(count = swept, "swept expired pending exchanges");
        }
        swept
    }

    pub fn open_count(&self) -> usize {
        self.pending.len()
    }
}

/// Spawns the periodic sweeper task, shaped the same way as the rest of
/// the crate's background loops: a `tokio::time::interval` racing the
/// shutdown signal inside `tokio::select!`.
pub fn spawn_sweeper(
    registrar: std::sync::Arc<CorrelationRegistrar>,
    interval: Duration,
    shutdown: crate::support::ShutdownSignal,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    registrar.sweep_expired();
                }
                _ = shutdown.wait() => {
                    debug!("correlation sweeper shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn deliver_resolves_the_awaiting_caller() {
        let registrar = CorrelationRegistrar::new(Duration::from_secs(10));
        let (key, delivery) = registrar.open("CP01", "RemoteStartTransaction");
        registrar.deliver(&key, Ok(json!({"status": "Accepted"})));
        let outcome = delivery.await_with_deadline().await;
        assert_eq!(outcome.unwrap()["status"], "Accepted");
    }

    #[tokio::test]
    async fn deliver_first_by_picks_oldest_match() {
        let registrar = CorrelationRegistrar::new(Duration::from_secs(10));
        let (_key_a, delivery_a) = registrar.open("CP01", "GetConfiguration");
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (_key_b, delivery_b) = registrar.open("CP01", "GetConfiguration");

        let delivered = registrar.deliver_first_by("CP01", "GetConfiguration", Ok(json!({"n": 1})));
        assert!(delivered);

        let a = delivery_a.await_with_deadline().await.unwrap();
        assert_eq!(a["n"], 1);

        // second exchange is still open
        assert_eq!(registrar.open_count(), 1);
        drop(delivery_b);
    }

    #[tokio::test]
    async fn deliver_on_unknown_key_is_not_an_error() {
        let registrar = CorrelationRegistrar::new(Duration::from_secs(10));
        assert!(!registrar.deliver("nonexistent", Ok(json!({}))));
    }

    #[tokio::test]
    async fn cancel_removes_without_delivering() {
        let registrar = CorrelationRegistrar::new(Duration::from_secs(10));
        let (key, _delivery) = registrar.open("CP01", "RemoteStopTransaction");
        registrar.cancel(&key);
        assert_eq!(registrar.open_count(), 0);
        assert!(!registrar.deliver(&key, Ok(json!({}))));
    }

    #[tokio::test]
    async fn sweep_expired_times_out_the_awaiting_caller() {
        let registrar = CorrelationRegistrar::new(Duration::from_millis(5));
        let (_key, delivery) = registrar.open("CP01", "TriggerMessage");
        tokio::time::sleep(Duration::from_millis(20)).await;
        registrar.sweep_expired();
        let outcome = delivery.await_with_deadline().await;
        assert!(matches!(outcome, Err(DomainError::Timeout)));
    }

    #[tokio::test]
    async fn await_with_deadline_times_out_without_explicit_sweep() {
        let registrar = CorrelationRegistrar::new(Duration::from_millis(5));
        let (_key, delivery) = registrar.open("CP01", "TriggerMessage");
        let outcome = delivery.await_with_deadline().await;
        assert!(matches!(outcome, Err(DomainError::Timeout)));
    }
}
