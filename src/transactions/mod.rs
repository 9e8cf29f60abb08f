//! Transaction & Connector State Machine: the algorithms behind
//! StartTransaction, StopTransaction, StatusNotification and MeterValues.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::warn;

use crate::domain::{ConnectorState, ConnectorStatus, TransactionInfo};
use crate::state_store::StateStore;
use crate::support::DomainError;

pub struct TransactionService {
    store: Arc<dyn StateStore>,
}

impl TransactionService {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    async fn connector_or_new(&self, client_id: &str, connector_id: u32) -> Result<ConnectorStatus, DomainError> {
        match self
            .store
            .get_connector(client_id, connector_id)
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?
        {
            Some(c) => Ok(c),
            None => Ok(ConnectorStatus::new(client_id, connector_id)),
        }
    }

    async fn note_connector(&self, client_id: &str, connector_id: u32) {
        if let Ok(Some(mut cp)) = self.store.get_charge_point(client_id).await {
            cp.note_connector(connector_id);
            let _ = self.store.put_charge_point(&cp).await;
        }
    }

    pub async fn start_transaction(
        &self,
        client_id: &str,
        connector_id: u32,
        id_tag: &str,
        meter_start: i64,
        started_at: DateTime<Utc>,
    ) -> Result<TransactionInfo, DomainError> {
        let id = self
            .store
            .next_transaction_id()
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        let tx = TransactionInfo::start(id, client_id, connector_id, id_tag, meter_start, started_at);

        self.store
            .put_transaction(&tx)
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        if let Err(e) = self.store.note_transaction_id(client_id, id).await {
            warn!(charge_point_id = client_id, error = %e, "failed to index transaction id");
        }

        self.note_connector(client_id, connector_id).await;
        let mut connector = self.connector_or_new(client_id, connector_id).await?;
        if let Some(existing) = connector.active_transaction_id {
            warn!(
                charge_point_id = client_id,
                connector_id,
                previous_transaction_id = existing,
                new_transaction_id = id,
                "starting transaction while connector already had one active"
            );
        }
        connector.attach_transaction(id);

        self.store
            .put_connector(&connector)
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        Ok(tx)
    }

    /// Tolerant of an unknown transaction id: the charge point is
    /// authoritative about whether it has one, so the core replies success
    /// either way.
    pub async fn stop_transaction(
        &self,
        transaction_id: i64,
        meter_stop: i64,
        reason: Option<String>,
        stopped_at: DateTime<Utc>,
    ) {
        let tx = match self.store.get_transaction(transaction_id).await {
            Ok(Some(tx)) => tx,
            Ok(None) => return,
            Err(e) => {
                warn!(transaction_id, error = %e, "failed to load transaction for stop, ignoring");
                return;
            }
        };

        let mut tx = tx;
        tx.stop(meter_stop, reason, stopped_at);

        if let Err(e) = self.store.put_transaction(&tx).await {
            warn!(transaction_id, error = %e, "failed to persist stopped transaction");
        }

        if let Ok(Some(mut connector)) = self.store.get_connector(&tx.charge_point_id, tx.connector_id).await {
            connector.clear_transaction_if(transaction_id);
            if let Err(e) = self.store.put_connector(&connector).await {
                warn!(transaction_id, error = %e, "failed to clear connector active transaction");
            }
        }
    }

    pub async fn update_status(
        &self,
        client_id: &str,
        connector_id: u32,
        status: ConnectorState,
        error_code: Option<String>,
    ) {
        self.note_connector(client_id, connector_id).await;
        let mut connector = match self.connector_or_new(client_id, connector_id).await {
            Ok(c) => c,
            Err(e) => {
                warn!(charge_point_id = client_id, connector_id, error = %e, "failed to load connector");
                return;
            }
        };

        if status == ConnectorState::Charging && connector.active_transaction_id.is_none() {
            warn!(
                charge_point_id = client_id,
                connector_id,
                "status moved to Charging with no active transaction on record"
            );
        }

        connector.set_status(status, error_code);

        if let Err(e) = self.store.put_connector(&connector).await {
            warn!(charge_point_id = client_id, connector_id, error = %e, "failed to persist connector status");
        }
    }

    /// Applies the latest energy register reading to a transaction if one
    /// was supplied and the reading does not regress the meter.
    pub async fn apply_meter_reading(&self, transaction_id: Option<i64>, reading_wh: i64) {
        let Some(transaction_id) = transaction_id else {
            return;
        };

        let tx = match self.store.get_transaction(transaction_id).await {
            Ok(Some(tx)) => tx,
            Ok(None) => return,
            Err(e) => {
                warn!(transaction_id, error = %e, "failed to load transaction for meter update");
                return;
            }
        };

        let mut tx = tx;
        if !tx.apply_meter_reading(reading_wh) {
            warn!(
                transaction_id,
                reading_wh,
                current_meter = tx.current_meter,
                "dropped meter reading lower than current value"
            );
            return;
        }

        if let Err(e) = self.store.put_transaction(&tx).await {
            warn!(transaction_id, error = %e, "failed to persist meter update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::InMemoryStateStore;

    fn service() -> TransactionService {
        TransactionService::new(Arc::new(InMemoryStateStore::new()))
    }

    #[tokio::test]
    async fn start_transaction_allocates_monotonic_ids() {
        let svc = service();
        let tx1 = svc.start_transaction("CP01", 1, "TAG", 1000, Utc::now()).await.unwrap();
        let tx2 = svc.start_transaction("CP01", 1, "TAG", 1000, Utc::now()).await.unwrap();
        assert!(tx2.id > tx1.id);
    }

    #[tokio::test]
    async fn start_transaction_attaches_to_connector() {
        let svc = service();
        let tx = svc.start_transaction("CP01", 2, "TAG", 500, Utc::now()).await.unwrap();
        let connector = svc.store.get_connector("CP01", 2).await.unwrap().unwrap();
        assert_eq!(connector.active_transaction_id, Some(tx.id));
    }

    #[tokio::test]
    async fn stop_unknown_transaction_does_not_panic() {
        let svc = service();
        svc.stop_transaction(999, 1000, None, Utc::now()).await;
    }

    #[tokio::test]
    async fn stop_transaction_clears_connector_and_completes_tx() {
        let svc = service();
        let tx = svc.start_transaction("CP01", 1, "TAG", 1000, Utc::now()).await.unwrap();
        svc.stop_transaction(tx.id, 2000, Some("Local".into()), Utc::now()).await;

        let stored = svc.store.get_transaction(tx.id).await.unwrap().unwrap();
        assert!(!stored.is_active());
        assert_eq!(stored.current_meter, 2000);

        let connector = svc.store.get_connector("CP01", 1).await.unwrap().unwrap();
        assert!(connector.active_transaction_id.is_none());
    }

    #[tokio::test]
    async fn meter_reading_lower_than_current_is_dropped() {
        let svc = service();
        let tx = svc.start_transaction("CP01", 1, "TAG", 1000, Utc::now()).await.unwrap();
        svc.apply_meter_reading(Some(tx.id), 1500).await;
        svc.apply_meter_reading(Some(tx.id), 1200).await;
        let stored = svc.store.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(stored.current_meter, 1500);
    }

    #[tokio::test]
    async fn status_to_charging_without_transaction_is_still_accepted() {
        let svc = service();
        svc.update_status("CP01", 1, ConnectorState::Charging, None).await;
        let connector = svc.store.get_connector("CP01", 1).await.unwrap().unwrap();
        assert_eq!(connector.status, ConnectorState::Charging);
    }
}
