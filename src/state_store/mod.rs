//! Distributed Key/Value Interface: the contract every processor instance
//! uses to read and write fleet-wide state. Single-key linearizable reads
//! and writes, an atomic monotonic counter, and compare-and-set — nothing
//! more is assumed by the algorithms above this layer.

mod memory;

pub use memory::InMemoryStateStore;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::domain::{ChargePointInfo, ConnectorStatus, TransactionInfo};
use crate::support::StoreError;

pub const TRANSACTION_COUNTER_KEY: &str = "transaction_counter";
pub const TRANSACTION_COUNTER_START: i64 = 1000;

pub fn charge_point_key(client_id: &str) -> String {
    format!("charge_point/{client_id}")
}

pub fn connector_key(client_id: &str, connector_id: u32) -> String {
    format!("connector/{client_id}/{connector_id}")
}

pub fn transaction_key(transaction_id: i64) -> String {
    format!("transaction/{transaction_id}")
}

pub fn config_override_key(client_id: &str) -> String {
    format!("config_override/{client_id}")
}

/// Index of transaction ids seen for a client. Not part of the core data
/// model in [`crate::domain`] — purely a façade convenience, since the
/// store exposes no list-by-prefix primitive.
pub fn transaction_index_key(client_id: &str) -> String {
    format!("transaction_index/{client_id}")
}

/// Raw key/value operations a backend must provide. Typed accessors for
/// each entity are default methods layered on top via serde_json, so a new
/// backend only has to implement the five raw primitives.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put_raw(&self, key: &str, value: String) -> Result<(), StoreError>;

    async fn put_raw_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn delete_raw(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically increments the counter at `key` (creating it at 0 first)
    /// and returns the new value.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    /// Compare-and-set: writes `value` only if the stored value equals
    /// `expected_prior` (`None` means "key must be absent"). Returns
    /// whether the write happened.
    async fn conditional_put_raw(
        &self,
        key: &str,
        value: String,
        expected_prior: Option<String>,
    ) -> Result<bool, StoreError>;

    async fn next_transaction_id(&self) -> Result<i64, StoreError> {
        let n = self.increment(TRANSACTION_COUNTER_KEY).await?;
        Ok(TRANSACTION_COUNTER_START - 1 + n)
    }

    async fn get_charge_point(&self, client_id: &str) -> Result<Option<ChargePointInfo>, StoreError> {
        get_typed(self, &charge_point_key(client_id)).await
    }

    async fn put_charge_point(&self, cp: &ChargePointInfo) -> Result<(), StoreError> {
        put_typed(self, &charge_point_key(&cp.id), cp).await
    }

    async fn get_connector(
        &self,
        client_id: &str,
        connector_id: u32,
    ) -> Result<Option<ConnectorStatus>, StoreError> {
        get_typed(self, &connector_key(client_id, connector_id)).await
    }

    async fn put_connector(&self, connector: &ConnectorStatus) -> Result<(), StoreError> {
        put_typed(
            self,
            &connector_key(&connector.charge_point_id, connector.connector_id),
            connector,
        )
        .await
    }

    async fn get_transaction(&self, id: i64) -> Result<Option<TransactionInfo>, StoreError> {
        get_typed(self, &transaction_key(id)).await
    }

    async fn put_transaction(&self, tx: &TransactionInfo) -> Result<(), StoreError> {
        put_typed(self, &transaction_key(tx.id), tx).await
    }

    async fn note_transaction_id(&self, client_id: &str, transaction_id: i64) -> Result<(), StoreError> {
        let key = transaction_index_key(client_id);
        let mut ids: Vec<i64> = get_typed(self, &key).await?.unwrap_or_default();
        if !ids.contains(&transaction_id) {
            ids.push(transaction_id);
            put_typed(self, &key, &ids).await?;
        }
        Ok(())
    }

    async fn transaction_ids_for_client(&self, client_id: &str) -> Result<Vec<i64>, StoreError> {
        Ok(get_typed(self, &transaction_index_key(client_id)).await?.unwrap_or_default())
    }
}

/// Generic typed accessor helper, kept outside the trait so `StateStore`
/// remains dyn-compatible (generic trait methods would block vtable
/// construction).
async fn get_typed<T: DeserializeOwned, S: StateStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get_raw(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

async fn put_typed<T: Serialize + Sync, S: StateStore + ?Sized>(
    store: &S,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.put_raw(key, serde_json::to_string(value)?).await
}
