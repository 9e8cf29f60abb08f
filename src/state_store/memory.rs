//! Reference in-process implementation of the state-store contract,
//! backed by a concurrent map. Stands in for a real distributed backend in
//! single-instance deployments and in tests.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use super::StateStore;
use crate::support::StoreError;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Instant::now() >= at).unwrap_or(false)
    }
}

#[derive(Default)]
pub struct InMemoryStateStore {
    entries: DashMap<String, Entry>,
    counters: DashMap<String, AtomicI64>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let found = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(Some(entry.value.clone())),
            Some(_) => None,
            None => Some(None),
        };
        match found {
            Some(value) => Ok(value),
            None => {
                self.entries.remove(key);
                Ok(None)
            }
        }
    }

    async fn put_raw(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn put_raw_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete_raw(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let counter = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| AtomicI64::new(0));
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn conditional_put_raw(
        &self,
        key: &str,
        value: String,
        expected_prior: Option<String>,
    ) -> Result<bool, StoreError> {
        use dashmap::mapref::entry::Entry as MapEntry;

        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let current = if occupied.get().is_expired() {
                    None
                } else {
                    Some(occupied.get().value.clone())
                };
                if current == expected_prior {
                    occupied.insert(Entry {
                        value,
                        expires_at: None,
                    });
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MapEntry::Vacant(vacant) => {
                if expected_prior.is_none() {
                    vacant.insert(Entry {
                        value,
                        expires_at: None,
                    });
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_on_absent_key_returns_none() {
        let store = InMemoryStateStore::new();
        assert!(store.get_raw("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn increment_is_monotonic_and_starts_at_one() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.increment("counter").await.unwrap(), 1);
        assert_eq!(store.increment("counter").await.unwrap(), 2);
        assert_eq!(store.increment("counter").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn next_transaction_id_starts_at_1000() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.next_transaction_id().await.unwrap(), 1000);
        assert_eq!(store.next_transaction_id().await.unwrap(), 1001);
    }

    #[tokio::test]
    async fn conditional_put_requires_matching_prior() {
        let store = InMemoryStateStore::new();
        assert!(store
            .conditional_put_raw("k", "v1".into(), None)
            .await
            .unwrap());
        assert!(!store
            .conditional_put_raw("k", "v2".into(), None)
            .await
            .unwrap());
        assert!(store
            .conditional_put_raw("k", "v2".into(), Some("v1".into()))
            .await
            .unwrap());
        assert_eq!(store.get_raw("k").await.unwrap(), Some("v2".into()));
    }

    #[tokio::test]
    async fn ttl_entry_expires() {
        let store = InMemoryStateStore::new();
        store
            .put_raw_with_ttl("k", "v".into(), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(store.get_raw("k").await.unwrap(), Some("v".into()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get_raw("k").await.unwrap().is_none());
    }
}
