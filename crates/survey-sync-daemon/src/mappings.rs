//! NATS KV implementation of the idempotency mapping store.
//!
//! Entries live in a small bucket separate from the change feed; only
//! existence matters, so the stored value is a constant marker byte.

use async_trait::async_trait;
use bytes::Bytes;

use survey_sync_core::idempotency::{MappingStore, StoreError};

/// Marker value stored for every mapping entry.
const MARKER: Bytes = Bytes::from_static(b"1");

/// [`MappingStore`] backed by a NATS KV bucket.
pub struct KvMappingStore {
    store: async_nats::jetstream::kv::Store,
}

impl KvMappingStore {
    /// Wraps an opened KV bucket.
    #[must_use]
    pub fn new(store: async_nats::jetstream::kv::Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MappingStore for KvMappingStore {
    async fn get(&self, key: &str) -> Result<bool, StoreError> {
        match self.store.get(key).await {
            Ok(entry) => Ok(entry.is_some()),
            Err(err) => Err(StoreError(err.to_string())),
        }
    }

    async fn put(&self, key: &str) -> Result<(), StoreError> {
        self.store
            .put(key, MARKER)
            .await
            .map(|_| ())
            .map_err(|err| StoreError(err.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.store
            .delete(key)
            .await
            .map_err(|err| StoreError(err.to_string()))
    }
}
