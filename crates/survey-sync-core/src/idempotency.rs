//! Idempotency store seam and create/update action resolution.
//!
//! A small persistent key-value namespace records which entities this
//! pipeline has already published, keyed `"<kind>.<uid>"`. Existence of the
//! entry, not its content, is what matters: it only decides whether the
//! downstream action tag says `created` or `updated`. The store is a
//! classification aid, not a correctness-critical cache, so every failure
//! here is logged and swallowed; it must never influence the ack/retry
//! decision.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::envelope::MessageAction;
use crate::kind::EntityKind;

/// A mapping-store operation failed.
#[derive(Debug, Error)]
#[error("mapping store operation failed: {0}")]
pub struct StoreError(pub String);

/// Persistent existence-set of already-published entities.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Whether an entry exists for `key`. Absence is `Ok(false)`, not an
    /// error.
    async fn get(&self, key: &str) -> Result<bool, StoreError>;

    /// Creates (or refreshes) the entry for `key`.
    async fn put(&self, key: &str) -> Result<(), StoreError>;

    /// Removes the entry for `key`, if any.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// The mapping-store key for an entity.
#[must_use]
pub fn mapping_key(kind: EntityKind, uid: &str) -> String {
    format!("{}.{uid}", kind.object_type())
}

/// Decides the action tag for an incoming create/update: `updated` when the
/// entity was seen before, `created` otherwise. A store read failure is
/// logged and treated as first sight.
pub async fn resolve_action(store: &dyn MappingStore, kind: EntityKind, uid: &str) -> MessageAction {
    match store.get(&mapping_key(kind, uid)).await {
        Ok(true) => MessageAction::Updated,
        Ok(false) => MessageAction::Created,
        Err(err) => {
            warn!(kind = %kind, uid, error = %err, "mapping lookup failed; assuming first sight");
            MessageAction::Created
        },
    }
}

/// Records that an entity was published. Best-effort: failure is logged and
/// ignored.
pub async fn record_seen(store: &dyn MappingStore, kind: EntityKind, uid: &str) {
    if let Err(err) = store.put(&mapping_key(kind, uid)).await {
        warn!(kind = %kind, uid, error = %err, "failed to store mapping entry");
    }
}

/// Removes the entity's mapping entry after a delete was published.
/// Best-effort: failure is logged and ignored.
pub async fn forget(store: &dyn MappingStore, kind: EntityKind, uid: &str) {
    if let Err(err) = store.delete(&mapping_key(kind, uid)).await {
        warn!(kind = %kind, uid, error = %err, "failed to delete mapping entry");
    }
}

/// In-memory [`MappingStore`] for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    entries: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl InMemoryMappingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn get(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().expect("store lock").contains(key))
    }

    async fn put(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().expect("store lock").insert(key.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().expect("store lock").remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    #[async_trait]
    impl MappingStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<bool, StoreError> {
            Err(StoreError("kv bucket unreachable".to_string()))
        }

        async fn put(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError("kv bucket unreachable".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError("kv bucket unreachable".to_string()))
        }
    }

    #[test]
    fn mapping_keys_are_kind_scoped() {
        assert_eq!(mapping_key(EntityKind::Survey, "s1"), "survey.s1");
        assert_eq!(
            mapping_key(EntityKind::SurveyResponse, "r1"),
            "survey_response.r1"
        );
    }

    #[tokio::test]
    async fn first_sight_is_created_then_updated() {
        let store = InMemoryMappingStore::new();
        assert_eq!(
            resolve_action(&store, EntityKind::Survey, "s1").await,
            MessageAction::Created
        );
        record_seen(&store, EntityKind::Survey, "s1").await;
        assert_eq!(
            resolve_action(&store, EntityKind::Survey, "s1").await,
            MessageAction::Updated
        );
        // Still updated on every subsequent sighting.
        assert_eq!(
            resolve_action(&store, EntityKind::Survey, "s1").await,
            MessageAction::Updated
        );
    }

    #[tokio::test]
    async fn delete_resets_action_to_created() {
        let store = InMemoryMappingStore::new();
        record_seen(&store, EntityKind::SurveyResponse, "r1").await;
        forget(&store, EntityKind::SurveyResponse, "r1").await;
        assert_eq!(
            resolve_action(&store, EntityKind::SurveyResponse, "r1").await,
            MessageAction::Created
        );
    }

    #[tokio::test]
    async fn kinds_do_not_collide() {
        let store = InMemoryMappingStore::new();
        record_seen(&store, EntityKind::Survey, "x").await;
        assert_eq!(
            resolve_action(&store, EntityKind::SurveyResponse, "x").await,
            MessageAction::Created
        );
    }

    #[tokio::test]
    async fn store_failures_degrade_to_created() {
        assert_eq!(
            resolve_action(&BrokenStore, EntityKind::Survey, "s1").await,
            MessageAction::Created
        );
        // Best-effort writes must not panic or propagate.
        record_seen(&BrokenStore, EntityKind::Survey, "s1").await;
        forget(&BrokenStore, EntityKind::Survey, "s1").await;
    }
}
