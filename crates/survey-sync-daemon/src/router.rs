//! Key routing and entity handlers for change-feed notifications.
//!
//! Each notification is reduced to a [`KvEntry`] (key, value bytes, and
//! operation) before any business logic runs. The key's prefix (the
//! portion before the first `.`) selects the entity handler; anything
//! outside the two synchronized prefixes is acknowledged and skipped.
//!
//! Every handler returns a single `bool`: should the notification be
//! redelivered. `true` only for transient publish failures; success and
//! permanent failures alike return `false` so the broker removes the
//! message.

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use survey_sync_core::envelope::MessageAction;
use survey_sync_core::idempotency::{forget, record_seen, resolve_action, MappingStore};
use survey_sync_core::kind::EntityKind;
use survey_sync_core::mapper::IdMapper;
use survey_sync_core::publisher::EventPublisher;
use survey_sync_core::response::SurveyResponseRecord;
use survey_sync_core::retry;
use survey_sync_core::survey::SurveyRecord;
use survey_sync_core::transform::{transform_survey, transform_survey_response, TransformError};
use survey_sync_core::ProcessingContext;

/// Key prefix of legacy survey rows.
pub const SURVEY_PREFIX: &str = "itx-surveys";

/// Key prefix of legacy survey response rows.
pub const SURVEY_RESPONSE_PREFIX: &str = "itx-survey-responses";

/// Operation conveyed by a change-feed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvOperation {
    Put,
    Delete,
    Purge,
}

impl KvOperation {
    /// Decodes the `KV-Operation` header; absence means put.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some("DEL") => Self::Delete,
            Some("PURGE") => Self::Purge,
            _ => Self::Put,
        }
    }
}

/// One change-feed notification, reduced to the parts the pipeline needs.
///
/// There is exactly one producer of this value (the consumer loop), so it
/// is a plain struct rather than an interface over the broker's message
/// type.
#[derive(Debug, Clone)]
pub struct KvEntry {
    /// Bucket key: the subject with the `$KV.<bucket>.` prefix removed.
    pub key: String,
    /// Notification body; empty for delete/purge.
    pub value: Bytes,
    pub operation: KvOperation,
}

impl KvEntry {
    /// Builds an entry from a notification's subject, operation, and body.
    /// A subject outside the bucket's namespace yields an empty key, which
    /// the router then skips.
    #[must_use]
    pub fn from_parts(bucket: &str, subject: &str, operation: KvOperation, value: Bytes) -> Self {
        let prefix = format!("$KV.{bucket}.");
        let key = subject.strip_prefix(&prefix).unwrap_or_default().to_string();
        Self {
            key,
            value,
            operation,
        }
    }
}

/// Routes one entry through the transform -> resolve -> publish chain.
///
/// Returns whether the notification should be redelivered.
pub async fn route_entry(
    ctx: &ProcessingContext,
    entry: &KvEntry,
    mapper: &dyn IdMapper,
    publisher: &dyn EventPublisher,
    store: &dyn MappingStore,
) -> bool {
    match entry.operation {
        KvOperation::Put => handle_put(ctx, entry, mapper, publisher, store).await,
        KvOperation::Delete | KvOperation::Purge => handle_delete(ctx, entry, publisher, store).await,
    }
}

async fn handle_put(
    ctx: &ProcessingContext,
    entry: &KvEntry,
    mapper: &dyn IdMapper,
    publisher: &dyn EventPublisher,
    store: &dyn MappingStore,
) -> bool {
    let payload: serde_json::Map<String, Value> = match serde_json::from_slice(&entry.value) {
        Ok(payload) => payload,
        Err(err) => {
            error!(key = %entry.key, error = %err, "failed to decode change-feed payload");
            return false;
        },
    };

    let prefix = entry
        .key
        .split_once('.')
        .map_or(entry.key.as_str(), |(prefix, _)| prefix);

    match prefix {
        SURVEY_PREFIX => {
            handle_survey_update(ctx, &entry.key, Value::Object(payload), mapper, publisher, store)
                .await
        },
        SURVEY_RESPONSE_PREFIX => {
            handle_survey_response_update(
                ctx,
                &entry.key,
                Value::Object(payload),
                mapper,
                publisher,
                store,
            )
            .await
        },
        _ => {
            debug!(key = %entry.key, "ignoring key outside synchronized prefixes");
            false
        },
    }
}

async fn handle_delete(
    ctx: &ProcessingContext,
    entry: &KvEntry,
    publisher: &dyn EventPublisher,
    store: &dyn MappingStore,
) -> bool {
    let Some((prefix, uid)) = entry.key.split_once('.') else {
        warn!(key = %entry.key, "skipping delete with malformed key");
        return false;
    };

    match prefix {
        SURVEY_PREFIX => handle_survey_delete(ctx, uid, publisher, store).await,
        SURVEY_RESPONSE_PREFIX => handle_survey_response_delete(ctx, uid, publisher, store).await,
        _ => {
            debug!(key = %entry.key, prefix, "skipping delete for unsupported type");
            false
        },
    }
}

/// Processes a survey update. Returns whether to redeliver.
pub async fn handle_survey_update(
    ctx: &ProcessingContext,
    key: &str,
    payload: Value,
    mapper: &dyn IdMapper,
    publisher: &dyn EventPublisher,
    store: &dyn MappingStore,
) -> bool {
    debug!(key, "processing survey update");

    let record = match transform_survey(payload, mapper).await {
        Ok(record) => record,
        Err(err @ TransformError::Orphaned) => {
            info!(key, reason = %err, "skipping survey sync; no valid parent references");
            return false;
        },
        Err(err) => {
            error!(key, error = %err, "failed to transform v1 survey");
            return false;
        },
    };

    let action = resolve_action(store, EntityKind::Survey, &record.uid).await;
    if let Err(err) = publisher.publish_survey_event(ctx, action, &record).await {
        if retry::is_transient(&err) {
            warn!(key, survey_uid = %record.uid, error = %err, "transient publish failure; requesting redelivery");
            return true;
        }
        error!(key, survey_uid = %record.uid, error = %err, "failed to publish survey event");
        return false;
    }

    record_seen(store, EntityKind::Survey, &record.uid).await;
    info!(key, survey_uid = %record.uid, action = %action, "survey indexer and access messages sent");
    false
}

/// Processes a survey delete. Returns whether to redeliver.
pub async fn handle_survey_delete(
    ctx: &ProcessingContext,
    uid: &str,
    publisher: &dyn EventPublisher,
    store: &dyn MappingStore,
) -> bool {
    debug!(survey_uid = uid, "processing survey delete");

    let record = SurveyRecord::minimal(uid);
    if let Err(err) = publisher
        .publish_survey_event(ctx, MessageAction::Deleted, &record)
        .await
    {
        if retry::is_transient(&err) {
            warn!(survey_uid = uid, error = %err, "transient publish failure; requesting redelivery");
            return true;
        }
        error!(survey_uid = uid, error = %err, "failed to publish survey delete event");
        return false;
    }

    forget(store, EntityKind::Survey, uid).await;
    info!(survey_uid = uid, "survey delete indexer and access messages sent");
    false
}

/// Processes a survey response update. Returns whether to redeliver.
pub async fn handle_survey_response_update(
    ctx: &ProcessingContext,
    key: &str,
    payload: Value,
    mapper: &dyn IdMapper,
    publisher: &dyn EventPublisher,
    store: &dyn MappingStore,
) -> bool {
    debug!(key, "processing survey response update");

    let record = match transform_survey_response(payload, mapper).await {
        Ok(record) => record,
        Err(err @ TransformError::Orphaned) => {
            info!(key, reason = %err, "skipping survey response sync; parent project unresolved");
            return false;
        },
        Err(err) => {
            error!(key, error = %err, "failed to transform v1 survey response");
            return false;
        },
    };

    let action = resolve_action(store, EntityKind::SurveyResponse, &record.uid).await;
    if let Err(err) = publisher
        .publish_survey_response_event(ctx, action, &record)
        .await
    {
        if retry::is_transient(&err) {
            warn!(key, response_uid = %record.uid, error = %err, "transient publish failure; requesting redelivery");
            return true;
        }
        error!(key, response_uid = %record.uid, error = %err, "failed to publish survey response event");
        return false;
    }

    record_seen(store, EntityKind::SurveyResponse, &record.uid).await;
    info!(key, response_uid = %record.uid, action = %action, "survey response indexer and access messages sent");
    false
}

/// Processes a survey response delete. Returns whether to redeliver.
pub async fn handle_survey_response_delete(
    ctx: &ProcessingContext,
    uid: &str,
    publisher: &dyn EventPublisher,
    store: &dyn MappingStore,
) -> bool {
    debug!(response_uid = uid, "processing survey response delete");

    let record = SurveyResponseRecord::minimal(uid);
    if let Err(err) = publisher
        .publish_survey_response_event(ctx, MessageAction::Deleted, &record)
        .await
    {
        if retry::is_transient(&err) {
            warn!(response_uid = uid, error = %err, "transient publish failure; requesting redelivery");
            return true;
        }
        error!(response_uid = uid, error = %err, "failed to publish survey response delete event");
        return false;
    }

    forget(store, EntityKind::SurveyResponse, uid).await;
    info!(response_uid = uid, "survey response delete indexer and access messages sent");
    false
}
