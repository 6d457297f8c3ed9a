//! NATS implementation of the downstream publisher.
//!
//! Every entity change fans out to two messages: the indexing envelope on
//! the entity's index subject, then the access-control message. Deletes
//! swap in the reduced shapes and the unconditional `delete_access`;
//! create/update access messages are skipped entirely when they would carry
//! no references (and, for responses, no relations).
//!
//! The raw transport sits behind [`MessageSink`] so the fan-out and skip
//! logic is testable without a broker; [`NatsSink`] is the production sink.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use survey_sync_core::envelope::{
    delete_access, indexing_envelope, response_indexing_config, response_update_access,
    survey_indexing_config, survey_update_access, MessageAction,
};
use survey_sync_core::kind::EntityKind;
use survey_sync_core::publisher::{EventPublisher, PublishError};
use survey_sync_core::response::SurveyResponseRecord;
use survey_sync_core::survey::SurveyRecord;
use survey_sync_core::ProcessingContext;

/// Subject for survey indexing messages.
pub const INDEX_SURVEY_SUBJECT: &str = "lfx.index.survey";

/// Subject for survey response indexing messages.
pub const INDEX_SURVEY_RESPONSE_SUBJECT: &str = "lfx.index.survey_response";

/// Subject for access-control updates.
pub const UPDATE_ACCESS_SUBJECT: &str = "lfx.fga-sync.update_access";

/// Subject for access-control deletions.
pub const DELETE_ACCESS_SUBJECT: &str = "lfx.fga-sync.delete_access";

/// Raw one-way transport for outbound messages.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Sends one payload to one subject.
    async fn send(&self, subject: &str, payload: Bytes) -> Result<(), PublishError>;
}

/// Production sink over a NATS client.
pub struct NatsSink {
    client: async_nats::Client,
}

#[async_trait]
impl MessageSink for NatsSink {
    async fn send(&self, subject: &str, payload: Bytes) -> Result<(), PublishError> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|err| PublishError::Broker {
                subject: subject.to_string(),
                message: err.to_string(),
            })
    }
}

/// [`EventPublisher`] that encodes envelopes and access messages as JSON
/// and hands them to a [`MessageSink`].
pub struct NatsPublisher<S: MessageSink = NatsSink> {
    sink: S,
}

impl NatsPublisher<NatsSink> {
    /// Creates a publisher over an established connection.
    #[must_use]
    pub fn new(client: async_nats::Client) -> Self {
        Self {
            sink: NatsSink { client },
        }
    }
}

impl<S: MessageSink> NatsPublisher<S> {
    /// Creates a publisher over an arbitrary sink.
    #[must_use]
    pub fn with_sink(sink: S) -> Self {
        Self { sink }
    }

    async fn send_json<T: Serialize + Sync>(
        &self,
        subject: &str,
        message: &T,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(message)?;
        debug!(subject, bytes = payload.len(), "publishing outbound message");
        self.sink.send(subject, Bytes::from(payload)).await
    }
}

#[async_trait]
impl<S: MessageSink> EventPublisher for NatsPublisher<S> {
    async fn publish_survey_event(
        &self,
        ctx: &ProcessingContext,
        action: MessageAction,
        record: &SurveyRecord,
    ) -> Result<(), PublishError> {
        let envelope = indexing_envelope(
            ctx,
            action,
            &record.uid,
            record,
            survey_indexing_config(record),
        )?;
        self.send_json(INDEX_SURVEY_SUBJECT, &envelope).await?;

        if action == MessageAction::Deleted {
            self.send_json(
                DELETE_ACCESS_SUBJECT,
                &delete_access(EntityKind::Survey, &record.uid),
            )
            .await?;
        } else if let Some(message) = survey_update_access(record) {
            self.send_json(UPDATE_ACCESS_SUBJECT, &message).await?;
        }

        Ok(())
    }

    async fn publish_survey_response_event(
        &self,
        ctx: &ProcessingContext,
        action: MessageAction,
        record: &SurveyResponseRecord,
    ) -> Result<(), PublishError> {
        let envelope = indexing_envelope(
            ctx,
            action,
            &record.uid,
            record,
            response_indexing_config(record),
        )?;
        self.send_json(INDEX_SURVEY_RESPONSE_SUBJECT, &envelope).await?;

        if action == MessageAction::Deleted {
            self.send_json(
                DELETE_ACCESS_SUBJECT,
                &delete_access(EntityKind::SurveyResponse, &record.uid),
            )
            .await?;
        } else if let Some(message) = response_update_access(record) {
            self.send_json(UPDATE_ACCESS_SUBJECT, &message).await?;
        }

        Ok(())
    }
}
