//! Downstream publisher seam.
//!
//! One call per entity change; the implementation is responsible for
//! emitting both the indexing envelope and the access-control message with
//! the action-appropriate shapes (see [`crate::envelope`]). The production
//! implementation publishes over NATS from the daemon crate;
//! [`RecordingPublisher`] is the in-memory stand-in for handler tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::context::ProcessingContext;
use crate::envelope::MessageAction;
use crate::kind::EntityKind;
use crate::response::SurveyResponseRecord;
use crate::survey::SurveyRecord;

/// A downstream publish failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PublishError {
    /// The broker reported a typed timeout. Always worth retrying.
    #[error("broker publish timed out on {subject}")]
    Timeout {
        /// Subject the publish was addressed to.
        subject: String,
    },

    /// The broker rejected or dropped the publish for some other reason;
    /// transience is decided by [`crate::retry::is_transient`].
    #[error("failed to publish to {subject}: {message}")]
    Broker {
        /// Subject the publish was addressed to.
        subject: String,
        /// Rendered broker error.
        message: String,
    },

    /// The outbound message could not be encoded. Permanent.
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Emits the indexing and access-control messages for one entity change.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes the pair of messages for a survey change.
    async fn publish_survey_event(
        &self,
        ctx: &ProcessingContext,
        action: MessageAction,
        record: &SurveyRecord,
    ) -> Result<(), PublishError>;

    /// Publishes the pair of messages for a survey response change.
    async fn publish_survey_response_event(
        &self,
        ctx: &ProcessingContext,
        action: MessageAction,
        record: &SurveyResponseRecord,
    ) -> Result<(), PublishError>;
}

/// One event accepted by a [`RecordingPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub kind: EntityKind,
    pub action: MessageAction,
    pub uid: String,
}

/// In-memory [`EventPublisher`] that records accepted events and can be
/// primed with failures for the next calls.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: std::sync::Mutex<Vec<RecordedEvent>>,
    failures: std::sync::Mutex<std::collections::VecDeque<PublishError>>,
}

impl RecordingPublisher {
    /// Creates a publisher that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a failure to be returned by the next publish call; the call
    /// after that succeeds again (unless more failures are queued).
    pub fn fail_next(&self, err: PublishError) {
        self.failures.lock().expect("failures lock").push_back(err);
    }

    /// Snapshot of the accepted events, in publish order.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("events lock").clone()
    }

    fn accept(&self, kind: EntityKind, action: MessageAction, uid: &str) -> Result<(), PublishError> {
        if let Some(err) = self.failures.lock().expect("failures lock").pop_front() {
            return Err(err);
        }
        self.events.lock().expect("events lock").push(RecordedEvent {
            kind,
            action,
            uid: uid.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_survey_event(
        &self,
        _ctx: &ProcessingContext,
        action: MessageAction,
        record: &SurveyRecord,
    ) -> Result<(), PublishError> {
        self.accept(EntityKind::Survey, action, &record.uid)
    }

    async fn publish_survey_response_event(
        &self,
        _ctx: &ProcessingContext,
        action: MessageAction,
        record: &SurveyResponseRecord,
    ) -> Result<(), PublishError> {
        self.accept(EntityKind::SurveyResponse, action, &record.uid)
    }
}
