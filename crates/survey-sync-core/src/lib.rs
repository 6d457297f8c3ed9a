//! Core domain library for the v1 -> v2 survey synchronization pipeline.
//!
//! This crate contains everything that does not require a broker connection:
//! the strongly-typed v2 record models, the loosely-typed v1 decoders and
//! their string-or-number coercion rules, the identifier-mapper and
//! publisher trait seams, idempotency action resolution, outbound envelope
//! construction, and transient-error classification.
//!
//! The deployable consumer lives in `survey-sync-daemon`, which implements
//! the trait seams against NATS. Keeping the seams here means the whole
//! transform -> resolve -> publish chain is exercisable in unit tests with
//! in-memory fakes.

pub mod coerce;
pub mod context;
pub mod envelope;
pub mod idempotency;
pub mod kind;
pub mod mapper;
pub mod publisher;
pub mod response;
pub mod retry;
pub mod survey;
pub mod transform;

pub use context::ProcessingContext;
pub use envelope::{AccessMessage, IndexingConfig, IndexingEnvelope, MessageAction};
pub use idempotency::{MappingStore, StoreError};
pub use kind::EntityKind;
pub use mapper::{DualId, IdMapper, MapperError};
pub use publisher::{EventPublisher, PublishError};
pub use response::SurveyResponseRecord;
pub use survey::{CommitteeLink, SurveyRecord};
pub use transform::TransformError;
