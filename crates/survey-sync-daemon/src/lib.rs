//! survey-sync-daemon - durable v1 -> v2 survey synchronization consumer.
//!
//! This crate wires the `survey-sync-core` pipeline to NATS:
//!
//! 1. A durable JetStream consumer tails the legacy key-value bucket's
//!    change feed ([`processor`]).
//! 2. Each notification is reduced to a key/operation pair and routed by
//!    entity-type prefix ([`router`]).
//! 3. Records are transformed and their embedded v1 identifiers resolved
//!    over request/reply ([`idmapper`]).
//! 4. The create/update action is decided against a mappings KV bucket
//!    ([`mappings`]) and the indexing + access-control messages go out on
//!    core NATS subjects ([`publisher`]).
//!
//! Failure handling follows one rule end to end: only transient publish
//! failures trigger redelivery; everything else is logged and acknowledged.

pub mod config;
pub mod idmapper;
pub mod mappings;
pub mod processor;
pub mod publisher;
pub mod router;

pub use config::EventingConfig;
pub use processor::{EventProcessor, ProcessorError};
