//! Durable change-feed consumer lifecycle.
//!
//! [`EventProcessor::connect`] establishes the NATS connection and opens
//! the mappings bucket; [`EventProcessor::run`] creates (or updates) the
//! durable consumer and processes notifications one at a time until
//! shutdown is requested; [`EventProcessor::stop`] drains the connection
//! and is safe to call even if `run` never started.
//!
//! The consumer definition is idempotent, so every process start issues the
//! same create-or-update call. Multiple instances share the durable name
//! and the broker load-balances notifications across them; within one
//! instance the full transform -> resolve -> publish chain completes before
//! the next notification is taken.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use async_nats::jetstream::consumer::{pull, AckPolicy, DeliverPolicy};
use async_nats::jetstream::AckKind;

use survey_sync_core::idempotency::MappingStore;
use survey_sync_core::mapper::IdMapper;
use survey_sync_core::publisher::EventPublisher;
use survey_sync_core::ProcessingContext;

use crate::config::EventingConfig;
use crate::idmapper::NatsIdMapper;
use crate::mappings::KvMappingStore;
use crate::publisher::NatsPublisher;
use crate::router::{route_entry, KvEntry, KvOperation};

/// How often the consume loop re-checks the shutdown flag while idle.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors raised while setting up or running the consumer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProcessorError {
    /// Connecting to the broker failed.
    #[error("failed to connect to NATS at {url}: {message}")]
    Connect {
        /// The broker URL.
        url: String,
        /// Rendered connection error.
        message: String,
    },

    /// The mappings KV bucket could not be opened.
    #[error("failed to access mappings bucket {bucket}: {message}")]
    MappingsBucket {
        /// The bucket name.
        bucket: String,
        /// Rendered error.
        message: String,
    },

    /// The durable consumer could not be created or updated.
    #[error("failed to create or update consumer {name}: {message}")]
    Consumer {
        /// The durable consumer name.
        name: String,
        /// Rendered error.
        message: String,
    },

    /// The message stream could not be opened.
    #[error("failed to open change-feed message stream: {0}")]
    Messages(String),
}

/// The durable subscriber driving the synchronization pipeline.
pub struct EventProcessor {
    client: async_nats::Client,
    jetstream: async_nats::jetstream::Context,
    config: EventingConfig,
    mapper: Arc<dyn IdMapper>,
    publisher: Arc<dyn EventPublisher>,
    mappings: Arc<dyn MappingStore>,
    shutdown: Arc<AtomicBool>,
}

impl EventProcessor {
    /// Connects to the broker and wires the pipeline collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::Connect`] or
    /// [`ProcessorError::MappingsBucket`] when setup fails.
    pub async fn connect(config: EventingConfig) -> Result<Self, ProcessorError> {
        let client = async_nats::ConnectOptions::new()
            .name("survey-sync-daemon")
            .event_callback(|event| async move {
                warn!(event = %event, "nats connection event");
            })
            .connect(&config.nats_url)
            .await
            .map_err(|err| ProcessorError::Connect {
                url: config.nats_url.clone(),
                message: err.to_string(),
            })?;

        let jetstream = async_nats::jetstream::new(client.clone());

        let mappings_bucket = jetstream
            .get_key_value(config.mappings_bucket.as_str())
            .await
            .map_err(|err| ProcessorError::MappingsBucket {
                bucket: config.mappings_bucket.clone(),
                message: err.to_string(),
            })?;

        let mapper: Arc<dyn IdMapper> =
            Arc::new(NatsIdMapper::new(client.clone(), config.lookup_timeout));
        let publisher: Arc<dyn EventPublisher> = Arc::new(NatsPublisher::new(client.clone()));
        let mappings: Arc<dyn MappingStore> = Arc::new(KvMappingStore::new(mappings_bucket));

        info!(url = %config.nats_url, "connected to NATS");

        Ok(Self {
            client,
            jetstream,
            config,
            mapper,
            publisher,
            mappings,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that stops [`Self::run`] cooperatively; hand this to a signal
    /// handler.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Creates or updates the durable consumer, then consumes until the
    /// shutdown flag is set. In-flight processing finishes before the loop
    /// exits.
    ///
    /// # Errors
    ///
    /// Returns an error when the consumer definition or message stream
    /// cannot be established; per-notification failures are handled inside
    /// the loop and never abort it.
    pub async fn run(&self) -> Result<(), ProcessorError> {
        info!(
            consumer = %self.config.consumer_name,
            stream = %self.config.stream_name,
            filter = %self.config.filter_subject,
            "starting change-feed consumer"
        );

        let consumer = self
            .jetstream
            .create_consumer_on_stream(
                pull::Config {
                    durable_name: Some(self.config.consumer_name.clone()),
                    description: Some(
                        "durable v1 key-value change-feed watcher for survey sync".to_string(),
                    ),
                    deliver_policy: DeliverPolicy::LastPerSubject,
                    ack_policy: AckPolicy::Explicit,
                    filter_subject: self.config.filter_subject.clone(),
                    max_deliver: self.config.max_deliver,
                    ack_wait: self.config.ack_wait,
                    max_ack_pending: self.config.max_ack_pending,
                    ..Default::default()
                },
                self.config.stream_name.as_str(),
            )
            .await
            .map_err(|err| ProcessorError::Consumer {
                name: self.config.consumer_name.clone(),
                message: err.to_string(),
            })?;

        let mut messages = consumer
            .messages()
            .await
            .map_err(|err| ProcessorError::Messages(err.to_string()))?;

        info!("event processor started");

        while !self.shutdown.load(Ordering::Relaxed) {
            match tokio::time::timeout(SHUTDOWN_POLL_INTERVAL, messages.next()).await {
                // Idle; go around and re-check the shutdown flag.
                Err(_) => continue,
                Ok(None) => {
                    warn!("change-feed message stream ended");
                    break;
                },
                Ok(Some(Err(err))) => {
                    error!(error = %err, "change-feed consumer error");
                },
                Ok(Some(Ok(message))) => self.dispatch(message).await,
            }
        }

        info!("event processor consume loop exited");
        Ok(())
    }

    /// Routes one notification and converts the outcome into an ack or NAK.
    async fn dispatch(&self, message: async_nats::jetstream::Message) {
        let operation = KvOperation::from_header(
            message
                .headers
                .as_ref()
                .and_then(|headers| headers.get("KV-Operation"))
                .map(|value| value.as_str()),
        );
        let entry = KvEntry::from_parts(
            &self.config.bucket,
            message.subject.as_str(),
            operation,
            message.payload.clone(),
        );

        let ctx = ProcessingContext::default();
        let should_retry = route_entry(
            &ctx,
            &entry,
            self.mapper.as_ref(),
            self.publisher.as_ref(),
            self.mappings.as_ref(),
        )
        .await;

        if should_retry {
            match message.ack_with(AckKind::Nak(None)).await {
                Ok(()) => debug!(key = %entry.key, "NAKed change-feed message for redelivery"),
                Err(err) => {
                    error!(key = %entry.key, error = %err, "failed to NAK change-feed message");
                },
            }
        } else if let Err(err) = message.ack().await {
            error!(key = %entry.key, error = %err, "failed to acknowledge change-feed message");
        }
    }

    /// Stops consumption and drains the connection. Safe to call whether or
    /// not [`Self::run`] ever started, and after it returned.
    pub async fn stop(&self) {
        info!("stopping event processor");
        self.shutdown.store(true, Ordering::Relaxed);

        if let Err(err) = self.client.drain().await {
            error!(error = %err, "error draining NATS connection");
        }

        info!("event processor stopped");
    }
}
