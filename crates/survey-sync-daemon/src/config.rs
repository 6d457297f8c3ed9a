//! Daemon configuration.
//!
//! Deployment-style settings come from the environment with the same
//! defaults the service ships with; CLI flags in `main` override them.

use std::time::Duration;

/// Redelivery and flow-control settings for the durable consumer, plus the
/// NATS endpoints the daemon talks to.
#[derive(Debug, Clone)]
pub struct EventingConfig {
    /// NATS server URL.
    pub nats_url: String,
    /// Durable consumer name; shared by every instance of this service so
    /// the broker load-balances notifications across them.
    pub consumer_name: String,
    /// Backing stream of the legacy objects KV bucket.
    pub stream_name: String,
    /// Name of the legacy objects KV bucket (used to strip the subject
    /// prefix off incoming notifications).
    pub bucket: String,
    /// Subject filter within the stream.
    pub filter_subject: String,
    /// Maximum delivery attempts before the broker gives up on a message.
    pub max_deliver: i64,
    /// How long the broker waits for an ack before redelivering.
    pub ack_wait: Duration,
    /// Cap on unacknowledged in-flight notifications (backpressure).
    pub max_ack_pending: i64,
    /// KV bucket recording which entities were already published.
    pub mappings_bucket: String,
    /// Per-request timeout for identifier-mapper lookups.
    pub lookup_timeout: Duration,
}

impl Default for EventingConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://nats:4222".to_string(),
            consumer_name: "survey-sync-kv-consumer".to_string(),
            stream_name: "KV_v1-objects".to_string(),
            bucket: "v1-objects".to_string(),
            filter_subject: "$KV.v1-objects.>".to_string(),
            max_deliver: 3,
            ack_wait: Duration::from_secs(30),
            max_ack_pending: 1000,
            mappings_bucket: "v1-mappings".to_string(),
            lookup_timeout: Duration::from_secs(5),
        }
    }
}

impl EventingConfig {
    /// Loads the configuration from the environment, falling back to the
    /// defaults above for unset or empty variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            nats_url: env_or("NATS_URL", defaults.nats_url),
            consumer_name: env_or("EVENT_CONSUMER_NAME", defaults.consumer_name),
            stream_name: env_or("EVENT_STREAM_NAME", defaults.stream_name),
            bucket: env_or("EVENT_BUCKET", defaults.bucket),
            filter_subject: env_or("EVENT_FILTER_SUBJECT", defaults.filter_subject),
            max_deliver: defaults.max_deliver,
            ack_wait: defaults.ack_wait,
            max_ack_pending: defaults.max_ack_pending,
            mappings_bucket: defaults.mappings_bucket,
            lookup_timeout: defaults.lookup_timeout,
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_settings() {
        let config = EventingConfig::default();
        assert_eq!(config.stream_name, "KV_v1-objects");
        assert_eq!(config.filter_subject, "$KV.v1-objects.>");
        assert_eq!(config.max_deliver, 3);
        assert_eq!(config.ack_wait, Duration::from_secs(30));
        assert_eq!(config.max_ack_pending, 1000);
        assert_eq!(config.mappings_bucket, "v1-mappings");
    }
}
