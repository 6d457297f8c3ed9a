//! NATS request/reply implementation of the identifier-mapper seam.
//!
//! Lookups go to the v1-sync-helper service over a single subject. The
//! request payload is a dotted lookup key (`project.sfid.<v1_id>`,
//! `committee.uid.<v2_uid>`, ...) and the reply payload is the mapped
//! identifier. The reply protocol distinguishes three outcomes: an
//! `error: ` prefix (service-side failure), an empty body (no mapping for
//! the id), and anything else (the answer).

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use survey_sync_core::mapper::{IdMapper, MapperError};

/// Lookup subject served by the v1-sync-helper service.
pub const LOOKUP_SUBJECT: &str = "lfx.lookup_v1_mapping";

/// NATS-backed [`IdMapper`].
///
/// Each lookup blocks the processing pass for at most the configured
/// timeout. The client is cheap to clone and safe for concurrent use, so
/// one mapper is shared by every handler.
pub struct NatsIdMapper {
    client: async_nats::Client,
    timeout: Duration,
}

impl NatsIdMapper {
    /// Creates a mapper over an established connection.
    #[must_use]
    pub fn new(client: async_nats::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn lookup(&self, key: String) -> Result<String, MapperError> {
        let request = self
            .client
            .request(LOOKUP_SUBJECT.to_string(), Bytes::from(key.clone().into_bytes()));

        let message = match tokio::time::timeout(self.timeout, request).await {
            Err(_) => {
                return Err(MapperError::Unavailable {
                    reason: format!("lookup timed out after {:?}", self.timeout),
                });
            },
            Ok(Err(err)) => {
                return Err(MapperError::Unavailable {
                    reason: err.to_string(),
                });
            },
            Ok(Ok(message)) => message,
        };

        let reply = String::from_utf8_lossy(&message.payload).into_owned();
        debug!(key = %key, reply_len = reply.len(), "mapping lookup answered");
        parse_lookup_reply(&key, &reply)
    }
}

/// Interprets one reply body per the v1-sync-helper protocol.
fn parse_lookup_reply(key: &str, reply: &str) -> Result<String, MapperError> {
    if let Some(message) = reply.strip_prefix("error: ") {
        return Err(MapperError::Unavailable {
            reason: format!("mapping service error: {message}"),
        });
    }
    if reply.is_empty() {
        return Err(MapperError::NotFound {
            key: key.to_string(),
        });
    }
    Ok(reply.to_string())
}

/// Extracts the committee part of a `<project_sfid>:<committee_sfid>`
/// reply. A reply with no colon is already the bare committee id.
fn split_committee_reply(reply: &str) -> Result<String, MapperError> {
    let parts: Vec<&str> = reply.split(':').collect();
    match parts.as_slice() {
        [bare] => Ok((*bare).to_string()),
        [_, committee] if !committee.is_empty() => Ok((*committee).to_string()),
        [_, _] => Err(MapperError::Unavailable {
            reason: "committee id is empty in mapping reply".to_string(),
        }),
        _ => Err(MapperError::Unavailable {
            reason: format!("unexpected committee mapping format: {reply}"),
        }),
    }
}

#[async_trait]
impl IdMapper for NatsIdMapper {
    async fn project_v1_to_v2(&self, v1_id: &str) -> Result<String, MapperError> {
        if v1_id.is_empty() {
            return Err(MapperError::InvalidInput("v1 project id is required".to_string()));
        }
        self.lookup(format!("project.sfid.{v1_id}")).await
    }

    async fn project_v2_to_v1(&self, v2_uid: &str) -> Result<String, MapperError> {
        if v2_uid.is_empty() {
            return Err(MapperError::InvalidInput("v2 project uid is required".to_string()));
        }
        self.lookup(format!("project.uid.{v2_uid}")).await
    }

    async fn committee_v1_to_v2(&self, v1_id: &str) -> Result<String, MapperError> {
        if v1_id.is_empty() {
            return Err(MapperError::InvalidInput("v1 committee id is required".to_string()));
        }
        self.lookup(format!("committee.sfid.{v1_id}")).await
    }

    async fn committee_v2_to_v1(&self, v2_uid: &str) -> Result<String, MapperError> {
        if v2_uid.is_empty() {
            return Err(MapperError::InvalidInput("v2 committee uid is required".to_string()));
        }
        let reply = self.lookup(format!("committee.uid.{v2_uid}")).await?;
        split_committee_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_value_passes_through() {
        assert_eq!(
            parse_lookup_reply("project.sfid.p1", "P1").expect("mapped"),
            "P1"
        );
    }

    #[test]
    fn empty_reply_is_not_found() {
        assert!(matches!(
            parse_lookup_reply("project.sfid.p9", ""),
            Err(MapperError::NotFound { .. })
        ));
    }

    #[test]
    fn error_reply_is_unavailable() {
        assert!(matches!(
            parse_lookup_reply("project.sfid.p1", "error: backend down"),
            Err(MapperError::Unavailable { .. })
        ));
    }

    #[test]
    fn committee_reply_keeps_committee_half() {
        assert_eq!(
            split_committee_reply("proj-sfid:comm-sfid").expect("split"),
            "comm-sfid"
        );
        assert_eq!(split_committee_reply("comm-sfid").expect("bare"), "comm-sfid");
    }

    #[test]
    fn malformed_committee_replies_are_unavailable() {
        assert!(matches!(
            split_committee_reply("a:b:c"),
            Err(MapperError::Unavailable { .. })
        ));
        assert!(matches!(
            split_committee_reply("proj-sfid:"),
            Err(MapperError::Unavailable { .. })
        ));
    }
}
