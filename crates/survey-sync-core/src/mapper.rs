//! Identifier-mapper seam and the dual-generation identifier type.
//!
//! Almost every entity in this pipeline carries two identifiers: the legacy
//! Salesforce-style id it was born with, and the UUID-style id of its
//! current-generation counterpart. [`DualId`] models that pair once instead
//! of scattering optional-string pairs across the record types. The
//! [`IdMapper`] trait is the synchronous lookup seam to the external mapping
//! service; the production implementation lives in the daemon crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A legacy/current identifier pair.
///
/// `id` is the v1 identifier and is present whenever the source record had
/// one. `uid` is the v2 identifier and is present only when resolution
/// succeeded. An unresolved `uid` never invalidates the pair by itself;
/// whether it orphans the containing record is decided per entity kind by
/// the transformer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualId {
    /// Legacy (v1) identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Current-generation (v2) identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl DualId {
    /// Builds a pair from a legacy identifier, treating the empty string as
    /// absent (the legacy store does not distinguish the two).
    #[must_use]
    pub fn from_legacy(id: &str) -> Self {
        Self {
            id: (!id.is_empty()).then(|| id.to_string()),
            uid: None,
        }
    }

    /// The resolved v2 identifier, if resolution succeeded.
    #[must_use]
    pub fn resolved(&self) -> Option<&str> {
        self.uid.as_deref().filter(|uid| !uid.is_empty())
    }

    /// Whether the v2 side of the pair is known.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved().is_some()
    }
}

/// Errors from an identifier-mapper lookup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MapperError {
    /// The identifier has no mapping. This is a property of the data, not a
    /// service failure; callers treat the identifier as unresolvable.
    #[error("mapping not found for {key}")]
    NotFound {
        /// The lookup key that had no mapping.
        key: String,
    },

    /// The mapping service could not answer (timeout, transport failure, or
    /// an error reply).
    #[error("identifier mapping lookup unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },

    /// The caller supplied an unusable identifier (e.g. empty).
    #[error("invalid mapper input: {0}")]
    InvalidInput(String),
}

/// Synchronous lookup seam to the v1/v2 identifier mapping service.
///
/// Both directions are exposed for both entity kinds; the event pipeline
/// itself only resolves v1 -> v2, while the v2 -> v1 direction serves
/// callers that start from a current-generation identifier.
#[async_trait]
pub trait IdMapper: Send + Sync {
    /// Maps a v1 project id to its v2 uid.
    async fn project_v1_to_v2(&self, v1_id: &str) -> Result<String, MapperError>;

    /// Maps a v2 project uid back to its v1 id.
    async fn project_v2_to_v1(&self, v2_uid: &str) -> Result<String, MapperError>;

    /// Maps a v1 committee id to its v2 uid.
    async fn committee_v1_to_v2(&self, v1_id: &str) -> Result<String, MapperError>;

    /// Maps a v2 committee uid back to its v1 id.
    async fn committee_v2_to_v1(&self, v2_uid: &str) -> Result<String, MapperError>;
}

/// In-memory [`IdMapper`] backed by static tables.
///
/// Intended for tests and for running the pipeline with identifier mapping
/// disabled. Unknown identifiers report [`MapperError::NotFound`].
#[derive(Debug, Default)]
pub struct StaticIdMapper {
    projects: std::collections::HashMap<String, String>,
    committees: std::collections::HashMap<String, String>,
}

impl StaticIdMapper {
    /// Creates an empty mapper; every lookup is a miss.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a project v1 id -> v2 uid pair.
    #[must_use]
    pub fn with_project(mut self, v1_id: &str, v2_uid: &str) -> Self {
        self.projects.insert(v1_id.to_string(), v2_uid.to_string());
        self
    }

    /// Registers a committee v1 id -> v2 uid pair.
    #[must_use]
    pub fn with_committee(mut self, v1_id: &str, v2_uid: &str) -> Self {
        self.committees.insert(v1_id.to_string(), v2_uid.to_string());
        self
    }

    fn forward(table: &std::collections::HashMap<String, String>, id: &str, what: &str) -> Result<String, MapperError> {
        if id.is_empty() {
            return Err(MapperError::InvalidInput(format!("{what} id is required")));
        }
        table.get(id).cloned().ok_or_else(|| MapperError::NotFound {
            key: format!("{what}.{id}"),
        })
    }

    fn reverse(table: &std::collections::HashMap<String, String>, uid: &str, what: &str) -> Result<String, MapperError> {
        if uid.is_empty() {
            return Err(MapperError::InvalidInput(format!("{what} uid is required")));
        }
        table
            .iter()
            .find_map(|(v1, v2)| (v2 == uid).then(|| v1.clone()))
            .ok_or_else(|| MapperError::NotFound {
                key: format!("{what}.{uid}"),
            })
    }
}

#[async_trait]
impl IdMapper for StaticIdMapper {
    async fn project_v1_to_v2(&self, v1_id: &str) -> Result<String, MapperError> {
        Self::forward(&self.projects, v1_id, "project")
    }

    async fn project_v2_to_v1(&self, v2_uid: &str) -> Result<String, MapperError> {
        Self::reverse(&self.projects, v2_uid, "project")
    }

    async fn committee_v1_to_v2(&self, v1_id: &str) -> Result<String, MapperError> {
        Self::forward(&self.committees, v1_id, "committee")
    }

    async fn committee_v2_to_v1(&self, v2_uid: &str) -> Result<String, MapperError> {
        Self::reverse(&self.committees, v2_uid, "committee")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_legacy_treats_empty_as_absent() {
        assert_eq!(DualId::from_legacy(""), DualId::default());
        let pair = DualId::from_legacy("abc123");
        assert_eq!(pair.id.as_deref(), Some("abc123"));
        assert!(!pair.is_resolved());
    }

    #[test]
    fn resolved_ignores_empty_uid() {
        let pair = DualId {
            id: Some("abc".to_string()),
            uid: Some(String::new()),
        };
        assert!(!pair.is_resolved());
    }

    #[tokio::test]
    async fn static_mapper_round_trips() {
        let mapper = StaticIdMapper::new().with_project("p1", "P1");
        assert_eq!(mapper.project_v1_to_v2("p1").await.expect("forward"), "P1");
        assert_eq!(mapper.project_v2_to_v1("P1").await.expect("reverse"), "p1");
        assert!(matches!(
            mapper.project_v1_to_v2("p2").await,
            Err(MapperError::NotFound { .. })
        ));
        assert!(matches!(
            mapper.project_v1_to_v2("").await,
            Err(MapperError::InvalidInput(_))
        ));
    }
}
