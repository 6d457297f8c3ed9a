//! Outbound message shapes for the search indexer and the access-control
//! sync, plus the pure builders that derive them from transformed records.
//!
//! Two messages go out per entity change: an indexing envelope and an
//! access-control message. Deletes use reduced shapes: the indexing
//! envelope carries only the bare identifier (the config block stays, so
//! the indexer can locate and retire the document), and the access message
//! is an unconditional `delete_access`. Everything here is pure data
//! construction; actual publishing lives behind
//! [`crate::publisher::EventPublisher`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ProcessingContext;
use crate::kind::EntityKind;
use crate::response::SurveyResponseRecord;
use crate::survey::SurveyRecord;

/// Action tag carried by indexing envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageAction {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for MessageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        };
        f.write_str(tag)
    }
}

/// Indexing instructions attached to every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub object_id: String,
    pub access_check_object: String,
    pub access_check_relation: String,
    pub history_check_object: String,
    pub history_check_relation: String,
    pub sort_name: String,
    pub name_and_aliases: Vec<String>,
    pub parent_refs: Vec<String>,
    pub fulltext: String,
    /// Set (to `false`) on create/update envelopes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

/// The message published to an indexing subject.
#[derive(Debug, Clone, Serialize)]
pub struct IndexingEnvelope {
    pub action: MessageAction,
    pub headers: HashMap<String, String>,
    /// Full record for create/update; bare uid string for delete.
    pub data: Value,
    pub indexing_config: IndexingConfig,
}

/// Operation tag on access-control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOperation {
    UpdateAccess,
    DeleteAccess,
}

/// Data block of an access-control message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessData {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    /// Subject role -> subject identifiers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relations: Option<BTreeMap<String, Vec<String>>>,
    /// Parent object type -> parent identifiers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<BTreeMap<String, Vec<String>>>,
}

/// The message published to an access-control subject.
#[derive(Debug, Clone, Serialize)]
pub struct AccessMessage {
    pub object_type: &'static str,
    pub operation: AccessOperation,
    pub data: AccessData,
}

/// Builds the indexing config for a survey.
#[must_use]
pub fn survey_indexing_config(record: &SurveyRecord) -> IndexingConfig {
    let mut name_and_aliases = Vec::new();
    if !record.survey_title.is_empty() {
        name_and_aliases.push(record.survey_title.clone());
    }

    let mut parent_refs: Vec<String> = Vec::new();
    for link in &record.committees {
        if let Some(uid) = link.committee.resolved() {
            let committee_ref = format!("committee:{uid}");
            if !parent_refs.contains(&committee_ref) {
                parent_refs.push(committee_ref);
            }
        }
        if let Some(uid) = link.project.resolved() {
            let project_ref = format!("project:{uid}");
            if !parent_refs.contains(&project_ref) {
                parent_refs.push(project_ref);
            }
        }
    }

    IndexingConfig {
        object_id: record.uid.clone(),
        access_check_object: format!("survey:{}", record.uid),
        access_check_relation: "viewer".to_string(),
        history_check_object: format!("survey:{}", record.uid),
        history_check_relation: "auditor".to_string(),
        sort_name: record.survey_title.clone(),
        name_and_aliases,
        parent_refs,
        fulltext: record.survey_title.clone(),
        public: None,
    }
}

/// Builds the indexing config for a survey response.
#[must_use]
pub fn response_indexing_config(record: &SurveyResponseRecord) -> IndexingConfig {
    let mut name_and_aliases = Vec::new();
    if !record.email.is_empty() {
        name_and_aliases.push(record.email.clone());
    }

    let mut parent_refs = Vec::new();
    if let Some(uid) = record.project.ids.resolved() {
        parent_refs.push(format!("project:{uid}"));
    }
    if let Some(uid) = record.survey.uid.as_deref().filter(|uid| !uid.is_empty()) {
        parent_refs.push(format!("survey:{uid}"));
    }

    let survey_uid = record.survey.uid.clone().unwrap_or_default();

    IndexingConfig {
        object_id: record.uid.clone(),
        access_check_object: format!("survey:{survey_uid}"),
        access_check_relation: "viewer".to_string(),
        history_check_object: format!("survey_response:{}", record.uid),
        history_check_relation: "auditor".to_string(),
        sort_name: record.email.clone(),
        name_and_aliases,
        parent_refs,
        fulltext: format!(
            "{} {} {}",
            record.email, record.first_name, record.last_name
        ),
        public: None,
    }
}

/// Assembles an indexing envelope around a prebuilt config.
///
/// For deletes the data block is the bare identifier; otherwise it is the
/// serialized record and the config is marked non-public.
///
/// # Errors
///
/// Returns a serialization error if the record cannot be encoded, which
/// rejects the publish as permanent.
pub fn indexing_envelope<T: Serialize>(
    ctx: &ProcessingContext,
    action: MessageAction,
    uid: &str,
    record: &T,
    mut config: IndexingConfig,
) -> Result<IndexingEnvelope, serde_json::Error> {
    let data = if action == MessageAction::Deleted {
        Value::String(uid.to_string())
    } else {
        config.public = Some(false);
        serde_json::to_value(record)?
    };

    Ok(IndexingEnvelope {
        action,
        headers: ctx.message_headers(),
        data,
        indexing_config: config,
    })
}

/// Builds the access-control update for a survey, or `None` when there are
/// no resolved references at all; in that case the message is skipped
/// entirely, not published empty.
#[must_use]
pub fn survey_update_access(record: &SurveyRecord) -> Option<AccessMessage> {
    let mut references = BTreeMap::new();
    let committees = record.resolved_committee_uids();
    if !committees.is_empty() {
        references.insert(
            "committee".to_string(),
            committees.iter().map(|uid| (*uid).to_string()).collect(),
        );
    }
    let projects = record.resolved_project_uids();
    if !projects.is_empty() {
        references.insert(
            "project".to_string(),
            projects.iter().map(|uid| (*uid).to_string()).collect(),
        );
    }

    if references.is_empty() {
        return None;
    }

    Some(AccessMessage {
        object_type: EntityKind::Survey.object_type(),
        operation: AccessOperation::UpdateAccess,
        data: AccessData {
            uid: record.uid.clone(),
            public: Some(false),
            relations: None,
            references: Some(references),
        },
    })
}

/// Builds the access-control update for a survey response, or `None` when
/// both the relations and the references would be empty.
#[must_use]
pub fn response_update_access(record: &SurveyResponseRecord) -> Option<AccessMessage> {
    let mut relations = BTreeMap::new();
    if !record.username.is_empty() {
        relations.insert("writer".to_string(), vec![record.username.clone()]);
        relations.insert("viewer".to_string(), vec![record.username.clone()]);
    }

    let mut references = BTreeMap::new();
    if let Some(uid) = record.project.ids.resolved() {
        references.insert("project".to_string(), vec![uid.to_string()]);
    }
    if let Some(uid) = record.survey.uid.as_deref().filter(|uid| !uid.is_empty()) {
        references.insert("survey".to_string(), vec![uid.to_string()]);
    }

    if relations.is_empty() && references.is_empty() {
        return None;
    }

    Some(AccessMessage {
        object_type: EntityKind::SurveyResponse.object_type(),
        operation: AccessOperation::UpdateAccess,
        data: AccessData {
            uid: record.uid.clone(),
            public: Some(false),
            relations: Some(relations),
            references: Some(references),
        },
    })
}

/// Builds the unconditional access-control delete for an entity.
#[must_use]
pub fn delete_access(kind: EntityKind, uid: &str) -> AccessMessage {
    AccessMessage {
        object_type: kind.object_type(),
        operation: AccessOperation::DeleteAccess,
        data: AccessData {
            uid: uid.to_string(),
            ..AccessData::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mapper::DualId;
    use crate::survey::CommitteeLink;

    fn survey_with_links(links: Vec<(Option<&str>, Option<&str>)>) -> SurveyRecord {
        SurveyRecord {
            uid: "s1".to_string(),
            id: "s1".to_string(),
            survey_title: "Q1".to_string(),
            committees: links
                .into_iter()
                .map(|(committee, project)| CommitteeLink {
                    committee: DualId {
                        id: Some("c".to_string()),
                        uid: committee.map(str::to_string),
                    },
                    project: DualId {
                        id: Some("p".to_string()),
                        uid: project.map(str::to_string),
                    },
                    ..CommitteeLink::default()
                })
                .collect(),
            ..SurveyRecord::default()
        }
    }

    #[test]
    fn survey_parent_refs_are_prefixed_and_deduplicated() {
        let record = survey_with_links(vec![
            (Some("C1"), Some("P1")),
            (Some("C2"), Some("P1")),
            (Some("C1"), None),
        ]);
        let config = survey_indexing_config(&record);
        assert_eq!(
            config.parent_refs,
            vec!["committee:C1", "project:P1", "committee:C2"]
        );
        assert_eq!(config.name_and_aliases, vec!["Q1"]);
        assert_eq!(config.access_check_object, "survey:s1");
        assert_eq!(config.history_check_relation, "auditor");
    }

    #[test]
    fn create_envelope_carries_record_and_private_flag() {
        let record = survey_with_links(vec![(Some("C1"), None)]);
        let envelope = indexing_envelope(
            &ProcessingContext::default(),
            MessageAction::Created,
            &record.uid,
            &record,
            survey_indexing_config(&record),
        )
        .expect("envelope");

        assert_eq!(envelope.action, MessageAction::Created);
        assert_eq!(envelope.indexing_config.public, Some(false));
        assert_eq!(envelope.data.get("uid"), Some(&json!("s1")));
        assert_eq!(
            envelope.headers.get("authorization").map(String::as_str),
            Some(crate::context::SERVICE_IDENTITY_TOKEN)
        );
    }

    #[test]
    fn delete_envelope_carries_bare_uid_only() {
        let record = SurveyRecord::minimal("s1");
        let envelope = indexing_envelope(
            &ProcessingContext::default(),
            MessageAction::Deleted,
            &record.uid,
            &record,
            survey_indexing_config(&record),
        )
        .expect("envelope");

        assert_eq!(envelope.data, json!("s1"));
        // The config block still identifies the document to retire.
        assert_eq!(envelope.indexing_config.object_id, "s1");
        assert_eq!(envelope.indexing_config.public, None);
    }

    #[test]
    fn survey_access_lists_distinct_reference_uids() {
        let record = survey_with_links(vec![
            (Some("C1"), Some("P1")),
            (Some("C2"), Some("P1")),
        ]);
        let message = survey_update_access(&record).expect("references exist");
        assert_eq!(message.object_type, "survey");
        assert_eq!(message.operation, AccessOperation::UpdateAccess);
        let references = message.data.references.expect("references");
        assert_eq!(references["committee"], vec!["C1", "C2"]);
        assert_eq!(references["project"], vec!["P1"]);
        assert_eq!(message.data.public, Some(false));
    }

    #[test]
    fn survey_access_is_skipped_without_references() {
        let record = survey_with_links(vec![(None, None)]);
        assert!(survey_update_access(&record).is_none());
    }

    #[test]
    fn response_access_grants_writer_and_viewer() {
        let record = SurveyResponseRecord {
            uid: "r1".to_string(),
            username: "jdoe".to_string(),
            survey: DualId {
                id: Some("s1".to_string()),
                uid: Some("s1".to_string()),
            },
            project: crate::response::ProjectRef {
                ids: DualId {
                    id: Some("p1".to_string()),
                    uid: Some("P1".to_string()),
                },
                name: "Proj".to_string(),
            },
            ..SurveyResponseRecord::default()
        };

        let message = response_update_access(&record).expect("non-empty");
        let relations = message.data.relations.expect("relations");
        assert_eq!(relations["writer"], vec!["jdoe"]);
        assert_eq!(relations["viewer"], vec!["jdoe"]);
        let references = message.data.references.expect("references");
        assert_eq!(references["project"], vec!["P1"]);
        assert_eq!(references["survey"], vec!["s1"]);
    }

    #[test]
    fn response_access_skipped_when_fully_empty() {
        let record = SurveyResponseRecord::minimal("r1");
        assert!(response_update_access(&record).is_none());
    }

    #[test]
    fn response_access_kept_when_only_relations_exist() {
        let record = SurveyResponseRecord {
            username: "jdoe".to_string(),
            ..SurveyResponseRecord::minimal("r1")
        };
        let message = response_update_access(&record).expect("relations only");
        assert!(message.data.references.expect("references").is_empty());
    }

    #[test]
    fn delete_access_has_no_skip_condition() {
        let message = delete_access(EntityKind::SurveyResponse, "never-seen");
        assert_eq!(message.operation, AccessOperation::DeleteAccess);
        let encoded = serde_json::to_value(&message).expect("serializes");
        assert_eq!(
            encoded,
            json!({
                "object_type": "survey_response",
                "operation": "delete_access",
                "data": {"uid": "never-seen"}
            })
        );
    }
}
