//! Survey response record models.
//!
//! Same split as [`crate::survey`]: [`RawSurveyResponse`] is the lenient
//! decode of one legacy row, [`SurveyResponseRecord`] is the v2 shape sent
//! downstream. The respondent's SurveyMonkey question/answer payload is
//! opaque pass-through data and is kept as raw JSON end to end.

use serde::{Deserialize, Serialize};

use crate::coerce;
use crate::mapper::DualId;

/// Organization the respondent belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizationRef {
    pub id: String,
    pub name: String,
}

/// The response's parent project: dual-generation identifiers plus name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    #[serde(flatten)]
    pub ids: DualId,
    #[serde(default)]
    pub name: String,
}

/// The v2 survey response record emitted to the indexer and access-control
/// sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponseRecord {
    /// v2 identifier; carried over from the legacy id.
    pub uid: String,
    /// Legacy (v1) identifier.
    pub id: String,
    /// Parent survey identifiers. Survey uids are shared across
    /// generations, so the v2 side is the v1 id verbatim.
    pub survey: DualId,
    #[serde(default)]
    pub survey_monkey_respondent_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub committee_member_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub response_datetime: String,
    #[serde(default)]
    pub last_received_time: String,
    #[serde(default)]
    pub num_automated_reminders_received: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub voting_status: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub membership_tier: String,
    #[serde(default)]
    pub organization: OrganizationRef,
    #[serde(default)]
    pub project: ProjectRef,
    /// Parent committee identifiers; resolution failure here is tolerated.
    pub committee: DualId,
    #[serde(default)]
    pub committee_voting_enabled: bool,
    #[serde(default)]
    pub survey_link: String,
    #[serde(default)]
    pub nps_value: i64,
    /// Verbatim respondent answers; never interpreted or transformed.
    #[serde(default)]
    pub survey_monkey_question_answers: serde_json::Value,
    #[serde(default)]
    pub ses_message_id: String,
    #[serde(default)]
    pub ses_bounce_type: String,
    #[serde(default)]
    pub ses_bounce_subtype: String,
    #[serde(default)]
    pub ses_bounce_diagnostic_code: String,
    #[serde(default)]
    pub ses_complaint_exists: bool,
    #[serde(default)]
    pub ses_complaint_type: String,
    #[serde(default)]
    pub ses_complaint_date: String,
    #[serde(default)]
    pub ses_delivery_successful: bool,
    #[serde(default)]
    pub email_opened_first_time: String,
    #[serde(default)]
    pub email_opened_last_time: String,
    #[serde(default)]
    pub link_clicked_first_time: String,
    #[serde(default)]
    pub link_clicked_last_time: String,
    #[serde(default)]
    pub excluded: bool,
}

impl SurveyResponseRecord {
    /// Minimal record used for delete events, where only the identifier is
    /// known.
    #[must_use]
    pub fn minimal(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            id: uid.to_string(),
            ..Self::default()
        }
    }

    /// Whether the mandatory parent project reference resolved. A response
    /// without one is orphaned.
    #[must_use]
    pub fn has_resolved_project(&self) -> bool {
        self.project.ids.is_resolved()
    }
}

/// One legacy survey response row, decoded leniently.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSurveyResponse {
    pub id: String,
    pub survey_id: String,
    pub survey_monkey_respondent_id: String,
    pub email: String,
    pub committee_member_id: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
    pub response_datetime: String,
    pub last_received_time: String,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub num_automated_reminders_received: i64,
    pub username: String,
    pub voting_status: String,
    pub role: String,
    pub job_title: String,
    pub membership_tier: String,
    pub organization: OrganizationRef,
    pub project: RawResponseProject,
    /// v1 committee id.
    pub committee_id: String,
    pub committee_voting_enabled: bool,
    pub survey_link: String,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub nps_value: i64,
    pub survey_monkey_question_answers: serde_json::Value,
    pub ses_message_id: String,
    pub ses_bounce_type: String,
    pub ses_bounce_subtype: String,
    pub ses_bounce_diagnostic_code: String,
    pub ses_complaint_exists: bool,
    pub ses_complaint_type: String,
    pub ses_complaint_date: String,
    pub ses_delivery_successful: bool,
    pub email_opened_first_time: String,
    pub email_opened_last_time: String,
    pub link_clicked_first_time: String,
    pub link_clicked_last_time: String,
    pub excluded: bool,
}

/// The raw project reference nested inside a legacy response row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawResponseProject {
    /// v1 project id.
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_response_accepts_string_and_number_fields() {
        let raw: RawSurveyResponse = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "survey_id": "s1",
            "email": "a@b.c",
            "num_automated_reminders_received": "2",
            "nps_value": 9,
            "project": {"id": "p1", "name": "Proj"},
            "survey_monkey_question_answers": [{"question_id": "q1"}]
        }))
        .expect("raw response decodes");

        assert_eq!(raw.num_automated_reminders_received, 2);
        assert_eq!(raw.nps_value, 9);
        assert_eq!(raw.project.id, "p1");
        assert!(raw.survey_monkey_question_answers.is_array());
    }

    #[test]
    fn question_answers_pass_through_untouched() {
        let payload = serde_json::json!([{
            "question_id": "q1",
            "question_text": "How likely...",
            "answers": [{"choice_id": "c9", "text": "10"}],
            "unknown_extra": {"nested": true}
        }]);
        let raw: RawSurveyResponse = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "survey_monkey_question_answers": payload.clone()
        }))
        .expect("raw response decodes");
        assert_eq!(raw.survey_monkey_question_answers, payload);
    }

    #[test]
    fn resolved_project_gate() {
        let mut record = SurveyResponseRecord::minimal("r1");
        assert!(!record.has_resolved_project());
        record.project.ids.uid = Some("P1".to_string());
        assert!(record.has_resolved_project());
    }
}
