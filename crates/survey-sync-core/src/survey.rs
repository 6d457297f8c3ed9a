//! Survey record models.
//!
//! [`RawSurvey`] mirrors one row of the legacy store exactly as it arrives
//! on the change feed, tolerating the store's string-or-number encoding of
//! numeric columns. [`SurveyRecord`] is the strongly-typed v2 shape the
//! pipeline emits downstream. The transformation between the two lives in
//! [`crate::transform`].

use serde::{Deserialize, Serialize};

use crate::coerce;
use crate::mapper::DualId;

/// Net-promoter statistics block, shared by surveys and committee links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpsStats {
    pub nps_value: i64,
    pub num_promoters: i64,
    pub num_passives: i64,
    pub num_detractors: i64,
}

/// Delivery statistics block, shared by surveys and committee links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub total_recipients: i64,
    pub total_recipients_sent: i64,
    pub total_responses: i64,
    pub total_recipients_opened: i64,
    pub total_recipients_clicked: i64,
    pub total_delivery_errors: i64,
}

/// A committee attached to a survey, with dual-generation identifiers for
/// the committee itself and its parent project.
///
/// An unresolved v2 identifier does not invalidate the link; the publisher
/// simply leaves it out of the outbound reference graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeLink {
    pub committee: DualId,
    #[serde(default)]
    pub committee_name: String,
    pub project: DualId,
    #[serde(default)]
    pub project_name: String,
    #[serde(flatten)]
    pub nps: NpsStats,
    #[serde(flatten)]
    pub delivery: DeliveryStats,
}

impl CommitteeLink {
    /// Whether the link can anchor the survey to the v2 reference graph.
    #[must_use]
    pub fn has_resolved_parent(&self) -> bool {
        self.committee.is_resolved() || self.project.is_resolved()
    }
}

/// The v2 survey record emitted to the indexer and access-control sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyRecord {
    /// v2 identifier; carried over from the legacy id.
    pub uid: String,
    /// Legacy (v1) identifier.
    pub id: String,
    #[serde(default)]
    pub survey_monkey_id: String,
    #[serde(default)]
    pub is_project_survey: bool,
    #[serde(default)]
    pub stage_filter: String,
    #[serde(default)]
    pub creator_username: String,
    #[serde(default)]
    pub creator_name: String,
    #[serde(default)]
    pub creator_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_modified_at: String,
    #[serde(default)]
    pub last_modified_by: String,
    #[serde(default)]
    pub survey_title: String,
    #[serde(default)]
    pub survey_send_date: String,
    #[serde(default)]
    pub survey_cutoff_date: String,
    #[serde(default)]
    pub survey_reminder_rate_days: i64,
    #[serde(default)]
    pub send_immediately: bool,
    #[serde(default)]
    pub email_subject: String,
    #[serde(default)]
    pub email_body: String,
    #[serde(default)]
    pub email_body_text: String,
    #[serde(default)]
    pub committee_category: String,
    #[serde(default)]
    pub committees: Vec<CommitteeLink>,
    #[serde(default)]
    pub committee_voting_enabled: bool,
    #[serde(default)]
    pub survey_status: String,
    #[serde(flatten)]
    pub nps: NpsStats,
    #[serde(flatten)]
    pub delivery: DeliveryStats,
    #[serde(default)]
    pub is_nps_survey: bool,
    #[serde(default)]
    pub collector_url: String,
}

impl SurveyRecord {
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

    /// Whether at least one committee link anchors this survey to a
    /// resolved v2 committee or project. A survey with none is orphaned.
    #[must_use]
    pub fn has_resolvable_parent(&self) -> bool {
        self.committees.iter().any(CommitteeLink::has_resolved_parent)
    }

    /// Distinct resolved v2 committee uids, in first-seen order.
    #[must_use]
    pub fn resolved_committee_uids(&self) -> Vec<&str> {
        let mut uids = Vec::new();
        for link in &self.committees {
            if let Some(uid) = link.committee.resolved() {
                if !uids.contains(&uid) {
                    uids.push(uid);
                }
            }
        }
        uids
    }

    /// Distinct resolved v2 project uids, in first-seen order.
    #[must_use]
    pub fn resolved_project_uids(&self) -> Vec<&str> {
        let mut uids = Vec::new();
        for link in &self.committees {
            if let Some(uid) = link.project.resolved() {
                if !uids.contains(&uid) {
                    uids.push(uid);
                }
            }
        }
        uids
    }
}

/// One legacy survey row, decoded leniently.
///
/// Numeric columns may arrive as strings or numbers; see [`crate::coerce`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSurvey {
    pub id: String,
    pub survey_monkey_id: String,
    pub is_project_survey: bool,
    pub stage_filter: String,
    pub creator_username: String,
    pub creator_name: String,
    pub creator_id: String,
    pub created_at: String,
    pub last_modified_at: String,
    pub last_modified_by: String,
    pub survey_title: String,
    pub survey_send_date: String,
    pub survey_cutoff_date: String,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub survey_reminder_rate_days: i64,
    pub send_immediately: bool,
    pub email_subject: String,
    pub email_body: String,
    pub email_body_text: String,
    pub committee_category: String,
    pub committees: Vec<RawSurveyCommittee>,
    pub committee_voting_enabled: bool,
    pub survey_status: String,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub nps_value: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub num_promoters: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub num_passives: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub num_detractors: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_recipients: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_recipients_sent: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_responses: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_recipients_opened: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_recipients_clicked: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_delivery_errors: i64,
    pub is_nps_survey: bool,
    pub collector_url: String,
}

/// One legacy committee entry nested inside a survey row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSurveyCommittee {
    /// v1 committee id.
    pub committee_id: String,
    pub committee_name: String,
    /// v1 project id.
    pub project_id: String,
    pub project_name: String,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub nps_value: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub num_promoters: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub num_passives: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub num_detractors: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_recipients: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_recipients_sent: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_responses: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_recipients_opened: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_recipients_clicked: i64,
    #[serde(deserialize_with = "coerce::flexible_i64")]
    pub total_delivery_errors: i64,
}

impl RawSurveyCommittee {
    pub(crate) fn nps(&self) -> NpsStats {
        NpsStats {
            nps_value: self.nps_value,
            num_promoters: self.num_promoters,
            num_passives: self.num_passives,
            num_detractors: self.num_detractors,
        }
    }

    pub(crate) fn delivery(&self) -> DeliveryStats {
        DeliveryStats {
            total_recipients: self.total_recipients,
            total_recipients_sent: self.total_recipients_sent,
            total_responses: self.total_responses,
            total_recipients_opened: self.total_recipients_opened,
            total_recipients_clicked: self.total_recipients_clicked,
            total_delivery_errors: self.total_delivery_errors,
        }
    }
}
