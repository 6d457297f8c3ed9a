//! Legacy-to-current record transformation.
//!
//! Each transform decodes the untyped change-feed payload into the lenient
//! raw shape, copies it into the strongly-typed v2 record, resolves embedded
//! v1 identifiers through the [`IdMapper`], and applies the validity
//! invariants. A single identifier that fails to resolve is logged and left
//! unresolved; whether that orphans the record depends on the entity kind.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::mapper::{DualId, IdMapper};
use crate::response::{RawSurveyResponse, SurveyResponseRecord};
use crate::survey::{CommitteeLink, RawSurvey, SurveyRecord};

/// Why a legacy record could not be turned into a valid v2 record.
///
/// All variants are permanent: redelivering the same payload cannot change
/// the outcome, so callers acknowledge and drop.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The payload did not decode into the expected raw shape (including
    /// unparseable numeric fields).
    #[error("failed to decode legacy record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The record has no identifier; nothing downstream could address it.
    #[error("legacy record is missing an id")]
    MissingUid,

    /// The record has no resolvable parent reference. Expected for rows
    /// whose parents were never migrated; benign, not a defect.
    #[error("legacy record has no resolvable parent reference")]
    Orphaned,
}

/// Resolves one v1 identifier, leaving the v2 side unset on failure.
///
/// Resolution failures are warnings, not errors: the caller decides whether
/// the resulting gap orphans the record.
async fn resolve_v1<F>(field: &str, v1_id: &str, lookup: F) -> DualId
where
    F: std::future::Future<Output = Result<String, crate::mapper::MapperError>>,
{
    let mut pair = DualId::from_legacy(v1_id);
    if v1_id.is_empty() {
        return pair;
    }
    match lookup.await {
        Ok(uid) => {
            debug!(field, v1_id, v2_uid = %uid, "resolved v1 identifier");
            pair.uid = Some(uid);
        },
        Err(err) => {
            warn!(field, v1_id, error = %err, "failed to resolve v2 identifier");
        },
    }
    pair
}

/// Transforms one legacy survey row into a [`SurveyRecord`].
///
/// # Errors
///
/// Returns [`TransformError::Malformed`] when the payload does not decode,
/// [`TransformError::MissingUid`] when the row has no id, and
/// [`TransformError::Orphaned`] when no committee link resolved to either a
/// v2 committee or a v2 project.
pub async fn transform_survey(
    payload: Value,
    mapper: &dyn IdMapper,
) -> Result<SurveyRecord, TransformError> {
    let raw: RawSurvey = serde_json::from_value(payload)?;

    if raw.id.is_empty() {
        return Err(TransformError::MissingUid);
    }

    let mut record = SurveyRecord {
        uid: raw.id.clone(),
        id: raw.id,
        survey_monkey_id: raw.survey_monkey_id,
        is_project_survey: raw.is_project_survey,
        stage_filter: raw.stage_filter,
        creator_username: raw.creator_username,
        creator_name: raw.creator_name,
        creator_id: raw.creator_id,
        created_at: raw.created_at,
        last_modified_at: raw.last_modified_at,
        last_modified_by: raw.last_modified_by,
        survey_title: raw.survey_title,
        survey_send_date: raw.survey_send_date,
        survey_cutoff_date: raw.survey_cutoff_date,
        survey_reminder_rate_days: raw.survey_reminder_rate_days,
        send_immediately: raw.send_immediately,
        email_subject: raw.email_subject,
        email_body: raw.email_body,
        email_body_text: raw.email_body_text,
        committee_category: raw.committee_category,
        committees: Vec::with_capacity(raw.committees.len()),
        committee_voting_enabled: raw.committee_voting_enabled,
        survey_status: raw.survey_status,
        nps: crate::survey::NpsStats {
            nps_value: raw.nps_value,
            num_promoters: raw.num_promoters,
            num_passives: raw.num_passives,
            num_detractors: raw.num_detractors,
        },
        delivery: crate::survey::DeliveryStats {
            total_recipients: raw.total_recipients,
            total_recipients_sent: raw.total_recipients_sent,
            total_responses: raw.total_responses,
            total_recipients_opened: raw.total_recipients_opened,
            total_recipients_clicked: raw.total_recipients_clicked,
            total_delivery_errors: raw.total_delivery_errors,
        },
        is_nps_survey: raw.is_nps_survey,
        collector_url: raw.collector_url,
    };

    for committee in raw.committees {
        let link = CommitteeLink {
            committee: resolve_v1(
                "committee_id",
                &committee.committee_id,
                mapper.committee_v1_to_v2(&committee.committee_id),
            )
            .await,
            committee_name: committee.committee_name.clone(),
            project: resolve_v1(
                "project_id",
                &committee.project_id,
                mapper.project_v1_to_v2(&committee.project_id),
            )
            .await,
            project_name: committee.project_name.clone(),
            nps: committee.nps(),
            delivery: committee.delivery(),
        };
        record.committees.push(link);
    }

    if !record.has_resolvable_parent() {
        return Err(TransformError::Orphaned);
    }

    Ok(record)
}

/// Transforms one legacy survey response row into a
/// [`SurveyResponseRecord`].
///
/// Unlike committees within surveys, a response's parent **project** is
/// mandatory: when its identifier fails to resolve the response is
/// [`TransformError::Orphaned`]. Committee resolution failure alone is
/// tolerated.
///
/// # Errors
///
/// See [`transform_survey`]; the orphan rule here keys on the project.
pub async fn transform_survey_response(
    payload: Value,
    mapper: &dyn IdMapper,
) -> Result<SurveyResponseRecord, TransformError> {
    let raw: RawSurveyResponse = serde_json::from_value(payload)?;

    if raw.id.is_empty() {
        return Err(TransformError::MissingUid);
    }

    let mut record = SurveyResponseRecord {
        uid: raw.id.clone(),
        id: raw.id,
        // Survey uids carry across generations unchanged.
        survey: DualId {
            id: (!raw.survey_id.is_empty()).then(|| raw.survey_id.clone()),
            uid: (!raw.survey_id.is_empty()).then(|| raw.survey_id.clone()),
        },
        survey_monkey_respondent_id: raw.survey_monkey_respondent_id,
        email: raw.email,
        committee_member_id: raw.committee_member_id,
        first_name: raw.first_name,
        last_name: raw.last_name,
        created_at: raw.created_at,
        response_datetime: raw.response_datetime,
        last_received_time: raw.last_received_time,
        num_automated_reminders_received: raw.num_automated_reminders_received,
        username: raw.username,
        voting_status: raw.voting_status,
        role: raw.role,
        job_title: raw.job_title,
        membership_tier: raw.membership_tier,
        organization: raw.organization,
        project: crate::response::ProjectRef {
            ids: DualId::from_legacy(&raw.project.id),
            name: raw.project.name.clone(),
        },
        committee: DualId::from_legacy(&raw.committee_id),
        committee_voting_enabled: raw.committee_voting_enabled,
        survey_link: raw.survey_link,
        nps_value: raw.nps_value,
        survey_monkey_question_answers: raw.survey_monkey_question_answers,
        ses_message_id: raw.ses_message_id,
        ses_bounce_type: raw.ses_bounce_type,
        ses_bounce_subtype: raw.ses_bounce_subtype,
        ses_bounce_diagnostic_code: raw.ses_bounce_diagnostic_code,
        ses_complaint_exists: raw.ses_complaint_exists,
        ses_complaint_type: raw.ses_complaint_type,
        ses_complaint_date: raw.ses_complaint_date,
        ses_delivery_successful: raw.ses_delivery_successful,
        email_opened_first_time: raw.email_opened_first_time,
        email_opened_last_time: raw.email_opened_last_time,
        link_clicked_first_time: raw.link_clicked_first_time,
        link_clicked_last_time: raw.link_clicked_last_time,
        excluded: raw.excluded,
    };

    record.project.ids = resolve_v1(
        "project.id",
        &raw.project.id,
        mapper.project_v1_to_v2(&raw.project.id),
    )
    .await;
    record.committee = resolve_v1(
        "committee_id",
        &raw.committee_id,
        mapper.committee_v1_to_v2(&raw.committee_id),
    )
    .await;

    if !record.has_resolved_project() {
        return Err(TransformError::Orphaned);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mapper::StaticIdMapper;

    fn mapper() -> StaticIdMapper {
        StaticIdMapper::new()
            .with_committee("c1", "C1")
            .with_project("p1", "P1")
    }

    #[tokio::test]
    async fn survey_example_transforms_end_to_end() {
        let payload = json!({
            "id": "s1",
            "survey_title": "Q1",
            "nps_value": "8",
            "committees": [{"committee_id": "c1", "project_id": "p1"}]
        });

        let record = transform_survey(payload, &mapper()).await.expect("valid survey");

        assert_eq!(record.uid, "s1");
        assert_eq!(record.nps.nps_value, 8);
        assert_eq!(record.committees.len(), 1);
        let link = &record.committees[0];
        assert_eq!(link.committee.id.as_deref(), Some("c1"));
        assert_eq!(link.committee.uid.as_deref(), Some("C1"));
        assert_eq!(link.project.uid.as_deref(), Some("P1"));
    }

    #[tokio::test]
    async fn survey_without_id_is_rejected() {
        let payload = json!({"survey_title": "Q1", "committees": [{"committee_id": "c1"}]});
        assert!(matches!(
            transform_survey(payload, &mapper()).await,
            Err(TransformError::MissingUid)
        ));
    }

    #[tokio::test]
    async fn survey_with_no_resolved_links_is_orphaned() {
        // Both identifiers miss the mapping tables, however many links there
        // are.
        let payload = json!({
            "id": "s1",
            "committees": [
                {"committee_id": "c9", "project_id": "p9"},
                {"committee_id": "c8", "project_id": "p8"}
            ]
        });
        assert!(matches!(
            transform_survey(payload, &mapper()).await,
            Err(TransformError::Orphaned)
        ));
    }

    #[tokio::test]
    async fn survey_with_no_committees_is_orphaned() {
        let payload = json!({"id": "s1"});
        assert!(matches!(
            transform_survey(payload, &mapper()).await,
            Err(TransformError::Orphaned)
        ));
    }

    #[tokio::test]
    async fn survey_single_resolution_failure_is_tolerated() {
        // Committee misses, project resolves: the link still anchors the
        // survey.
        let payload = json!({
            "id": "s1",
            "committees": [{"committee_id": "c9", "project_id": "p1"}]
        });
        let record = transform_survey(payload, &mapper()).await.expect("valid survey");
        let link = &record.committees[0];
        assert_eq!(link.committee.uid, None);
        assert_eq!(link.project.uid.as_deref(), Some("P1"));
    }

    #[tokio::test]
    async fn survey_with_unparseable_numeric_is_malformed() {
        let payload = json!({
            "id": "s1",
            "nps_value": "not-a-number",
            "committees": [{"committee_id": "c1"}]
        });
        assert!(matches!(
            transform_survey(payload, &mapper()).await,
            Err(TransformError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn response_requires_resolved_project() {
        // Committee resolves but the project does not: orphaned.
        let payload = json!({
            "id": "r1",
            "survey_id": "s1",
            "committee_id": "c1",
            "project": {"id": "p9", "name": "Unknown"}
        });
        assert!(matches!(
            transform_survey_response(payload, &mapper()).await,
            Err(TransformError::Orphaned)
        ));
    }

    #[tokio::test]
    async fn response_tolerates_unresolved_committee() {
        let payload = json!({
            "id": "r1",
            "survey_id": "s1",
            "committee_id": "c9",
            "project": {"id": "p1", "name": "Proj"},
            "nps_value": "10",
            "num_automated_reminders_received": 3
        });
        let record = transform_survey_response(payload, &mapper())
            .await
            .expect("valid response");

        assert_eq!(record.uid, "r1");
        assert_eq!(record.survey.uid.as_deref(), Some("s1"));
        assert_eq!(record.project.ids.uid.as_deref(), Some("P1"));
        assert_eq!(record.committee.id.as_deref(), Some("c9"));
        assert_eq!(record.committee.uid, None);
        assert_eq!(record.nps_value, 10);
        assert_eq!(record.num_automated_reminders_received, 3);
    }

    #[tokio::test]
    async fn response_answers_survive_transformation_verbatim() {
        let answers = json!([{"question_id": "q1", "answers": [{"text": "10"}]}]);
        let payload = json!({
            "id": "r1",
            "project": {"id": "p1"},
            "survey_monkey_question_answers": answers.clone()
        });
        let record = transform_survey_response(payload, &mapper())
            .await
            .expect("valid response");
        assert_eq!(record.survey_monkey_question_answers, answers);
    }
}
