//! Release workflow: status transitions, release-version derivation, answer
//! versioning and progress calculation.

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::models::{
    Answer, InstanceStatus, Question, QuestionnaireInstance, QuestionnaireType,
};

/// Transition table for participant-facing questionnaires. Releases are
/// capped at two; after `released_twice` nothing moves.
pub fn is_allowed_transition_for_proband(from: InstanceStatus, to: InstanceStatus) -> bool {
    use InstanceStatus::*;
    match from {
        Inactive => to == Active,
        Active => to == InProgress || to == ReleasedOnce,
        InProgress => to == ReleasedOnce || to == InProgress,
        ReleasedOnce => to == ReleasedTwice,
        _ => false,
    }
}

/// Transition table for research-team questionnaires. `released` repeats.
pub fn is_allowed_transition_for_researcher(from: InstanceStatus, to: InstanceStatus) -> bool {
    use InstanceStatus::*;
    match from {
        Active => to == InProgress || to == Released,
        InProgress => to == Released || to == InProgress,
        Released => to == Released,
        _ => false,
    }
}

pub fn is_allowed_transition(
    instance: &QuestionnaireInstance,
    new_status: InstanceStatus,
) -> bool {
    match instance.questionnaire.questionnaire_type {
        QuestionnaireType::ForProbands => {
            is_allowed_transition_for_proband(instance.status, new_status)
        }
        QuestionnaireType::ForResearchTeam => {
            is_allowed_transition_for_researcher(instance.status, new_status)
        }
    }
}

/// Release version the instance carries after a status-changing write.
/// Proband releases are fixed at 1 and 2; research-team releases count up
/// without bound. Returns an error before anything is persisted when the
/// transition itself is illegal.
pub fn determine_release_version(
    instance: &QuestionnaireInstance,
    new_status: InstanceStatus,
) -> Result<i32, EngineError> {
    if !is_allowed_transition(instance, new_status) {
        return Err(EngineError::invalid_transition(instance.status, new_status));
    }

    Ok(match (instance.questionnaire.questionnaire_type, new_status) {
        (QuestionnaireType::ForProbands, InstanceStatus::ReleasedOnce) => 1,
        (QuestionnaireType::ForProbands, InstanceStatus::ReleasedTwice) => 2,
        (QuestionnaireType::ForResearchTeam, InstanceStatus::Released) => {
            instance.release_version + 1
        }
        _ => 0,
    })
}

/// True when the instance status permits creating or updating answers.
pub fn status_allows_answer_writes(status: InstanceStatus) -> bool {
    matches!(
        status,
        InstanceStatus::Active
            | InstanceStatus::InProgress
            | InstanceStatus::ReleasedOnce
            | InstanceStatus::Released
    )
}

/// Version for the next write of one answer.
///
/// Before any release, writes keep overwriting version 1. Once the instance
/// is in a released state and the stored answer's version equals the
/// instance's release version, an edit must not touch the released revision:
/// it moves to the next version and keeps the audit trail intact. Version 0
/// is never persisted; everything floors at 1.
pub fn determine_answer_version(
    instance: &QuestionnaireInstance,
    existing: Option<&Answer>,
) -> Result<i32, EngineError> {
    let current = existing
        .map(|a| a.versioning)
        .unwrap_or(instance.release_version);
    let floored = current.max(1);

    match instance.status {
        InstanceStatus::Active | InstanceStatus::InProgress => Ok(floored),
        InstanceStatus::ReleasedOnce | InstanceStatus::Released => {
            if instance.release_version == current {
                Ok(current + 1)
            } else {
                Ok(floored)
            }
        }
        status => Err(EngineError::AnswersNotWritable { status }),
    }
}

/// `date_of_release` is stamped once per answer row and preserved on updates
/// to the same version.
pub fn determine_answer_release_date(
    existing: Option<&Answer>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    existing
        .and_then(|a| a.date_of_release)
        .unwrap_or(now)
}

/// The answer version a progress lookup must read. Participants cannot edit
/// past the second release, so `released_twice` pins the lookup at 2.
pub fn next_release_version(instance: &QuestionnaireInstance) -> i32 {
    if instance.status == InstanceStatus::ReleasedTwice {
        2
    } else {
        instance.release_version + 1
    }
}

/// Percentage of visible answer options answered with a non-empty value.
///
/// `visible_questions` is the already-filtered question set; `answers` are
/// the instance's rows at [`next_release_version`]. An instance whose
/// filtering removed every question has nothing left to answer and counts as
/// complete.
pub fn calculate_progress(visible_questions: &[Question], answers: &[Answer]) -> i32 {
    if visible_questions.is_empty() {
        return 100;
    }

    let total: usize = visible_questions
        .iter()
        .map(|q| q.answer_options.len())
        .sum();
    if total == 0 {
        return 100;
    }

    let completed = visible_questions
        .iter()
        .flat_map(|q| &q.answer_options)
        .filter(|option| {
            answers
                .iter()
                .any(|a| a.answer_option_id == option.id && !a.value.is_empty())
        })
        .count();

    (completed as f64 / total as f64 * 100.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proband_cannot_release_unversioned() {
        use InstanceStatus::*;
        assert!(!is_allowed_transition_for_proband(Active, Released));
        assert!(is_allowed_transition_for_proband(Active, ReleasedOnce));
        assert!(is_allowed_transition_for_proband(ReleasedOnce, ReleasedTwice));
        assert!(!is_allowed_transition_for_proband(ReleasedTwice, ReleasedTwice));
    }

    #[test]
    fn researcher_release_repeats() {
        use InstanceStatus::*;
        assert!(is_allowed_transition_for_researcher(Active, Released));
        assert!(is_allowed_transition_for_researcher(Released, Released));
        assert!(!is_allowed_transition_for_researcher(Active, ReleasedOnce));
    }
}
