//! Visibility filtering of a loaded questionnaire instance.
//!
//! Conditions referencing other instances (`EXTERNAL`, `INTERNAL_LAST`) are
//! resolved against batch-loaded answers of record; conditions referencing
//! the same instance (`INTERNAL_THIS`) are resolved structurally by
//! [`QuestionCleaner`]. The result is a pure function of the loaded snapshot:
//! filtering twice yields the same tree.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    AnswerType, Condition, ConditionType, Question, QuestionnaireInstance,
};

use super::condition_checker::is_condition_met;
use super::question_cleaner::QuestionCleaner;

/// A condition target's answer of record, joined with its answer type.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetAnswer {
    pub answer_option_id: i64,
    pub value: String,
    pub answer_type: AnswerType,
}

/// Read port for condition target answers. Implementations must return rows
/// ordered by `(answer_option_id, versioning DESC)` so that the first row per
/// answer option is the latest revision.
#[async_trait]
pub trait TargetAnswerSource: Send + Sync {
    /// Latest released answers for the given answer options among instances
    /// of *other* questionnaires of the same participant, restricted to
    /// releases at or before `released_until`.
    async fn external_target_answers(
        &self,
        pseudonym: &str,
        answer_option_ids: &[i64],
        released_until: DateTime<Utc>,
    ) -> Result<Vec<TargetAnswer>>;

    /// Latest released answers for the given answer options from the
    /// previous-cycle instance of the same questionnaire.
    async fn previous_cycle_target_answers(
        &self,
        pseudonym: &str,
        questionnaire_id: i64,
        cycle: i32,
        answer_option_ids: &[i64],
    ) -> Result<Vec<TargetAnswer>>;
}

pub struct QuestionnaireFilter<'a> {
    source: &'a dyn TargetAnswerSource,
    now: DateTime<Utc>,
}

impl<'a> QuestionnaireFilter<'a> {
    pub fn new(source: &'a dyn TargetAnswerSource) -> Self {
        Self {
            source,
            now: Utc::now(),
        }
    }

    /// Pins the evaluation clock, mainly for tests. The clock is read once
    /// per filter run, so results stay deterministic either way.
    pub fn at(source: &'a dyn TargetAnswerSource, now: DateTime<Utc>) -> Self {
        Self { source, now }
    }

    /// Filters the instance's questionnaire in place, keeping only questions
    /// and answer options whose conditions are currently satisfied.
    pub async fn filter_questionnaire_of_instance(
        &self,
        instance: &mut QuestionnaireInstance,
    ) -> Result<()> {
        let target_answers = self.load_condition_target_answers(instance).await?;

        let questions = std::mem::take(&mut instance.questionnaire.questions);
        let cycle = instance.cycle;

        // First pass: conditions answered by other instances. INTERNAL_THIS
        // passes through here and is resolved structurally below, over the
        // whole surviving sibling set at once.
        let mut questions: Vec<Question> = questions
            .into_iter()
            .filter(|question| {
                condition_fulfilled(question.condition.as_ref(), &target_answers, cycle)
            })
            .filter_map(|mut question| {
                let keep_empty_question = question.answer_options.is_empty();
                question.answer_options.retain(|option| {
                    condition_fulfilled(option.condition.as_ref(), &target_answers, cycle)
                });
                (keep_empty_question || !question.answer_options.is_empty()).then_some(question)
            })
            .collect();

        // Second pass: INTERNAL_THIS graph eligibility, fail-closed on
        // missing targets and cycles.
        questions = QuestionCleaner::new(&questions).retain_eligible(questions);

        // A questionnaire where nothing is answerable has nothing to show;
        // leftover informational questions are dropped with it.
        if !questions.iter().any(|q| !q.answer_options.is_empty()) {
            questions.clear();
        }

        instance.questionnaire.questions = questions;
        Ok(())
    }

    async fn load_condition_target_answers(
        &self,
        instance: &QuestionnaireInstance,
    ) -> Result<HashMap<i64, TargetAnswer>> {
        let mut target_answers = HashMap::new();

        let external_ids =
            collect_target_ids(&instance.questionnaire.questions, ConditionType::External);
        if !external_ids.is_empty() {
            let answers = self
                .source
                .external_target_answers(
                    &instance.pseudonym,
                    &external_ids,
                    instance.evaluation_date(self.now),
                )
                .await?;
            insert_first_seen(&mut target_answers, answers);
        }

        if instance.cycle > 1 {
            let last_ids = collect_target_ids(
                &instance.questionnaire.questions,
                ConditionType::InternalLast,
            );
            if !last_ids.is_empty() {
                let answers = self
                    .source
                    .previous_cycle_target_answers(
                        &instance.pseudonym,
                        instance.questionnaire.id,
                        instance.cycle - 1,
                        &last_ids,
                    )
                    .await?;
                insert_first_seen(&mut target_answers, answers);
            }
        }

        Ok(target_answers)
    }
}

/// Decides a single condition against the loaded target answers.
///
/// `INTERNAL_LAST` on the first cycle passes: there is no previous cycle yet,
/// so the gate is not applicable. Applied uniformly at question and answer
/// option level.
fn condition_fulfilled(
    condition: Option<&Condition>,
    target_answers: &HashMap<i64, TargetAnswer>,
    cycle: i32,
) -> bool {
    let Some(condition) = condition else {
        return true;
    };
    if !matches!(
        condition.condition_type,
        ConditionType::External | ConditionType::InternalLast
    ) {
        return true;
    }

    let answer = condition
        .target_answer_option
        .and_then(|id| target_answers.get(&id));

    match answer {
        Some(answer) => is_condition_met(Some(&answer.value), condition, answer.answer_type),
        None => {
            condition.condition_type == ConditionType::InternalLast && cycle <= 1
        }
    }
}

/// Deduplicated target answer option ids for one condition type, across
/// question-level and answer-option-level conditions. Keeps the batch loads
/// free of duplicate keys (no N+1 lookups either way).
fn collect_target_ids(questions: &[Question], condition_type: ConditionType) -> Vec<i64> {
    let mut ids = Vec::new();
    let mut push = |condition: Option<&Condition>| {
        if let Some(c) = condition {
            if c.condition_type == condition_type {
                if let Some(target) = c.target_answer_option {
                    if !ids.contains(&target) {
                        ids.push(target);
                    }
                }
            }
        }
    };

    for question in questions {
        push(question.condition.as_ref());
        for option in &question.answer_options {
            push(option.condition.as_ref());
        }
    }
    ids
}

/// First row per answer option wins; the source orders by versioning
/// descending, so that is the latest revision.
fn insert_first_seen(map: &mut HashMap<i64, TargetAnswer>, answers: Vec<TargetAnswer>) {
    for answer in answers {
        map.entry(answer.answer_option_id).or_insert(answer);
    }
}
