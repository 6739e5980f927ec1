//! Caller-facing facade of the questionnaire service.
//!
//! Owns the transaction boundary: a status patch or an answer batch is
//! written all-or-nothing, reads that decide a write happen inside the same
//! transaction, and release notifications fire only after a successful
//! commit, derived from the before/after snapshot rather than the caller's
//! input (the write coerces release versions and stamps dates itself).

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::answers::{
    answers_at_version, copy_answers_to_version, find_answer_at_version, upsert_answer,
    SqliteTargetAnswerSource,
};
use crate::db::instances::{find_instance_with_questionnaire, patch_instance, update_progress, InstancePatch};
use crate::engine::{
    validate_answers, versioning, QuestionnaireFilter, ValidationResult, ValueCodec,
};
use crate::engine::{FileStore, SampleTracker};
use crate::error::EngineError;
use crate::models::{
    Answer, AnswerInput, CycleUnit, InstanceStatus, QuestionnaireInstance, QuestionnaireType,
    StudySettings,
};

/// Downstream dispatcher for release events. Fire-and-forget: a delivery
/// failure is logged, never rolled back into the committed transaction.
#[async_trait]
pub trait ReleaseNotifier: Send + Sync {
    async fn questionnaire_instance_released(
        &self,
        instance_id: i64,
        release_version: i32,
        study_id: &str,
    ) -> Result<()>;
}

/// Result of a status patch, reported from the updated row.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub status: InstanceStatus,
    pub release_version: i32,
    pub progress: i32,
}

/// Result of an answer submission: either every answer was written, or the
/// full list of problems (validation is not fail-fast).
#[derive(Debug)]
pub enum WriteOutcome {
    Written(Vec<Answer>),
    Invalid(Vec<ValidationResult>),
}

pub struct QuestionnaireService {
    pool: SqlitePool,
    files: Arc<dyn FileStore>,
    samples: Arc<dyn SampleTracker>,
    notifier: Arc<dyn ReleaseNotifier>,
}

impl QuestionnaireService {
    pub fn new(
        pool: SqlitePool,
        files: Arc<dyn FileStore>,
        samples: Arc<dyn SampleTracker>,
        notifier: Arc<dyn ReleaseNotifier>,
    ) -> Self {
        Self {
            pool,
            files,
            samples,
            notifier,
        }
    }

    /// Loads an instance with its questionnaire filtered down to the
    /// currently visible questions and answer options.
    pub async fn get_filtered_instance(&self, id: i64) -> Result<QuestionnaireInstance> {
        let mut instance = find_instance_with_questionnaire(&self.pool, id).await?;
        self.filter(&mut instance).await?;
        Ok(instance)
    }

    /// Applies a status change, deriving release version and release dates,
    /// and notifies the dispatcher once the transaction committed.
    pub async fn patch_status(
        &self,
        instance_id: i64,
        new_status: InstanceStatus,
    ) -> Result<PatchOutcome> {
        let instance = find_instance_with_questionnaire(&self.pool, instance_id).await?;
        let previous_status = instance.status;
        let previous_release_version = instance.release_version;

        // fails before anything is persisted
        let release_version = versioning::determine_release_version(&instance, new_status)?;

        let now = Utc::now();
        let mut patch = InstancePatch {
            status: Some(new_status),
            ..Default::default()
        };
        match new_status {
            InstanceStatus::ReleasedOnce => {
                patch.release_version = Some(release_version);
                patch.date_of_release_v1 = Some(now);
                if instance.questionnaire.cycle_unit == CycleUnit::Spontan {
                    patch.date_of_issue = Some(now);
                }
            }
            InstanceStatus::ReleasedTwice => {
                patch.release_version = Some(release_version);
                patch.date_of_release_v2 = Some(now);
            }
            InstanceStatus::Released => {
                patch.release_version = Some(release_version);
            }
            _ => {}
        }

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        patch_instance(&mut tx, instance_id, &patch).await?;
        tx.commit().await.context("Failed to commit status patch")?;

        let updated = PatchOutcome {
            status: new_status,
            release_version: patch.release_version.unwrap_or(previous_release_version),
            progress: instance.progress,
        };

        // derived from the snapshot comparison, not the caller's input; a
        // research-team re-release keeps its status but bumps the version
        if updated.status.is_released()
            && (previous_status != updated.status
                || updated.release_version != previous_release_version)
        {
            if let Err(e) = self
                .notifier
                .questionnaire_instance_released(
                    instance_id,
                    updated.release_version,
                    &instance.study_id,
                )
                .await
            {
                log::error!("release notification for instance {instance_id} failed: {e:#}");
            }
        }

        Ok(updated)
    }

    /// Validates and writes a batch of answers. Either all answers are
    /// persisted inside one transaction or none are; validation problems are
    /// collected and returned together.
    pub async fn validate_and_write_answers(
        &self,
        study: &StudySettings,
        instance_id: i64,
        answers: &[AnswerInput],
        releasing_person: Option<&str>,
    ) -> Result<WriteOutcome> {
        let mut instance = find_instance_with_questionnaire(&self.pool, instance_id).await?;

        if !versioning::status_allows_answer_writes(instance.status) {
            return Err(EngineError::AnswersNotWritable {
                status: instance.status,
            }
            .into());
        }

        self.filter(&mut instance).await?;

        let results = validate_answers(study, &instance, answers);
        if results.iter().any(ValidationResult::is_error) {
            return Ok(WriteOutcome::Invalid(
                results.into_iter().filter(ValidationResult::is_error).collect(),
            ));
        }

        let codec = ValueCodec::new(self.files.as_ref(), self.samples.as_ref());
        let now = Utc::now();

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut written = Vec::with_capacity(answers.len());

        for input in answers {
            let answer_option = instance
                .questionnaire
                .questions
                .iter()
                .flat_map(|q| &q.answer_options)
                .find(|ao| ao.id == input.answer_option_id)
                .context("Validated answer lost its answer option")?;

            let existing = find_answer_at_version(
                &mut tx,
                instance.id,
                input.question_id,
                input.answer_option_id,
                instance.release_version,
            )
            .await?;

            let versioning_number =
                versioning::determine_answer_version(&instance, existing.as_ref())?;
            let date_of_release =
                versioning::determine_answer_release_date(existing.as_ref(), now);
            let value = codec
                .encode(&instance, answer_option, input.value.as_ref())
                .await?;

            let answer = Answer {
                questionnaire_instance_id: instance.id,
                question_id: input.question_id,
                answer_option_id: input.answer_option_id,
                versioning: versioning_number,
                value,
                date_of_release: Some(date_of_release),
                releasing_person: releasing_person.map(str::to_string),
            };
            upsert_answer(&mut tx, &answer).await?;
            written.push(answer);
        }

        tx.commit().await.context("Failed to commit answer batch")?;

        if let Err(e) = self.update_progress(instance_id).await {
            log::error!("progress update for instance {instance_id} failed: {e:#}");
        }

        Ok(WriteOutcome::Written(written))
    }

    /// Recomputes and stores the instance's progress. A first answer write
    /// also moves a fresh instance into `in_progress`.
    pub async fn update_progress(&self, instance_id: i64) -> Result<i32> {
        let mut instance = find_instance_with_questionnaire(&self.pool, instance_id).await?;
        self.filter(&mut instance).await?;

        let question_ids: Vec<i64> = instance
            .questionnaire
            .questions
            .iter()
            .map(|q| q.id)
            .collect();
        let answers = answers_at_version(
            &self.pool,
            instance.id,
            &question_ids,
            versioning::next_release_version(&instance),
        )
        .await?;

        let progress =
            versioning::calculate_progress(&instance.questionnaire.questions, &answers);

        let status = matches!(
            instance.status,
            InstanceStatus::Active | InstanceStatus::InProgress
        )
        .then_some(InstanceStatus::InProgress);

        update_progress(&self.pool, instance_id, progress, status).await?;
        Ok(progress)
    }

    /// Carries the current release's answers forward into `target_version`,
    /// for release flows where the participant re-releases unchanged answers.
    pub async fn copy_answers_to_release(
        &self,
        instance_id: i64,
        target_version: i32,
    ) -> Result<u64> {
        let instance = find_instance_with_questionnaire(&self.pool, instance_id).await?;

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let copied = copy_answers_to_version(
            &mut tx,
            instance.id,
            instance.release_version,
            target_version,
        )
        .await?;
        tx.commit().await.context("Failed to commit answer copy")?;

        log::info!(
            "copied {copied} answers of instance {instance_id} to version {target_version}"
        );
        Ok(copied)
    }

    async fn filter(&self, instance: &mut QuestionnaireInstance) -> Result<()> {
        let source = SqliteTargetAnswerSource::new(self.pool.clone());
        QuestionnaireFilter::new(&source)
            .filter_questionnaire_of_instance(instance)
            .await
    }
}

/// Convenience check exposed for callers that gate routes by questionnaire
/// type before loading the full tree.
pub fn questionnaire_type_allows(
    questionnaire_type: QuestionnaireType,
    from: InstanceStatus,
    to: InstanceStatus,
) -> bool {
    match questionnaire_type {
        QuestionnaireType::ForProbands => versioning::is_allowed_transition_for_proband(from, to),
        QuestionnaireType::ForResearchTeam => {
            versioning::is_allowed_transition_for_researcher(from, to)
        }
    }
}
