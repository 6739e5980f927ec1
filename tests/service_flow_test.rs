mod common;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use common::{FakeFileStore, FakeSampleTracker};
use studykit::engine::InvalidAnswer;
use studykit::models::{AnswerInput, AnswerValue, InstanceStatus, StudySettings};
use studykit::service::{QuestionnaireService, ReleaseNotifier, WriteOutcome};

#[derive(Default)]
struct RecordingNotifier {
    released: Mutex<Vec<(i64, i32)>>,
}

#[async_trait]
impl ReleaseNotifier for RecordingNotifier {
    async fn questionnaire_instance_released(
        &self,
        instance_id: i64,
        release_version: i32,
        _study_id: &str,
    ) -> Result<()> {
        self.released.lock().unwrap().push((instance_id, release_version));
        Ok(())
    }
}

async fn seeded_pool() -> SqlitePool {
    let _ = env_logger::builder().is_test(true).try_init();

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    studykit::db::init_schema(&pool).await.expect("schema");

    sqlx::query(
        "INSERT INTO questionnaires (id, version, study_id, name, type, cycle_unit)
         VALUES (1, 1, 'Teststudy', 'Weekly symptoms', 'for_probands', 'week')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO questions (id, questionnaire_id, questionnaire_version, position, is_mandatory)
         VALUES (1, 1, 1, 1, FALSE)",
    )
    .execute(&pool)
    .await
    .unwrap();

    for (id, position) in [(10i64, 1i32), (11, 2)] {
        sqlx::query(
            "INSERT INTO answer_options (id, question_id, position, answer_type_id)
             VALUES (?, 1, ?, 4)",
        )
        .bind(id)
        .bind(position)
        .execute(&pool)
        .await
        .unwrap();
    }

    sqlx::query(
        "INSERT INTO questionnaire_instances
         (id, study_id, pseudonym, questionnaire_id, questionnaire_version,
          status, cycle, release_version, progress, date_of_issue)
         VALUES (9001, 'Teststudy', 'test-1234', 1, 1, 'active', 1, 0, 0, ?)",
    )
    .bind(Utc::now())
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO questionnaires (id, version, study_id, name, type, cycle_unit)
         VALUES (2, 1, 'Teststudy', 'Case review', 'for_research_team', 'once')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO questions (id, questionnaire_id, questionnaire_version, position, is_mandatory)
         VALUES (2, 2, 1, 1, FALSE)",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO answer_options (id, question_id, position, answer_type_id)
         VALUES (20, 2, 1, 4)",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO questionnaire_instances
         (id, study_id, pseudonym, questionnaire_id, questionnaire_version,
          status, cycle, release_version, progress, date_of_issue)
         VALUES (9002, 'Teststudy', 'test-1234', 2, 1, 'active', 1, 0, 0, ?)",
    )
    .bind(Utc::now())
    .execute(&pool)
    .await
    .unwrap();

    pool
}

fn service(pool: SqlitePool, notifier: Arc<RecordingNotifier>) -> QuestionnaireService {
    QuestionnaireService::new(
        pool,
        Arc::new(FakeFileStore::default()),
        Arc::new(FakeSampleTracker::default()),
        notifier,
    )
}

fn text_answers() -> Vec<AnswerInput> {
    vec![
        AnswerInput {
            question_id: 1,
            answer_option_id: 10,
            value: Some(AnswerValue::Text("fine".into())),
        },
        AnswerInput {
            question_id: 1,
            answer_option_id: 11,
            value: Some(AnswerValue::Text("no complaints".into())),
        },
    ]
}

#[tokio::test]
async fn answers_release_and_versioning_flow() {
    let pool = seeded_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let service = service(pool.clone(), notifier.clone());
    let study = StudySettings::new("Teststudy");

    let loaded = service.get_filtered_instance(9001).await.unwrap();
    assert_eq!(loaded.status, InstanceStatus::Active);
    assert_eq!(loaded.questionnaire.questions.len(), 1);

    // first submission writes version 1 and moves the instance to in_progress
    let outcome = service
        .validate_and_write_answers(&study, 9001, &text_answers(), None)
        .await
        .unwrap();
    let written = match outcome {
        WriteOutcome::Written(answers) => answers,
        WriteOutcome::Invalid(problems) => panic!("unexpected validation errors: {problems:?}"),
    };
    assert_eq!(written.len(), 2);
    assert!(written.iter().all(|a| a.versioning == 1));

    let updated = service.get_filtered_instance(9001).await.unwrap();
    assert_eq!(updated.status, InstanceStatus::InProgress);
    assert_eq!(updated.progress, 100);

    // first release stamps version 1 and notifies downstream
    let patched = service
        .patch_status(9001, InstanceStatus::ReleasedOnce)
        .await
        .unwrap();
    assert_eq!(patched.status, InstanceStatus::ReleasedOnce);
    assert_eq!(patched.release_version, 1);
    assert_eq!(*notifier.released.lock().unwrap(), vec![(9001, 1)]);

    // editing after the release must not touch the released revision
    let outcome = service
        .validate_and_write_answers(&study, 9001, &text_answers(), Some("test-1234"))
        .await
        .unwrap();
    let written = match outcome {
        WriteOutcome::Written(answers) => answers,
        WriteOutcome::Invalid(problems) => panic!("unexpected validation errors: {problems:?}"),
    };
    assert!(written.iter().all(|a| a.versioning == 2));

    // second release caps the participant flow
    let patched = service
        .patch_status(9001, InstanceStatus::ReleasedTwice)
        .await
        .unwrap();
    assert_eq!(patched.release_version, 2);
    assert_eq!(
        *notifier.released.lock().unwrap(),
        vec![(9001, 1), (9001, 2)]
    );

    // nothing moves past released_twice
    assert!(service
        .patch_status(9001, InstanceStatus::ReleasedTwice)
        .await
        .is_err());
    assert!(service
        .validate_and_write_answers(&study, 9001, &text_answers(), None)
        .await
        .is_err());
}

#[tokio::test]
async fn researcher_rereleases_notify_every_version() {
    let pool = seeded_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let service = service(pool.clone(), notifier.clone());
    let study = StudySettings::new("Teststudy");

    let answers = vec![AnswerInput {
        question_id: 2,
        answer_option_id: 20,
        value: Some(AnswerValue::Text("reviewed".into())),
    }];
    service
        .validate_and_write_answers(&study, 9002, &answers, Some("researcher-1"))
        .await
        .unwrap();

    let first = service
        .patch_status(9002, InstanceStatus::Released)
        .await
        .unwrap();
    assert_eq!(first.release_version, 1);

    // a re-release keeps the status but must still dispatch downstream
    let second = service
        .patch_status(9002, InstanceStatus::Released)
        .await
        .unwrap();
    assert_eq!(second.status, InstanceStatus::Released);
    assert_eq!(second.release_version, 2);
    assert_eq!(
        *notifier.released.lock().unwrap(),
        vec![(9002, 1), (9002, 2)]
    );
}

#[tokio::test]
async fn invalid_batches_are_rejected_without_writing() {
    let pool = seeded_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let service = service(pool.clone(), notifier);
    let study = StudySettings::new("Teststudy");

    // one of the two visible answer options is missing from the batch
    let incomplete = vec![AnswerInput {
        question_id: 1,
        answer_option_id: 10,
        value: Some(AnswerValue::Text("only one".into())),
    }];
    let outcome = service
        .validate_and_write_answers(&study, 9001, &incomplete, None)
        .await
        .unwrap();
    match outcome {
        WriteOutcome::Invalid(problems) => {
            assert_eq!(problems.len(), 1);
            assert_eq!(problems[0].error, Some(InvalidAnswer::Missing));
            assert_eq!(problems[0].answer_option_id, Some(11));
        }
        WriteOutcome::Written(_) => panic!("expected the batch to be rejected"),
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answers")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);

    let untouched = service.get_filtered_instance(9001).await.unwrap();
    assert_eq!(untouched.status, InstanceStatus::Active);
}

#[tokio::test]
async fn released_answers_can_be_carried_into_the_next_version() {
    let pool = seeded_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let service = service(pool.clone(), notifier);
    let study = StudySettings::new("Teststudy");

    service
        .validate_and_write_answers(&study, 9001, &text_answers(), None)
        .await
        .unwrap();
    service
        .patch_status(9001, InstanceStatus::ReleasedOnce)
        .await
        .unwrap();

    let copied = service.copy_answers_to_release(9001, 2).await.unwrap();
    assert_eq!(copied, 2);

    let versions: Vec<i32> =
        sqlx::query_scalar("SELECT DISTINCT versioning FROM answers ORDER BY versioning")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(versions, vec![1, 2]);
}
