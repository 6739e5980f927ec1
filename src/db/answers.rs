//! Answer rows: condition target loading, versioned reads and transactional
//! writes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::engine::{TargetAnswer, TargetAnswerSource};
use crate::models::{Answer, AnswerType};

use super::placeholders;

/// [`TargetAnswerSource`] over the shared pool. Both queries emulate
/// `DISTINCT ON (answer_option_id)` by ordering on
/// `(answer_option_id, versioning DESC)`; the filter keeps the first row per
/// answer option.
pub struct SqliteTargetAnswerSource {
    pool: SqlitePool,
}

impl SqliteTargetAnswerSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TargetAnswerSource for SqliteTargetAnswerSource {
    async fn external_target_answers(
        &self,
        pseudonym: &str,
        answer_option_ids: &[i64],
        released_until: DateTime<Utc>,
    ) -> Result<Vec<TargetAnswer>> {
        let sql = format!(
            r#"
            SELECT a.answer_option_id, a.value, ao.answer_type_id
            FROM answers a
            JOIN questionnaire_instances qi ON a.questionnaire_instance_id = qi.id
            JOIN answer_options ao ON ao.id = a.answer_option_id
            WHERE qi.status IN ('released', 'released_once', 'released_twice')
              AND qi.pseudonym = ?
              AND COALESCE(a.date_of_release, qi.date_of_release_v2, qi.date_of_release_v1) <= ?
              AND a.answer_option_id IN ({})
            ORDER BY a.answer_option_id, a.versioning DESC
            "#,
            placeholders(answer_option_ids.len())
        );

        let mut query = sqlx::query(&sql).bind(pseudonym).bind(released_until);
        for id in answer_option_ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("Failed to load external condition target answers")?;

        rows.iter().map(parse_target_answer_row).collect()
    }

    async fn previous_cycle_target_answers(
        &self,
        pseudonym: &str,
        questionnaire_id: i64,
        cycle: i32,
        answer_option_ids: &[i64],
    ) -> Result<Vec<TargetAnswer>> {
        let sql = format!(
            r#"
            SELECT a.answer_option_id, a.value, ao.answer_type_id
            FROM answers a
            JOIN questionnaire_instances qi ON a.questionnaire_instance_id = qi.id
            JOIN answer_options ao ON ao.id = a.answer_option_id
            WHERE qi.status IN ('released', 'released_once', 'released_twice')
              AND qi.pseudonym = ?
              AND qi.questionnaire_id = ?
              AND qi.cycle = ?
              AND a.answer_option_id IN ({})
            ORDER BY a.answer_option_id, a.versioning DESC
            "#,
            placeholders(answer_option_ids.len())
        );

        let mut query = sqlx::query(&sql)
            .bind(pseudonym)
            .bind(questionnaire_id)
            .bind(cycle);
        for id in answer_option_ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("Failed to load previous-cycle condition target answers")?;

        rows.iter().map(parse_target_answer_row).collect()
    }
}

fn parse_target_answer_row(row: &sqlx::sqlite::SqliteRow) -> Result<TargetAnswer> {
    let type_id: i32 = row.try_get("answer_type_id")?;
    Ok(TargetAnswer {
        answer_option_id: row.try_get("answer_option_id")?,
        value: row.try_get("value")?,
        answer_type: AnswerType::from_id(type_id)
            .ok_or_else(|| anyhow::anyhow!("Unknown answer type id {type_id}"))?,
    })
}

/// The stored answer the versioning decision is based on. Read inside the
/// write transaction to keep concurrent submissions from racing each other.
pub async fn find_answer_at_version(
    tx: &mut Transaction<'_, Sqlite>,
    instance_id: i64,
    question_id: i64,
    answer_option_id: i64,
    versioning: i32,
) -> Result<Option<Answer>> {
    let row = sqlx::query(
        r#"
        SELECT questionnaire_instance_id, question_id, answer_option_id,
               versioning, value, date_of_release, releasing_person
        FROM answers
        WHERE questionnaire_instance_id = ?
          AND question_id = ?
          AND answer_option_id = ?
          AND versioning = ?
        ORDER BY versioning DESC
        "#,
    )
    .bind(instance_id)
    .bind(question_id)
    .bind(answer_option_id)
    .bind(versioning)
    .fetch_optional(&mut **tx)
    .await
    .context("Failed to look up existing answer")?;

    row.as_ref().map(parse_answer_row).transpose()
}

pub async fn upsert_answer(tx: &mut Transaction<'_, Sqlite>, answer: &Answer) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO answers (
            questionnaire_instance_id, question_id, answer_option_id,
            versioning, value, date_of_release, releasing_person
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(questionnaire_instance_id, question_id, answer_option_id, versioning)
        DO UPDATE SET
            value = excluded.value,
            date_of_release = excluded.date_of_release,
            releasing_person = excluded.releasing_person
        "#,
    )
    .bind(answer.questionnaire_instance_id)
    .bind(answer.question_id)
    .bind(answer.answer_option_id)
    .bind(answer.versioning)
    .bind(&answer.value)
    .bind(answer.date_of_release)
    .bind(&answer.releasing_person)
    .execute(&mut **tx)
    .await
    .with_context(|| {
        format!(
            "Failed to write answer for instance '{}', answer option '{}'",
            answer.questionnaire_instance_id, answer.answer_option_id
        )
    })?;

    Ok(())
}

/// All answers of an instance at one version, restricted to the given
/// questions (the currently visible ones for progress calculation).
pub async fn answers_at_version(
    pool: &SqlitePool,
    instance_id: i64,
    question_ids: &[i64],
    versioning: i32,
) -> Result<Vec<Answer>> {
    if question_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        r#"
        SELECT questionnaire_instance_id, question_id, answer_option_id,
               versioning, value, date_of_release, releasing_person
        FROM answers
        WHERE questionnaire_instance_id = ?
          AND versioning = ?
          AND question_id IN ({})
        "#,
        placeholders(question_ids.len())
    );

    let mut query = sqlx::query(&sql).bind(instance_id).bind(versioning);
    for id in question_ids {
        query = query.bind(id);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to load answers at version")?;

    rows.iter().map(parse_answer_row).collect()
}

/// Duplicates the answers of the instance's current release version into
/// `target_version`, used when a release carries unchanged answers forward.
pub async fn copy_answers_to_version(
    tx: &mut Transaction<'_, Sqlite>,
    instance_id: i64,
    source_version: i32,
    target_version: i32,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO answers (
            questionnaire_instance_id, question_id, answer_option_id,
            versioning, value, date_of_release, releasing_person
        )
        SELECT questionnaire_instance_id, question_id, answer_option_id,
               ?, value, date_of_release, releasing_person
        FROM answers
        WHERE questionnaire_instance_id = ? AND versioning = ?
        "#,
    )
    .bind(target_version)
    .bind(instance_id)
    .bind(source_version)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("Failed to copy answers of instance '{instance_id}'"))?;

    Ok(result.rows_affected())
}

fn parse_answer_row(row: &sqlx::sqlite::SqliteRow) -> Result<Answer> {
    Ok(Answer {
        questionnaire_instance_id: row.try_get("questionnaire_instance_id")?,
        question_id: row.try_get("question_id")?,
        answer_option_id: row.try_get("answer_option_id")?,
        versioning: row.try_get("versioning")?,
        value: row.try_get("value")?,
        date_of_release: row.try_get("date_of_release")?,
        releasing_person: row.try_get("releasing_person")?,
    })
}
