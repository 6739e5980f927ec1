//! Questionnaire instance loading and patching.
//!
//! An instance is always loaded with its full questionnaire tree (questions,
//! answer options, conditions) assembled into a fresh working copy, so the
//! filter can prune it without touching shared state.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::models::{
    AnswerOption, AnswerType, Condition, ConditionLink, ConditionOperand, ConditionType,
    CycleUnit, InstanceStatus, Question, Questionnaire, QuestionnaireInstance, QuestionnaireType,
};

pub async fn find_instance_with_questionnaire(
    pool: &SqlitePool,
    id: i64,
) -> Result<QuestionnaireInstance> {
    let row = sqlx::query(
        r#"
        SELECT id, study_id, pseudonym, questionnaire_id, questionnaire_version,
               status, cycle, release_version, progress,
               date_of_issue, date_of_release_v1, date_of_release_v2
        FROM questionnaire_instances
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to load questionnaire instance '{id}'"))?
    .ok_or_else(|| anyhow!("Questionnaire instance '{id}' not found"))?;

    let questionnaire_id: i64 = row.try_get("questionnaire_id")?;
    let questionnaire_version: i32 = row.try_get("questionnaire_version")?;
    let status_str: String = row.try_get("status")?;

    let questionnaire =
        load_questionnaire(pool, questionnaire_id, questionnaire_version).await?;

    Ok(QuestionnaireInstance {
        id: row.try_get("id")?,
        study_id: row.try_get("study_id")?,
        pseudonym: row.try_get("pseudonym")?,
        status: InstanceStatus::parse(&status_str)
            .ok_or_else(|| anyhow!("Unknown instance status '{status_str}'"))?,
        cycle: row.try_get("cycle")?,
        release_version: row.try_get("release_version")?,
        progress: row.try_get("progress")?,
        date_of_issue: row.try_get("date_of_issue")?,
        date_of_release_v1: row.try_get("date_of_release_v1")?,
        date_of_release_v2: row.try_get("date_of_release_v2")?,
        questionnaire,
    })
}

async fn load_questionnaire(
    pool: &SqlitePool,
    id: i64,
    version: i32,
) -> Result<Questionnaire> {
    let row = sqlx::query(
        "SELECT study_id, name, type, cycle_unit FROM questionnaires WHERE id = ? AND version = ?",
    )
    .bind(id)
    .bind(version)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to load questionnaire '{id}' version {version}"))?
    .ok_or_else(|| anyhow!("Questionnaire '{id}' version {version} not found"))?;

    let type_str: String = row.try_get("type")?;
    let cycle_unit_str: String = row.try_get("cycle_unit")?;

    let questions = load_questions(pool, id, version).await?;
    let mut conditions = load_conditions(pool, id, version).await?;

    Ok(Questionnaire {
        id,
        version,
        study_id: row.try_get("study_id")?,
        name: row.try_get("name")?,
        questionnaire_type: QuestionnaireType::parse(&type_str)
            .ok_or_else(|| anyhow!("Unknown questionnaire type '{type_str}'"))?,
        cycle_unit: CycleUnit::parse(&cycle_unit_str)
            .ok_or_else(|| anyhow!("Unknown cycle unit '{cycle_unit_str}'"))?,
        condition: conditions.questionnaire.take(),
        questions: attach_conditions(questions, conditions),
    })
}

async fn load_questions(pool: &SqlitePool, id: i64, version: i32) -> Result<Vec<Question>> {
    let question_rows = sqlx::query(
        r#"
        SELECT id, position, is_mandatory, variable_name
        FROM questions
        WHERE questionnaire_id = ? AND questionnaire_version = ?
        ORDER BY position
        "#,
    )
    .bind(id)
    .bind(version)
    .fetch_all(pool)
    .await
    .context("Failed to load questions")?;

    let mut questions = Vec::with_capacity(question_rows.len());
    for row in question_rows {
        questions.push(Question {
            id: row.try_get("id")?,
            questionnaire_id: id,
            questionnaire_version: version,
            position: row.try_get("position")?,
            is_mandatory: row.try_get("is_mandatory")?,
            variable_name: row.try_get("variable_name")?,
            answer_options: Vec::new(),
            condition: None,
        });
    }

    let option_rows = sqlx::query(
        r#"
        SELECT ao.id, ao.question_id, ao.position, ao.answer_type_id, ao.variable_name,
               ao.values_json, ao.values_code_json, ao.restriction_min, ao.restriction_max
        FROM answer_options ao
        JOIN questions q ON q.id = ao.question_id
        WHERE q.questionnaire_id = ? AND q.questionnaire_version = ?
        ORDER BY ao.question_id, ao.position
        "#,
    )
    .bind(id)
    .bind(version)
    .fetch_all(pool)
    .await
    .context("Failed to load answer options")?;

    let by_question: HashMap<i64, usize> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| (q.id, i))
        .collect();

    for row in option_rows {
        let question_id: i64 = row.try_get("question_id")?;
        let type_id: i32 = row.try_get("answer_type_id")?;
        let values_json: String = row.try_get("values_json")?;
        let values_code_json: String = row.try_get("values_code_json")?;

        let option = AnswerOption {
            id: row.try_get("id")?,
            question_id,
            position: row.try_get("position")?,
            answer_type: AnswerType::from_id(type_id)
                .ok_or_else(|| anyhow!("Unknown answer type id {type_id}"))?,
            variable_name: row.try_get("variable_name")?,
            values: serde_json::from_str(&values_json)
                .context("Failed to deserialize answer option values")?,
            values_code: serde_json::from_str(&values_code_json)
                .context("Failed to deserialize answer option value codes")?,
            restriction_min: row.try_get("restriction_min")?,
            restriction_max: row.try_get("restriction_max")?,
            condition: None,
        };

        if let Some(&index) = by_question.get(&question_id) {
            questions[index].answer_options.push(option);
        }
    }

    Ok(questions)
}

struct LoadedConditions {
    questionnaire: Option<Condition>,
    by_question: HashMap<i64, Condition>,
    by_option: HashMap<i64, Condition>,
}

async fn load_conditions(pool: &SqlitePool, id: i64, version: i32) -> Result<LoadedConditions> {
    let rows = sqlx::query(
        r#"
        SELECT c.condition_type, c.operand, c.link, c.value, c.target_answer_option,
               c.questionnaire_id, c.question_id, c.answer_option_id
        FROM conditions c
        LEFT JOIN questions q ON q.id = c.question_id
        LEFT JOIN answer_options ao ON ao.id = c.answer_option_id
        LEFT JOIN questions oq ON oq.id = ao.question_id
        WHERE (c.questionnaire_id = ? AND c.questionnaire_version = ?)
           OR (q.questionnaire_id = ? AND q.questionnaire_version = ?)
           OR (oq.questionnaire_id = ? AND oq.questionnaire_version = ?)
        "#,
    )
    .bind(id)
    .bind(version)
    .bind(id)
    .bind(version)
    .bind(id)
    .bind(version)
    .fetch_all(pool)
    .await
    .context("Failed to load conditions")?;

    let mut loaded = LoadedConditions {
        questionnaire: None,
        by_question: HashMap::new(),
        by_option: HashMap::new(),
    };

    for row in rows {
        let condition = parse_condition_row(&row)?;
        if let Some(option_id) = row.try_get::<Option<i64>, _>("answer_option_id")? {
            loaded.by_option.insert(option_id, condition);
        } else if let Some(question_id) = row.try_get::<Option<i64>, _>("question_id")? {
            loaded.by_question.insert(question_id, condition);
        } else {
            loaded.questionnaire = Some(condition);
        }
    }

    Ok(loaded)
}

fn parse_condition_row(row: &sqlx::sqlite::SqliteRow) -> Result<Condition> {
    let type_str: String = row.try_get("condition_type")?;
    let operand: Option<String> = row.try_get("operand")?;
    let link: Option<String> = row.try_get("link")?;

    Ok(Condition {
        condition_type: match type_str.as_str() {
            "external" => ConditionType::External,
            "internal_this" => ConditionType::InternalThis,
            "internal_last" => ConditionType::InternalLast,
            other => return Err(anyhow!("Unknown condition type '{other}'")),
        },
        operand: operand.as_deref().and_then(parse_operand),
        link: link.as_deref().and_then(parse_link),
        value: row.try_get("value")?,
        target_answer_option: row.try_get("target_answer_option")?,
    })
}

fn parse_operand(s: &str) -> Option<ConditionOperand> {
    match s {
        "<" => Some(ConditionOperand::Less),
        ">" => Some(ConditionOperand::Greater),
        "<=" => Some(ConditionOperand::LessOrEqual),
        ">=" => Some(ConditionOperand::GreaterOrEqual),
        "==" => Some(ConditionOperand::Equal),
        "!=" | "\\=" => Some(ConditionOperand::NotEqual),
        _ => None,
    }
}

fn parse_link(s: &str) -> Option<ConditionLink> {
    match s {
        "AND" => Some(ConditionLink::And),
        "OR" => Some(ConditionLink::Or),
        "XOR" => Some(ConditionLink::Xor),
        _ => None,
    }
}

fn attach_conditions(mut questions: Vec<Question>, conditions: LoadedConditions) -> Vec<Question> {
    let LoadedConditions {
        mut by_question,
        mut by_option,
        ..
    } = conditions;

    for question in &mut questions {
        question.condition = by_question.remove(&question.id);
        for option in &mut question.answer_options {
            option.condition = by_option.remove(&option.id);
        }
    }
    questions
}

/// Field set applied to an instance on a status-changing patch.
#[derive(Debug, Clone, Default)]
pub struct InstancePatch {
    pub status: Option<InstanceStatus>,
    pub release_version: Option<i32>,
    pub progress: Option<i32>,
    pub date_of_release_v1: Option<DateTime<Utc>>,
    pub date_of_release_v2: Option<DateTime<Utc>>,
    pub date_of_issue: Option<DateTime<Utc>>,
}

/// Applies a patch inside the caller's transaction so the status read that
/// justified it cannot be raced by a second writer.
pub async fn patch_instance(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    patch: &InstancePatch,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE questionnaire_instances
        SET status = COALESCE(?, status),
            release_version = COALESCE(?, release_version),
            progress = COALESCE(?, progress),
            date_of_release_v1 = COALESCE(?, date_of_release_v1),
            date_of_release_v2 = COALESCE(?, date_of_release_v2),
            date_of_issue = COALESCE(?, date_of_issue)
        WHERE id = ?
        "#,
    )
    .bind(patch.status.map(|s| s.as_str()))
    .bind(patch.release_version)
    .bind(patch.progress)
    .bind(patch.date_of_release_v1)
    .bind(patch.date_of_release_v2)
    .bind(patch.date_of_issue)
    .bind(id)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("Failed to patch questionnaire instance '{id}'"))?;

    if result.rows_affected() == 0 {
        anyhow::bail!("Questionnaire instance '{id}' not found");
    }

    Ok(())
}

pub async fn update_progress(
    pool: &SqlitePool,
    id: i64,
    progress: i32,
    status: Option<InstanceStatus>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE questionnaire_instances SET progress = ?, status = COALESCE(?, status) WHERE id = ?",
    )
    .bind(progress)
    .bind(status.map(|s| s.as_str()))
    .bind(id)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to update progress for instance '{id}'"))?;

    if result.rows_affected() == 0 {
        anyhow::bail!("Questionnaire instance '{id}' not found");
    }

    Ok(())
}
