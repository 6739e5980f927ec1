//! SQLite persistence adapter.
//!
//! Plain SQL repositories over a shared [`sqlx::SqlitePool`]. The engine
//! never touches the pool directly; it goes through the narrow ports defined
//! in [`crate::engine`], implemented here.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

pub mod answers;
pub mod files;
pub mod instances;

/// Opens the pool and makes sure the schema exists.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let pool = SqlitePool::connect(database_url)
        .await
        .with_context(|| format!("Failed to open database at '{database_url}'"))?;
    init_schema(&pool).await?;
    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .context("Failed to initialize database schema")?;
    log::info!("database schema ready");
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS questionnaires (
    id INTEGER NOT NULL,
    version INTEGER NOT NULL,
    study_id TEXT NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    cycle_unit TEXT NOT NULL,
    PRIMARY KEY (id, version)
);

CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY,
    questionnaire_id INTEGER NOT NULL,
    questionnaire_version INTEGER NOT NULL,
    position INTEGER NOT NULL,
    is_mandatory BOOLEAN NOT NULL DEFAULT FALSE,
    variable_name TEXT
);

CREATE TABLE IF NOT EXISTS answer_options (
    id INTEGER PRIMARY KEY,
    question_id INTEGER NOT NULL REFERENCES questions(id),
    position INTEGER NOT NULL,
    answer_type_id INTEGER NOT NULL,
    variable_name TEXT,
    values_json TEXT NOT NULL DEFAULT '[]',
    values_code_json TEXT NOT NULL DEFAULT '[]',
    restriction_min REAL,
    restriction_max REAL
);

CREATE TABLE IF NOT EXISTS conditions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    condition_type TEXT NOT NULL,
    operand TEXT,
    link TEXT,
    value TEXT NOT NULL DEFAULT '',
    target_answer_option INTEGER,
    questionnaire_id INTEGER,
    questionnaire_version INTEGER,
    question_id INTEGER,
    answer_option_id INTEGER
);

CREATE TABLE IF NOT EXISTS questionnaire_instances (
    id INTEGER PRIMARY KEY,
    study_id TEXT NOT NULL,
    pseudonym TEXT NOT NULL,
    questionnaire_id INTEGER NOT NULL,
    questionnaire_version INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'inactive',
    cycle INTEGER NOT NULL DEFAULT 1,
    release_version INTEGER NOT NULL DEFAULT 0,
    progress INTEGER NOT NULL DEFAULT 0,
    date_of_issue TIMESTAMP NOT NULL,
    date_of_release_v1 TIMESTAMP,
    date_of_release_v2 TIMESTAMP
);

CREATE TABLE IF NOT EXISTS answers (
    questionnaire_instance_id INTEGER NOT NULL REFERENCES questionnaire_instances(id),
    question_id INTEGER NOT NULL REFERENCES questions(id),
    answer_option_id INTEGER NOT NULL REFERENCES answer_options(id),
    versioning INTEGER NOT NULL DEFAULT 1,
    value TEXT NOT NULL DEFAULT '',
    date_of_release TIMESTAMP,
    releasing_person TEXT,
    PRIMARY KEY (questionnaire_instance_id, question_id, answer_option_id, versioning)
);

CREATE TABLE IF NOT EXISTS user_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    questionnaire_instance_id INTEGER NOT NULL,
    answer_option_id INTEGER NOT NULL,
    file TEXT NOT NULL,
    file_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS follow_ups (
    pseudonym TEXT NOT NULL,
    study TEXT NOT NULL,
    end_date TIMESTAMP,
    PRIMARY KEY (pseudonym, study)
);

CREATE INDEX IF NOT EXISTS idx_answers_option_versioning
    ON answers (answer_option_id, versioning DESC);
"#;

/// Expands to `?, ?, ...` for dynamic IN lists.
pub(crate) fn placeholders(count: usize) -> String {
    std::iter::repeat("?")
        .take(count)
        .collect::<Vec<_>>()
        .join(", ")
}
