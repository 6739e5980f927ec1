//! File storage backed by the `user_files` table.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::engine::FileStore;
use crate::models::{AnswerOption, QuestionnaireInstance, UserFileDto};

pub struct SqliteFileStore {
    pool: SqlitePool,
}

impl SqliteFileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileStore for SqliteFileStore {
    async fn store(
        &self,
        instance: &QuestionnaireInstance,
        answer_option: &AnswerOption,
        file: &UserFileDto,
    ) -> Result<i64> {
        // one file per (instance, answer option): re-submitting replaces it
        let existing = sqlx::query(
            "SELECT id FROM user_files WHERE questionnaire_instance_id = ? AND answer_option_id = ?",
        )
        .bind(instance.id)
        .bind(answer_option.id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up stored file")?;

        if let Some(row) = existing {
            let id: i64 = row.try_get("id")?;
            sqlx::query("UPDATE user_files SET file = ?, file_name = ? WHERE id = ?")
                .bind(&file.file)
                .bind(&file.file_name)
                .bind(id)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to update stored file '{id}'"))?;
            return Ok(id);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO user_files (questionnaire_instance_id, answer_option_id, file, file_name)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(instance.id)
        .bind(answer_option.id)
        .bind(&file.file)
        .bind(&file.file_name)
        .execute(&self.pool)
        .await
        .context("Failed to store file")?;

        Ok(result.last_insert_rowid())
    }

    async fn file_name(&self, file_id: i64) -> Result<Option<String>> {
        let row = sqlx::query("SELECT file_name FROM user_files WHERE id = ?")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to load file '{file_id}'"))?;

        row.map(|r| r.try_get("file_name").map_err(Into::into))
            .transpose()
    }
}
