//! Symptom diary participant management.
//!
//! Pulls a person record from SORMAS to keep the proband's contact data and
//! follow-up window current, and pushes mapped symptom answers back. The
//! three collaborators stay behind traits; only the follow-up table is owned
//! here.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::models::{Answer, AnswerOption};

use super::mapper::{map_answers_to_symptoms, SymptomsDto};
use super::pseudonym::generate_random_pseudonym;

const MAX_TRIES_TO_GENERATE_NEW_PSEUDONYM: u32 = 1000;

#[derive(Debug, Error)]
pub enum SormasError {
    #[error("could not look up the proband")]
    FetchProband(#[source] anyhow::Error),
    #[error("proband not found for '{0}'")]
    ProbandNotFound(String),
    #[error("could not fetch person '{0}' from SORMAS")]
    FetchPerson(String, #[source] anyhow::Error),
    #[error("SORMAS returned no person for '{0}'")]
    PersonNotFound(String),
    #[error("the SORMAS person record carries no email address")]
    MissingEmail,
    #[error("could not update personal data")]
    UpdatePersonalData(#[source] anyhow::Error),
    #[error("could not update the follow-up of '{0}'")]
    UpdateFollowUp(String, #[source] anyhow::Error),
}

/// Pseudonym policy of a study, as configured in the user service.
#[derive(Debug, Clone, PartialEq)]
pub struct PseudonymSettings {
    pub prefix: String,
    pub suffix_length: usize,
}

/// Person record as SORMAS reports it for the external journal.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalPerson {
    pub uuid: String,
    pub email_address: Option<String>,
    pub latest_follow_up_end_date: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait UserServiceClient: Send + Sync {
    async fn pseudonym_settings(&self, study: &str) -> Result<Option<PseudonymSettings>>;
    async fn is_pseudonym_in_use(&self, pseudonym: &str) -> Result<bool>;
    /// Pseudonym of the proband registered under the given SORMAS person
    /// UUID, if any.
    async fn find_pseudonym_by_person_uuid(&self, person_uuid: &str) -> Result<Option<String>>;
    /// SORMAS person UUID stored for the given pseudonym, if any.
    async fn find_person_uuid(&self, pseudonym: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait PersonalDataClient: Send + Sync {
    async fn update_email(&self, pseudonym: &str, email: &str) -> Result<()>;
}

/// Wire client towards the SORMAS instance. Kept behind a trait so the
/// domain logic never sees REST details.
#[async_trait]
pub trait SormasGateway: Send + Sync {
    async fn fetch_person(&self, person_uuid: &str) -> Result<Option<JournalPerson>>;
    async fn upload_symptoms(&self, person_uuid: &str, symptoms: &SymptomsDto) -> Result<()>;
}

pub struct SymptomDiaryService {
    pool: SqlitePool,
    users: Arc<dyn UserServiceClient>,
    personal_data: Arc<dyn PersonalDataClient>,
    sormas: Arc<dyn SormasGateway>,
    study: String,
}

impl SymptomDiaryService {
    pub fn new(
        pool: SqlitePool,
        users: Arc<dyn UserServiceClient>,
        personal_data: Arc<dyn PersonalDataClient>,
        sormas: Arc<dyn SormasGateway>,
        study: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            users,
            personal_data,
            sormas,
            study: study.into(),
        }
    }

    /// Draws random pseudonyms under the study's policy until one is free.
    pub async fn generate_new_pseudonym(&self) -> Result<String> {
        let settings = self
            .users
            .pseudonym_settings(&self.study)
            .await?
            .with_context(|| format!("Study '{}' not found", self.study))?;

        for _ in 0..MAX_TRIES_TO_GENERATE_NEW_PSEUDONYM {
            let candidate =
                generate_random_pseudonym(&settings.prefix, settings.suffix_length, "-")?;
            if !self.users.is_pseudonym_in_use(&candidate).await? {
                return Ok(candidate);
            }
        }

        bail!(
            "no unused pseudonym found after {MAX_TRIES_TO_GENERATE_NEW_PSEUDONYM} tries for study '{}'",
            self.study
        )
    }

    /// Fetches the person from SORMAS and stores its email address and
    /// follow-up end date on our side. At least one of `pseudonym` and
    /// `person_uuid` must be given; the other is looked up.
    pub async fn update_proband_data_from_sormas(
        &self,
        pseudonym: Option<&str>,
        person_uuid: Option<&str>,
    ) -> Result<JournalPerson, SormasError> {
        let (pseudonym, person_uuid) = match (pseudonym, person_uuid) {
            (Some(pseudonym), Some(uuid)) => (pseudonym.to_string(), uuid.to_string()),
            (None, Some(uuid)) => {
                let pseudonym = self
                    .users
                    .find_pseudonym_by_person_uuid(uuid)
                    .await
                    .map_err(SormasError::FetchProband)?
                    .ok_or_else(|| SormasError::ProbandNotFound(uuid.to_string()))?;
                (pseudonym, uuid.to_string())
            }
            (Some(pseudonym), None) => {
                let uuid = self
                    .users
                    .find_person_uuid(pseudonym)
                    .await
                    .map_err(SormasError::FetchProband)?
                    .ok_or_else(|| SormasError::ProbandNotFound(pseudonym.to_string()))?;
                (pseudonym.to_string(), uuid)
            }
            (None, None) => {
                return Err(SormasError::ProbandNotFound(
                    "neither pseudonym nor person UUID given".to_string(),
                ))
            }
        };

        let person = self
            .sormas
            .fetch_person(&person_uuid)
            .await
            .map_err(|e| SormasError::FetchPerson(person_uuid.clone(), e))?
            .ok_or_else(|| SormasError::PersonNotFound(person_uuid.clone()))?;

        let email = person
            .email_address
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or(SormasError::MissingEmail)?;
        self.personal_data
            .update_email(&pseudonym, email)
            .await
            .map_err(SormasError::UpdatePersonalData)?;

        self.upsert_follow_up(&pseudonym, person.latest_follow_up_end_date)
            .await
            .map_err(|e| SormasError::UpdateFollowUp(pseudonym.clone(), e))?;

        log::info!("synced proband '{pseudonym}' from SORMAS person '{person_uuid}'");
        Ok(person)
    }

    /// Ends the follow-up of a proband; the diary stops asking for symptoms.
    pub async fn stop_follow_up(&self, pseudonym: &str) -> Result<(), SormasError> {
        let result = sqlx::query("UPDATE follow_ups SET end_date = NULL WHERE pseudonym = ?")
            .bind(pseudonym)
            .execute(&self.pool)
            .await
            .map_err(|e| SormasError::UpdateFollowUp(pseudonym.to_string(), e.into()))?;

        if result.rows_affected() != 1 {
            return Err(SormasError::UpdateFollowUp(
                pseudonym.to_string(),
                anyhow::anyhow!("no follow-up on record"),
            ));
        }
        Ok(())
    }

    /// Maps released answers to the symptoms DTO and pushes them to SORMAS.
    pub async fn transmit_symptoms<'a, I>(&self, person_uuid: &str, answers: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a Answer, &'a AnswerOption)>,
    {
        let symptoms = map_answers_to_symptoms(answers);
        self.sormas
            .upload_symptoms(person_uuid, &symptoms)
            .await
            .with_context(|| format!("Failed to upload symptoms for person '{person_uuid}'"))?;
        log::info!("transmitted symptoms for person '{person_uuid}'");
        Ok(())
    }

    async fn upsert_follow_up(
        &self,
        pseudonym: &str,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO follow_ups (pseudonym, study, end_date)
            VALUES (?, ?, ?)
            ON CONFLICT(pseudonym, study) DO UPDATE SET end_date = excluded.end_date
            "#,
        )
        .bind(pseudonym)
        .bind(&self.study)
        .bind(end_date)
        .execute(&self.pool)
        .await
        .context("Failed to write follow-up")?;

        Ok(())
    }
}
