//! Conversion of released answers into the SORMAS symptoms DTO.
//!
//! Each answer option is matched against the DTO by its variable name; the
//! field's class decides how the stored text value is converted. A field
//! that fails to convert is logged and skipped so one bad answer never
//! blocks the transmission of the rest.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Answer, AnswerOption, AnswerType};

/// Tri-state symptom assessment as SORMAS expects it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bool3 {
    No,
    Yes,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemperatureSource {
    NonContact,
    Oral,
    Axillary,
    Rectal,
}

/// Subset of the SORMAS external-visits symptoms schema carried by the
/// symptom diary questionnaires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomsDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onset_symptom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms_comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glasgow_coma_scale: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptomatic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onset_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_source: Option<TemperatureSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fever: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cough: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headache: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sore_throat: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runny_nose: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_breathing: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muscle_pain: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatigue_weakness: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chills_sweats: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diarrhea: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nausea: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vomiting: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_of_taste: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_of_smell: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeling_ill: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fast_heart_rate: Option<Bool3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation_lower94: Option<Bool3>,
}

/// Builds the symptoms DTO from released answers paired with their answer
/// options. Answers without a variable name or with an empty value are
/// ignored; a value that cannot be converted is logged and skipped.
pub fn map_answers_to_symptoms<'a, I>(answers: I) -> SymptomsDto
where
    I: IntoIterator<Item = (&'a Answer, &'a AnswerOption)>,
{
    let mut symptoms = SymptomsDto::default();

    for (answer, option) in answers {
        let Some(key) = option.variable_name.as_deref() else {
            continue;
        };
        if answer.value.is_empty() {
            continue;
        }
        if let Err(e) = apply_field(&mut symptoms, key, &answer.value, option) {
            log::error!(
                "could not convert answer for symptom field '{key}' (answer option {}): {e:#}",
                option.id
            );
        }
    }

    symptoms
}

fn apply_field(
    symptoms: &mut SymptomsDto,
    key: &str,
    value: &str,
    option: &AnswerOption,
) -> Result<()> {
    match key {
        "onsetSymptom" => symptoms.onset_symptom = Some(value.to_string()),
        "symptomsComments" => symptoms.symptoms_comments = Some(value.to_string()),
        "glasgowComaScale" => symptoms.glasgow_coma_scale = Some(convert_integer(value)?),
        "heartRate" => symptoms.heart_rate = Some(convert_integer(value)?),
        "respiratoryRate" => symptoms.respiratory_rate = Some(convert_integer(value)?),
        "temperature" => symptoms.temperature = Some(convert_float(value)?),
        "weight" => symptoms.weight = Some(convert_float(value)?),
        "height" => symptoms.height = Some(convert_float(value)?),
        "symptomatic" => symptoms.symptomatic = Some(convert_boolean(value, option)?),
        "onsetDate" => symptoms.onset_date = Some(convert_date(value)?),
        "temperatureSource" => {
            symptoms.temperature_source = Some(convert_temperature_source(value, option)?)
        }
        "fever" => symptoms.fever = Some(convert_bool3(value, option)?),
        "cough" => symptoms.cough = Some(convert_bool3(value, option)?),
        "headache" => symptoms.headache = Some(convert_bool3(value, option)?),
        "soreThroat" => symptoms.sore_throat = Some(convert_bool3(value, option)?),
        "runnyNose" => symptoms.runny_nose = Some(convert_bool3(value, option)?),
        "difficultyBreathing" => {
            symptoms.difficulty_breathing = Some(convert_bool3(value, option)?)
        }
        "musclePain" => symptoms.muscle_pain = Some(convert_bool3(value, option)?),
        "fatigueWeakness" => symptoms.fatigue_weakness = Some(convert_bool3(value, option)?),
        "chillsSweats" => symptoms.chills_sweats = Some(convert_bool3(value, option)?),
        "diarrhea" => symptoms.diarrhea = Some(convert_bool3(value, option)?),
        "nausea" => symptoms.nausea = Some(convert_bool3(value, option)?),
        "vomiting" => symptoms.vomiting = Some(convert_bool3(value, option)?),
        "lossOfTaste" => symptoms.loss_of_taste = Some(convert_bool3(value, option)?),
        "lossOfSmell" => symptoms.loss_of_smell = Some(convert_bool3(value, option)?),
        "feelingIll" => symptoms.feeling_ill = Some(convert_bool3(value, option)?),
        "fastHeartRate" => symptoms.fast_heart_rate = Some(convert_bool3(value, option)?),
        "oxygenSaturationLower94" => {
            symptoms.oxygen_saturation_lower94 = Some(convert_bool3(value, option)?)
        }
        // no matching DTO field, not an error
        _ => {}
    }
    Ok(())
}

fn convert_integer(value: &str) -> Result<i64> {
    value
        .parse()
        .with_context(|| format!("'{value}' is not an integer"))
}

fn convert_float(value: &str) -> Result<f64> {
    value
        .parse()
        .with_context(|| format!("'{value}' is not a number"))
}

fn convert_date(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid date '{value}'"))?;
        return Ok(midnight.and_utc());
    }
    if let Ok(millis) = value.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp_millis(millis) {
            return Ok(dt);
        }
    }
    bail!("'{value}' is not a date")
}

fn convert_boolean(value: &str, option: &AnswerOption) -> Result<bool> {
    match select_code(value, option)? {
        0 => Ok(false),
        1 => Ok(true),
        code => bail!("unknown value code {code} for boolean field"),
    }
}

fn convert_bool3(value: &str, option: &AnswerOption) -> Result<Bool3> {
    match select_code(value, option)? {
        0 => Ok(Bool3::No),
        1 => Ok(Bool3::Yes),
        2 => Ok(Bool3::Unknown),
        code => bail!("unknown value code {code} for tri-state field"),
    }
}

fn convert_temperature_source(value: &str, option: &AnswerOption) -> Result<TemperatureSource> {
    match select_code(value, option)? {
        // two historic codes both mean a non-contact reading
        0 | 1 => Ok(TemperatureSource::NonContact),
        2 => Ok(TemperatureSource::Oral),
        3 => Ok(TemperatureSource::Axillary),
        4 => Ok(TemperatureSource::Rectal),
        code => bail!("unknown value code {code} for temperature source"),
    }
}

/// Resolves a single-select answer's stored label to its value code.
fn select_code(value: &str, option: &AnswerOption) -> Result<i32> {
    if option.answer_type != AnswerType::SingleSelect {
        bail!("expected a single select answer option, got {:?}", option.answer_type);
    }
    let index = option
        .values
        .iter()
        .position(|v| v == value)
        .ok_or_else(|| anyhow!("label '{value}' not among the answer option values"))?;
    option
        .values_code
        .get(index)
        .copied()
        .ok_or_else(|| anyhow!("label '{value}' has no value code"))
}
