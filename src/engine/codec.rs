//! Translation between typed answer values and the flat string storage form.
//!
//! The storage form is what persistence and condition comparison operate on:
//! select answers are stored as their label text (joined with `;` for
//! multi-select), numbers as their decimal rendering, files as the file
//! store's id, samples as the `;`-joined sample fields.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::models::{
    AnswerOption, AnswerType, AnswerValue, QuestionnaireInstance, SampleDto, UserFileDto,
};

/// File storage collaborator. Content is persisted once on encode; decode
/// only resolves the stored file's name to bound payload sizes.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn store(
        &self,
        instance: &QuestionnaireInstance,
        answer_option: &AnswerOption,
        file: &UserFileDto,
    ) -> anyhow::Result<i64>;

    async fn file_name(&self, file_id: i64) -> anyhow::Result<Option<String>>;
}

/// Sample tracking collaborator. Validates a submitted sample against the lab
/// registry; rejections surface as [`EngineError::SampleRejected`].
#[async_trait]
pub trait SampleTracker: Send + Sync {
    async fn register_sample(
        &self,
        study_id: &str,
        pseudonym: &str,
        sample: &SampleDto,
    ) -> Result<(), EngineError>;
}

pub struct ValueCodec<'a> {
    files: &'a dyn FileStore,
    samples: &'a dyn SampleTracker,
}

impl<'a> ValueCodec<'a> {
    pub fn new(files: &'a dyn FileStore, samples: &'a dyn SampleTracker) -> Self {
        Self { files, samples }
    }

    /// Encodes a typed answer value to its storage form. `None` encodes to
    /// the empty string: cleared answers keep their row, they are never
    /// deleted.
    pub async fn encode(
        &self,
        instance: &QuestionnaireInstance,
        answer_option: &AnswerOption,
        value: Option<&AnswerValue>,
    ) -> anyhow::Result<String> {
        let Some(value) = value else {
            return Ok(String::new());
        };

        match answer_option.answer_type {
            AnswerType::Image | AnswerType::File => match value {
                AnswerValue::File(file) => {
                    let id = self.files.store(instance, answer_option, file).await?;
                    Ok(id.to_string())
                }
                _ => Ok(String::new()),
            },
            AnswerType::SingleSelect => match value {
                AnswerValue::Number(code) => Ok(encode_select_code(
                    &answer_option.values_code,
                    &answer_option.values,
                    *code as i32,
                )),
                _ => anyhow::bail!("single select answers are expected to be a numeric value code"),
            },
            AnswerType::MultiSelect => match value {
                AnswerValue::Codes(codes) => Ok(encode_select_codes(
                    &answer_option.values_code,
                    &answer_option.values,
                    codes,
                )),
                _ => anyhow::bail!(
                    "multi select answers are expected to be an array of numeric value codes"
                ),
            },
            AnswerType::Sample => match value {
                AnswerValue::Sample(sample) => {
                    self.samples
                        .register_sample(&instance.study_id, &instance.pseudonym, sample)
                        .await?;
                    Ok(encode_sample(sample))
                }
                _ => Ok(String::new()),
            },
            AnswerType::Number => match value {
                AnswerValue::Number(n) => Ok(format_number(*n)),
                AnswerValue::Text(s) => Ok(s.clone()),
                _ => anyhow::bail!("numeric answers are expected to be a number"),
            },
            _ => match value {
                AnswerValue::Text(s) => Ok(s.clone()),
                AnswerValue::Number(n) => Ok(format_number(*n)),
                _ => anyhow::bail!(
                    "answers of type {:?} are expected to be plain strings",
                    answer_option.answer_type
                ),
            },
        }
    }

    /// Decodes a stored value back to its typed form. An empty string is the
    /// absence of a value for every type except Text, where it is a
    /// legitimate (empty) answer.
    pub async fn decode(
        &self,
        answer_option: &AnswerOption,
        value: &str,
    ) -> anyhow::Result<Option<AnswerValue>> {
        if value.is_empty() && answer_option.answer_type != AnswerType::Text {
            return Ok(None);
        }

        let decoded = match answer_option.answer_type {
            AnswerType::None
            | AnswerType::Text
            | AnswerType::Date
            | AnswerType::Timestamp
            | AnswerType::Pzn => AnswerValue::Text(value.to_string()),
            AnswerType::Number => {
                let n = value.parse::<f64>().map_err(|_| {
                    EngineError::Decode(format!("\"{value}\" is not a number"))
                })?;
                AnswerValue::Number(n)
            }
            AnswerType::SingleSelect => AnswerValue::Number(f64::from(decode_select_value(
                &answer_option.values_code,
                &answer_option.values,
                value,
            )?)),
            AnswerType::MultiSelect => AnswerValue::Codes(decode_concatenated_select_values(
                &answer_option.values_code,
                &answer_option.values,
                value,
            )?),
            AnswerType::Sample => AnswerValue::Sample(decode_sample(value)),
            AnswerType::Image | AnswerType::File => {
                let file_id = value.parse::<i64>().map_err(|_| {
                    EngineError::Decode(format!("\"{value}\" is not a file id"))
                })?;
                let file_name = self.files.file_name(file_id).await?.ok_or_else(|| {
                    EngineError::Decode(format!(
                        "no stored file with id \"{file_id}\" for answer option {}",
                        answer_option.id
                    ))
                })?;
                AnswerValue::File(UserFileDto {
                    // content is not re-embedded, only the name
                    file: String::new(),
                    file_name,
                })
            }
        };

        Ok(Some(decoded))
    }
}

/// Label for a select code; empty string when the code is unknown.
pub fn encode_select_code(codes: &[i32], values: &[String], code: i32) -> String {
    codes
        .iter()
        .position(|&c| c == code)
        .and_then(|i| values.get(i))
        .cloned()
        .unwrap_or_default()
}

pub fn encode_select_codes(codes: &[i32], values: &[String], code_values: &[i32]) -> String {
    code_values
        .iter()
        .map(|&code| encode_select_code(codes, values, code))
        .collect::<Vec<_>>()
        .join(";")
}

/// Code for a select label. The label↔code mapping is a required, complete
/// bijection, so a miss is corrupt data.
pub fn decode_select_value(codes: &[i32], values: &[String], value: &str) -> Result<i32, EngineError> {
    values
        .iter()
        .position(|v| v == value)
        .and_then(|i| codes.get(i).copied())
        .ok_or_else(|| {
            EngineError::Decode(format!(
                "tried to decode \"{value}\" but no corresponding value was found in [{}] / [{}]",
                values.join(", "),
                codes.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
            ))
        })
}

/// Decodes select labels stored as a semicolon separated string, e.g.
/// `"Yes;No;I do not know"`.
pub fn decode_concatenated_select_values(
    codes: &[i32],
    values: &[String],
    value: &str,
) -> Result<Vec<i32>, EngineError> {
    value
        .split(';')
        .map(|v| decode_select_value(codes, values, v))
        .collect()
}

fn encode_sample(sample: &SampleDto) -> String {
    match &sample.dummy_sample_id {
        Some(dummy) => format!("{};{}", sample.sample_id, dummy),
        None => sample.sample_id.clone(),
    }
}

fn decode_sample(value: &str) -> SampleDto {
    let mut parts = value.split(';');
    SampleDto {
        sample_id: parts.next().unwrap_or_default().to_string(),
        dummy_sample_id: parts.next().map(str::to_string),
    }
}

/// Integers render without a trailing `.0` so stored values compare equal to
/// condition literals written by study authors.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_codes_round_trip() {
        let codes = vec![1, 2, 3];
        let values = vec!["Yes".to_string(), "No".to_string(), "Unknown".to_string()];

        for &code in &codes {
            let label = encode_select_code(&codes, &values, code);
            assert_eq!(decode_select_value(&codes, &values, &label).unwrap(), code);
        }

        let joined = encode_select_codes(&codes, &values, &[3, 1]);
        assert_eq!(joined, "Unknown;Yes");
        assert_eq!(
            decode_concatenated_select_values(&codes, &values, &joined).unwrap(),
            vec![3, 1]
        );
    }

    #[test]
    fn unknown_code_encodes_to_empty_string() {
        let codes = vec![1, 2];
        let values = vec!["Yes".to_string(), "No".to_string()];
        assert_eq!(encode_select_code(&codes, &values, 9), "");
    }

    #[test]
    fn unknown_label_fails_decode() {
        let codes = vec![1, 2];
        let values = vec!["Yes".to_string(), "No".to_string()];
        assert!(decode_select_value(&codes, &values, "Maybe").is_err());
    }

    #[test]
    fn numbers_render_like_their_literals() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(-3.0), "-3");
    }

    #[test]
    fn sample_round_trip() {
        let sample = SampleDto {
            sample_id: "ZIFCO-1234567899".into(),
            dummy_sample_id: Some("ZIFCO-1234567898".into()),
        };
        let encoded = encode_sample(&sample);
        assert_eq!(encoded, "ZIFCO-1234567899;ZIFCO-1234567898");
        assert_eq!(decode_sample(&encoded), sample);
    }
}
