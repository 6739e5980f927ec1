use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a biosample handed out to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleDto {
    pub sample_id: String,
    #[serde(default)]
    pub dummy_sample_id: Option<String>,
}

/// File or image payload submitted by a participant. On decode only the file
/// name is resolved; the content stays in file storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFileDto {
    /// Base64 encoded content, empty when only metadata is carried.
    pub file: String,
    pub file_name: String,
}

/// Typed answer value. The flat string storage form is produced and consumed
/// exclusively by [`crate::engine::codec`].
///
/// Untagged: submitted JSON is matched structurally (arrays are multi-select
/// code lists, objects are file or sample payloads, numbers cover both plain
/// numeric answers and single-select codes, everything else is text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Codes(Vec<i32>),
    File(UserFileDto),
    Sample(SampleDto),
    Number(f64),
    Text(String),
}

impl AnswerValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A stored answer row. Composite-keyed by instance, question, answer option
/// and `versioning`; rows are never deleted, clearing a value keeps an
/// empty-valued row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub questionnaire_instance_id: i64,
    pub question_id: i64,
    pub answer_option_id: i64,
    /// Revision of this answer at a release point, ≥ 1 once persisted.
    pub versioning: i32,
    pub value: String,
    pub date_of_release: Option<DateTime<Utc>>,
    pub releasing_person: Option<String>,
}

/// An answer as submitted by a caller, before validation and encoding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnswerInput {
    pub question_id: i64,
    pub answer_option_id: i64,
    pub value: Option<AnswerValue>,
}
