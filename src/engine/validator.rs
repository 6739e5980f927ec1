//! Batch validation of submitted answers against the filtered questionnaire.
//!
//! All problems of a batch are collected and returned together so a caller
//! can report every invalid answer in one response. The instance passed in
//! must already be filtered: only visible answer options take part.

use base64::Engine as _;
use chrono::{Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::{
    AnswerInput, AnswerOption, AnswerType, AnswerValue, Question, QuestionnaireInstance,
    StudySettings,
};

/// Why a submitted answer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidAnswer {
    /// The answer record is missing entirely; it must be submitted even when
    /// its value is empty.
    Missing,
    /// The question is mandatory but the answer value is empty.
    Mandatory,
    /// The answer references a question or answer option that is not part of
    /// this instance's (filtered) questionnaire.
    NotAvailable,
    /// The value does not fit the answer type, its range or its format.
    InvalidValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub question_id: Option<i64>,
    pub answer_option_id: Option<i64>,
    pub error: Option<InvalidAnswer>,
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Validates a batch of submitted answers. The returned list contains one
/// entry per visible answer option plus one per submitted answer with a
/// broken relation; callers filter on [`ValidationResult::is_error`].
pub fn validate_answers(
    study: &StudySettings,
    instance: &QuestionnaireInstance,
    answers: &[AnswerInput],
) -> Vec<ValidationResult> {
    let mut results = Vec::new();

    for question in &instance.questionnaire.questions {
        for answer_option in &question.answer_options {
            results.push(validate_answer(study, question, answer_option, answers));
        }
    }

    for answer in answers {
        results.push(validate_answer_relations(instance, answer));
    }

    results
}

fn validate_answer(
    study: &StudySettings,
    question: &Question,
    answer_option: &AnswerOption,
    answers: &[AnswerInput],
) -> ValidationResult {
    let answer = answers
        .iter()
        .find(|a| a.answer_option_id == answer_option.id);

    let (error, message) = match answer {
        None => (Some(InvalidAnswer::Missing), Some("missing".to_string())),
        Some(answer) => {
            if question.is_mandatory && is_answer_empty(answer_option.answer_type, answer.value.as_ref()) {
                (Some(InvalidAnswer::Mandatory), Some("mandatory".to_string()))
            } else if let Some(value) = &answer.value {
                match value_error_for_type(study, answer_option, value) {
                    Some(message) => (Some(InvalidAnswer::InvalidValue), Some(message)),
                    None => (None, None),
                }
            } else {
                (None, None)
            }
        }
    };

    ValidationResult {
        question_id: Some(question.id),
        answer_option_id: Some(answer_option.id),
        error,
        message,
    }
}

fn validate_answer_relations(
    instance: &QuestionnaireInstance,
    answer: &AnswerInput,
) -> ValidationResult {
    let question = instance
        .questionnaire
        .questions
        .iter()
        .find(|q| q.id == answer.question_id);
    let answer_option = question.and_then(|q| {
        q.answer_options
            .iter()
            .find(|ao| ao.id == answer.answer_option_id)
    });

    let error = if question.is_none() || answer_option.is_none() {
        Some(InvalidAnswer::NotAvailable)
    } else {
        None
    };

    ValidationResult {
        question_id: Some(answer.question_id),
        answer_option_id: Some(answer.answer_option_id),
        message: error.map(|_| "not available".to_string()),
        error,
    }
}

/// An empty value in the sense of mandatory-question checking.
pub fn is_answer_empty(answer_type: AnswerType, value: Option<&AnswerValue>) -> bool {
    let Some(value) = value else {
        return true;
    };

    match value {
        AnswerValue::Text(s) => s.is_empty(),
        AnswerValue::Codes(codes) => codes.is_empty(),
        AnswerValue::File(file) => {
            matches!(answer_type, AnswerType::Image | AnswerType::File)
                && (file.file.is_empty() || file.file_name.is_empty())
        }
        _ => false,
    }
}

static PZN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{8}$").expect("valid regex"));

/// Type/range/format check for one value. Returns a human-readable reason or
/// `None` when the value is valid.
fn value_error_for_type(
    study: &StudySettings,
    answer_option: &AnswerOption,
    value: &AnswerValue,
) -> Option<String> {
    match answer_option.answer_type {
        AnswerType::None | AnswerType::Text => match value {
            AnswerValue::Text(_) => None,
            _ => Some("expected: string".to_string()),
        },
        AnswerType::Pzn => match value {
            AnswerValue::Text(s) if PZN_PATTERN.is_match(s) => None,
            _ => Some("expected: PZN of 8 digits".to_string()),
        },
        AnswerType::Number => {
            let Some(n) = value.as_number() else {
                return Some("expected: number".to_string());
            };
            if !n.is_finite() {
                return Some("expected: finite number".to_string());
            }
            if let Some(min) = answer_option.restriction_min {
                if n < min {
                    return Some(format!("expected: number >= {min}"));
                }
            }
            if let Some(max) = answer_option.restriction_max {
                if n > max {
                    return Some(format!("expected: number <= {max}"));
                }
            }
            None
        }
        AnswerType::Date => {
            let Some(s) = value.as_text() else {
                return Some("expected: ISO date string".to_string());
            };
            let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") else {
                return Some("expected: ISO date string".to_string());
            };
            // restrictions are day offsets relative to today
            let today = Utc::now().date_naive();
            if let Some(min) = answer_option.restriction_min {
                if date < today + Duration::days(min as i64) {
                    return Some(format!("expected: date no earlier than {min} days from today"));
                }
            }
            if let Some(max) = answer_option.restriction_max {
                if date > today + Duration::days(max as i64) {
                    return Some(format!("expected: date no later than {max} days from today"));
                }
            }
            None
        }
        AnswerType::Timestamp => match value {
            AnswerValue::Text(s)
                if chrono::DateTime::parse_from_rfc3339(s).is_ok() =>
            {
                None
            }
            _ => Some("expected: RFC 3339 timestamp".to_string()),
        },
        AnswerType::SingleSelect => {
            let code = value.as_number().map(|n| n as i32);
            match code {
                Some(code) if answer_option.values_code.contains(&code) => None,
                _ => Some("expected: one of the defined value codes".to_string()),
            }
        }
        AnswerType::MultiSelect => match value {
            AnswerValue::Codes(codes)
                if codes
                    .iter()
                    .all(|code| answer_option.values_code.contains(code)) =>
            {
                None
            }
            _ => Some("expected: array of defined value codes".to_string()),
        },
        AnswerType::Sample => match value {
            AnswerValue::Sample(sample) => validate_sample_id(study, &sample.sample_id)
                .or_else(|| match (&sample.dummy_sample_id, study.has_rna_samples) {
                    (Some(dummy), _) => validate_sample_id(study, dummy),
                    (None, true) => Some("expected: a dummy sample id for RNA studies".to_string()),
                    (None, false) => None,
                }),
            _ => Some("expected: sample object".to_string()),
        },
        AnswerType::Image | AnswerType::File => match value {
            AnswerValue::File(file) => {
                if file.file_name.is_empty() {
                    return Some("expected: a file name".to_string());
                }
                let content = match file.file.split_once(";base64,") {
                    Some((header, data)) => {
                        if answer_option.answer_type == AnswerType::Image
                            && !header.starts_with("data:image/")
                        {
                            return Some("expected: an image data URI".to_string());
                        }
                        data
                    }
                    None => &file.file,
                };
                if base64::engine::general_purpose::STANDARD
                    .decode(content)
                    .is_err()
                {
                    return Some("expected: base64 encoded file content".to_string());
                }
                None
            }
            _ => Some("expected: file object".to_string()),
        },
    }
}

/// Sample ids must carry the study's prefix and a digit suffix of the
/// configured length.
fn validate_sample_id(study: &StudySettings, sample_id: &str) -> Option<String> {
    if let Some(prefix) = &study.sample_prefix {
        let expected = format!("{prefix}-");
        // compare in place: re-casing copies can shift byte offsets for
        // non-ASCII prefixes
        let prefix_matches = sample_id
            .get(..expected.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&expected));
        if !prefix_matches {
            return Some(format!("expected: sample id starting with \"{expected}\""));
        }
        if let Some(suffix_length) = study.sample_suffix_length {
            let suffix = &sample_id[expected.len()..];
            if suffix.len() != suffix_length || !suffix.chars().all(|c| c.is_ascii_digit()) {
                return Some(format!(
                    "expected: sample id suffix of {suffix_length} digits"
                ));
            }
        }
    }
    None
}

/// Human-readable summary of all failed results, ordered by question and
/// answer option position.
pub fn create_error_message(
    instance: &QuestionnaireInstance,
    results: &[ValidationResult],
) -> String {
    let mut failed: Vec<&ValidationResult> = results.iter().filter(|r| r.is_error()).collect();
    failed.sort_by_key(|r| {
        let question_pos = instance
            .questionnaire
            .questions
            .iter()
            .find(|q| Some(q.id) == r.question_id)
            .map(|q| q.position)
            .unwrap_or(i32::MAX);
        (question_pos, r.answer_option_id.unwrap_or(i64::MAX))
    });

    let list: String = failed
        .iter()
        .map(|r| {
            format!(
                "{}.{} --> {}\n",
                r.question_id.map(|id| id.to_string()).unwrap_or_else(|| "?".into()),
                r.answer_option_id.map(|id| id.to_string()).unwrap_or_else(|| "?".into()),
                r.message.as_deref().unwrap_or("?")
            )
        })
        .collect();

    format!("The following answers are not valid:\n{list}")
}
