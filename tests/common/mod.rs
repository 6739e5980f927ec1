#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use studykit::engine::{FileStore, SampleTracker, TargetAnswer, TargetAnswerSource};
use studykit::error::EngineError;
use studykit::models::{
    AnswerOption, AnswerType, Condition, ConditionLink, ConditionOperand, ConditionType, CycleUnit,
    InstanceStatus, Question, Questionnaire, QuestionnaireInstance, QuestionnaireType, SampleDto,
    UserFileDto,
};

pub fn questionnaire(id: i64, questions: Vec<Question>) -> Questionnaire {
    Questionnaire {
        id,
        version: 1,
        study_id: "Teststudy".to_string(),
        name: format!("Questionnaire {id}"),
        questionnaire_type: QuestionnaireType::ForProbands,
        cycle_unit: CycleUnit::Week,
        questions,
        condition: None,
    }
}

pub fn instance(
    status: InstanceStatus,
    cycle: i32,
    questionnaire: Questionnaire,
) -> QuestionnaireInstance {
    QuestionnaireInstance {
        id: 9000 + questionnaire.id,
        study_id: "Teststudy".to_string(),
        pseudonym: "test-1234".to_string(),
        status,
        cycle,
        release_version: 0,
        progress: 0,
        date_of_issue: date("2024-05-01T08:00:00Z"),
        date_of_release_v1: None,
        date_of_release_v2: None,
        questionnaire,
    }
}

pub fn question(id: i64, position: i32, answer_options: Vec<AnswerOption>) -> Question {
    Question {
        id,
        questionnaire_id: 1,
        questionnaire_version: 1,
        position,
        is_mandatory: false,
        variable_name: None,
        answer_options,
        condition: None,
    }
}

pub fn text_option(id: i64, question_id: i64) -> AnswerOption {
    AnswerOption {
        id,
        question_id,
        position: 1,
        answer_type: AnswerType::Text,
        variable_name: None,
        values: vec![],
        values_code: vec![],
        restriction_min: None,
        restriction_max: None,
        condition: None,
    }
}

pub fn select_option(id: i64, question_id: i64, values: &[&str], codes: &[i32]) -> AnswerOption {
    AnswerOption {
        id,
        question_id,
        position: 1,
        answer_type: AnswerType::SingleSelect,
        variable_name: None,
        values: values.iter().map(|v| v.to_string()).collect(),
        values_code: codes.to_vec(),
        restriction_min: None,
        restriction_max: None,
        condition: None,
    }
}

pub fn condition(
    condition_type: ConditionType,
    target: i64,
    operand: ConditionOperand,
    value: &str,
) -> Condition {
    Condition {
        condition_type,
        operand: Some(operand),
        link: Some(ConditionLink::Or),
        value: value.to_string(),
        target_answer_option: Some(target),
    }
}

pub fn external_eq(target: i64, value: &str) -> Condition {
    condition(ConditionType::External, target, ConditionOperand::Equal, value)
}

pub fn internal_this(target: i64) -> Condition {
    condition(ConditionType::InternalThis, target, ConditionOperand::Equal, "")
}

pub fn internal_last_eq(target: i64, value: &str) -> Condition {
    condition(ConditionType::InternalLast, target, ConditionOperand::Equal, value)
}

pub fn date(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid RFC 3339 date")
}

/// In-memory condition target answers, keyed by answer option id.
#[derive(Default)]
pub struct FakeTargetAnswerSource {
    pub external: HashMap<i64, TargetAnswer>,
    pub previous_cycle: HashMap<i64, TargetAnswer>,
}

impl FakeTargetAnswerSource {
    pub fn with_external(answers: Vec<(i64, &str)>) -> Self {
        let mut source = Self::default();
        for (id, value) in answers {
            source.external.insert(
                id,
                TargetAnswer {
                    answer_option_id: id,
                    value: value.to_string(),
                    answer_type: AnswerType::Text,
                },
            );
        }
        source
    }

    pub fn with_previous_cycle(answers: Vec<(i64, &str)>) -> Self {
        let mut source = Self::default();
        for (id, value) in answers {
            source.previous_cycle.insert(
                id,
                TargetAnswer {
                    answer_option_id: id,
                    value: value.to_string(),
                    answer_type: AnswerType::Text,
                },
            );
        }
        source
    }
}

#[async_trait]
impl TargetAnswerSource for FakeTargetAnswerSource {
    async fn external_target_answers(
        &self,
        _pseudonym: &str,
        answer_option_ids: &[i64],
        _released_until: DateTime<Utc>,
    ) -> Result<Vec<TargetAnswer>> {
        Ok(answer_option_ids
            .iter()
            .filter_map(|id| self.external.get(id).cloned())
            .collect())
    }

    async fn previous_cycle_target_answers(
        &self,
        _pseudonym: &str,
        _questionnaire_id: i64,
        _cycle: i32,
        answer_option_ids: &[i64],
    ) -> Result<Vec<TargetAnswer>> {
        Ok(answer_option_ids
            .iter()
            .filter_map(|id| self.previous_cycle.get(id).cloned())
            .collect())
    }
}

/// File storage over a plain map, ids handed out sequentially.
#[derive(Default)]
pub struct FakeFileStore {
    pub files: Mutex<HashMap<i64, UserFileDto>>,
}

#[async_trait]
impl FileStore for FakeFileStore {
    async fn store(
        &self,
        _instance: &QuestionnaireInstance,
        _answer_option: &AnswerOption,
        file: &UserFileDto,
    ) -> Result<i64> {
        let mut files = self.files.lock().unwrap();
        let id = files.len() as i64 + 1;
        files.insert(id, file.clone());
        Ok(id)
    }

    async fn file_name(&self, file_id: i64) -> Result<Option<String>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(&file_id)
            .map(|f| f.file_name.clone()))
    }
}

/// Sample tracker that records registrations and rejects configured ids.
#[derive(Default)]
pub struct FakeSampleTracker {
    pub rejected: Vec<String>,
    pub registered: Mutex<Vec<SampleDto>>,
}

#[async_trait]
impl SampleTracker for FakeSampleTracker {
    async fn register_sample(
        &self,
        _study_id: &str,
        _pseudonym: &str,
        sample: &SampleDto,
    ) -> Result<(), EngineError> {
        if self.rejected.contains(&sample.sample_id) {
            return Err(EngineError::SampleRejected(sample.sample_id.clone()));
        }
        self.registered.lock().unwrap().push(sample.clone());
        Ok(())
    }
}
