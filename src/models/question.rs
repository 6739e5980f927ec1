use serde::{Deserialize, Serialize};

use super::{AnswerOption, Condition};

/// A question of one questionnaire version. A question defined with zero
/// answer options is informational; it survives answer-option pruning but is
/// still gated by its own condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub questionnaire_id: i64,
    pub questionnaire_version: i32,
    pub position: i32,
    pub is_mandatory: bool,
    pub variable_name: Option<String>,
    pub answer_options: Vec<AnswerOption>,
    pub condition: Option<Condition>,
}
