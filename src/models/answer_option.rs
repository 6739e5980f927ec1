use serde::{Deserialize, Serialize};

use super::Condition;

/// Kind of value an answer option captures. The numeric discriminants are the
/// stable ids used in persistence, so they must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum AnswerType {
    None = 0,
    SingleSelect = 1,
    MultiSelect = 2,
    Number = 3,
    Text = 4,
    Date = 5,
    Sample = 6,
    Pzn = 7,
    Image = 8,
    Timestamp = 9,
    File = 10,
}

impl AnswerType {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Self::None),
            1 => Some(Self::SingleSelect),
            2 => Some(Self::MultiSelect),
            3 => Some(Self::Number),
            4 => Some(Self::Text),
            5 => Some(Self::Date),
            6 => Some(Self::Sample),
            7 => Some(Self::Pzn),
            8 => Some(Self::Image),
            9 => Some(Self::Timestamp),
            10 => Some(Self::File),
            _ => None,
        }
    }

    pub fn id(self) -> i32 {
        self as i32
    }
}

/// One answerable item within a question.
///
/// For select types `values` and `values_code` are parallel arrays forming a
/// complete label↔code bijection. `restriction_min`/`restriction_max` bound
/// numeric answers directly and date answers as day offsets from "now".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub position: i32,
    pub answer_type: AnswerType,
    pub variable_name: Option<String>,
    pub values: Vec<String>,
    pub values_code: Vec<i32>,
    pub restriction_min: Option<f64>,
    pub restriction_max: Option<f64>,
    pub condition: Option<Condition>,
}
