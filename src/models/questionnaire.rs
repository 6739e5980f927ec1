use serde::{Deserialize, Serialize};

use super::{Condition, Question};

/// Who fills out instances of a questionnaire. Decides which status
/// transition table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionnaireType {
    ForProbands,
    ForResearchTeam,
}

impl QuestionnaireType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ForProbands => "for_probands",
            Self::ForResearchTeam => "for_research_team",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "for_probands" => Some(Self::ForProbands),
            "for_research_team" => Some(Self::ForResearchTeam),
            _ => None,
        }
    }
}

/// Recurrence unit of a questionnaire. Only `Spontan` changes core behavior:
/// spontaneous instances have no meaningful date of issue until released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleUnit {
    Once,
    Day,
    Week,
    Month,
    Hour,
    Spontan,
    Date,
}

impl CycleUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Hour => "hour",
            Self::Spontan => "spontan",
            Self::Date => "date",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "once" => Some(Self::Once),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "hour" => Some(Self::Hour),
            "spontan" => Some(Self::Spontan),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

/// A versioned questionnaire template. Immutable once instances reference it;
/// edits create a new `(id, version)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Questionnaire {
    pub id: i64,
    pub version: i32,
    pub study_id: String,
    pub name: String,
    pub questionnaire_type: QuestionnaireType,
    pub cycle_unit: CycleUnit,
    pub questions: Vec<Question>,
    /// Questionnaire-level gate. Decided once when instances are created;
    /// filtering a loaded instance never re-evaluates it.
    pub condition: Option<Condition>,
}
