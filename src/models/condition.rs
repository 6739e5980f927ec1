use serde::{Deserialize, Serialize};

/// Where a condition's target answer lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Target belongs to an instance of a different questionnaire.
    External,
    /// Target is another answer option within the same instance.
    InternalThis,
    /// Target belongs to the previous cycle's instance of the same
    /// questionnaire.
    InternalLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperand {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionLink {
    And,
    Or,
    Xor,
}

/// Boolean visibility gate attached to a questionnaire, question or answer
/// option. `value` holds the literal operand(s), semicolon-separated for
/// multi-valued comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub condition_type: ConditionType,
    pub operand: Option<ConditionOperand>,
    /// Defaults to OR when study authoring left it unset.
    pub link: Option<ConditionLink>,
    pub value: String,
    pub target_answer_option: Option<i64>,
}
