//! Domain value types for the questionnaire service.
//!
//! Entities are plain structs connected by integer ids. The loaded
//! questionnaire tree (`Questionnaire` → `Question` → `AnswerOption`, each
//! with an optional `Condition`) is a working copy owned by its
//! `QuestionnaireInstance`; filtering mutates that copy, never shared state.

mod answer;
mod answer_option;
mod condition;
mod question;
mod questionnaire;
mod questionnaire_instance;
mod study;

pub use answer::{Answer, AnswerInput, AnswerValue, SampleDto, UserFileDto};
pub use answer_option::{AnswerOption, AnswerType};
pub use condition::{Condition, ConditionLink, ConditionOperand, ConditionType};
pub use question::Question;
pub use questionnaire::{CycleUnit, Questionnaire, QuestionnaireType};
pub use questionnaire_instance::{InstanceStatus, QuestionnaireInstance};
pub use study::StudySettings;
