//! The questionnaire core: condition evaluation, visibility filtering,
//! answer value codec, batch validation and release versioning.

pub mod codec;
pub mod condition_checker;
pub mod question_cleaner;
pub mod questionnaire_filter;
pub mod validator;
pub mod versioning;

pub use codec::{FileStore, SampleTracker, ValueCodec};
pub use condition_checker::is_condition_met;
pub use questionnaire_filter::{QuestionnaireFilter, TargetAnswer, TargetAnswerSource};
pub use validator::{validate_answers, InvalidAnswer, ValidationResult};
