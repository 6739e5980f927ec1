//! Client-visible error taxonomy of the questionnaire core.
//!
//! Plumbing failures (database, collaborator I/O) travel as `anyhow::Error`
//! with context; everything a caller is expected to branch on lives here.

use thiserror::Error;

use crate::models::InstanceStatus;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A stored value cannot be mapped back to a typed value. Corrupt data or
    /// schema drift; never silently coerced.
    #[error("cannot decode stored answer value: {0}")]
    Decode(String),

    /// The requested status change is illegal from the current status for
    /// this questionnaire's type.
    #[error("status transition from \"{from}\" to \"{to}\" is not allowed")]
    InvalidStatusTransition { from: &'static str, to: &'static str },

    /// The instance status does not permit writing answers at all.
    #[error("questionnaire instance status is \"{status}\" and does not allow to write answers", status = .status.as_str())]
    AnswersNotWritable { status: InstanceStatus },

    /// The sample tracking collaborator rejected a submitted sample id.
    #[error("sample tracking rejected the sample id: {0}")]
    SampleRejected(String),
}

impl EngineError {
    pub fn invalid_transition(from: InstanceStatus, to: InstanceStatus) -> Self {
        Self::InvalidStatusTransition {
            from: from.as_str(),
            to: to.as_str(),
        }
    }
}
