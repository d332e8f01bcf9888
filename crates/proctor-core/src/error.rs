//! Exam error types.
//!
//! Collaborator failures are converted into these at the core boundary so
//! front ends can decide what to show without string matching.

use thiserror::Error;

/// Errors surfaced by an exam attempt.
#[derive(Debug, Error)]
pub enum ExamError {
    /// The exam could not be loaded: provider error, malformed data, or timeout.
    /// Fatal to the session.
    #[error("exam content unavailable: {0}")]
    ContentUnavailable(String),

    /// An operation was rejected by the session's guards. State is unchanged.
    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    /// The completion record could not be delivered. Recoverable by a manual retry.
    #[error("reporting failed: {0}")]
    ReportingFailed(String),
}

impl ExamError {
    /// Returns `true` if the front end can offer a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExamError::ReportingFailed(_))
    }
}

/// Why the session rejected an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("no answer selected")]
    NoSelection,

    #[error("answer already confirmed")]
    AlreadyConfirmed,

    #[error("answer not confirmed yet")]
    NotConfirmed,

    #[error("already at the last question")]
    LastQuestion,

    #[error("already at the first question")]
    FirstQuestion,

    #[error("question {target} is beyond the farthest question reached ({farthest})")]
    BeyondFarthest { target: usize, farthest: usize },

    #[error("submission is only possible from the last question")]
    NotOnLastQuestion,

    #[error("exam already submitted")]
    AlreadySubmitted,

    #[error("exam not submitted yet")]
    NotSubmitted,

    #[error("choice {index} out of range ({count} choices)")]
    ChoiceOutOfRange { index: usize, count: usize },
}
