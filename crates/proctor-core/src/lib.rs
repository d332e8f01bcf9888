//! proctor-core — Exam session state machine, scoring, and reporting.
//!
//! This crate defines the exam data model, the session state machine a
//! candidate drives, the one-shot result reporter, the back-navigation guard,
//! and the collaborator traits the rest of proctor implements.

pub mod attempt;
pub mod error;
pub mod guard;
pub mod model;
pub mod parser;
pub mod reporter;
pub mod review;
pub mod scoring;
pub mod session;
pub mod traits;

pub use attempt::{AttemptConfig, AttemptOutcome, ExamAttempt};
pub use error::{ExamError, TransitionError};
pub use session::{ExamSession, SessionPhase, SessionSnapshot};
