//! Collaborator trait definitions.
//!
//! These async traits are implemented by the `proctor-providers` crate
//! (HTTP backends, local files, in-memory mocks).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Exam;
use crate::scoring::Score;

// ---------------------------------------------------------------------------
// Exam content provider
// ---------------------------------------------------------------------------

/// Source of exam content, keyed by exam identifier.
#[async_trait]
pub trait ExamContentProvider: Send + Sync {
    /// Human-readable provider name (e.g. "http").
    fn name(&self) -> &str;

    /// Fetch an exam. The returned exam has not been validated yet.
    async fn fetch_exam(&self, exam_id: &str) -> anyhow::Result<Exam>;
}

// ---------------------------------------------------------------------------
// Results store
// ---------------------------------------------------------------------------

/// Destination for completion records.
#[async_trait]
pub trait ResultsStore: Send + Sync {
    /// Human-readable store name.
    fn name(&self) -> &str;

    /// Record one completed attempt.
    ///
    /// `idempotency_key` is stable for the lifetime of a session; stores that
    /// support deduplication should pass it on.
    async fn record(&self, record: &CompletionRecord, idempotency_key: Uuid)
        -> anyhow::Result<()>;
}

/// Completion status sent with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    Completed,
}

/// The record sent to the results store when an exam is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub exam_id: String,
    pub status: CompletionStatus,
    pub score: Score,
}

impl CompletionRecord {
    pub fn completed(exam_id: impl Into<String>, score: Score) -> Self {
        Self {
            exam_id: exam_id.into(),
            status: CompletionStatus::Completed,
            score,
        }
    }
}
