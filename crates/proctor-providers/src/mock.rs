//! Mock collaborators for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use proctor_core::model::Exam;
use proctor_core::traits::{CompletionRecord, ExamContentProvider, ResultsStore};

use crate::error::ProviderError;

/// A content provider backed by a map of exam id → exam.
pub struct MockContentProvider {
    exams: HashMap<String, Exam>,
    delay: Duration,
    call_count: AtomicU32,
}

impl MockContentProvider {
    pub fn new(exams: impl IntoIterator<Item = Exam>) -> Self {
        Self {
            exams: exams.into_iter().map(|e| (e.id.clone(), e)).collect(),
            delay: Duration::ZERO,
            call_count: AtomicU32::new(0),
        }
    }

    /// Delay every fetch, e.g. to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get the number of fetches made.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ExamContentProvider for MockContentProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_exam(&self, exam_id: &str) -> anyhow::Result<Exam> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.exams
            .get(exam_id)
            .cloned()
            .ok_or_else(|| ProviderError::ExamNotFound(exam_id.to_string()).into())
    }
}

/// A results store that keeps records in memory.
///
/// Can be told to fail its next N calls to exercise reporting failures.
#[derive(Default)]
pub struct MockResultsStore {
    records: Mutex<Vec<(CompletionRecord, Uuid)>>,
    failures_remaining: AtomicU32,
    call_count: AtomicU32,
}

impl MockResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls with an HTTP 503.
    pub fn failing(n: u32) -> Self {
        let store = Self::default();
        store.failures_remaining.store(n, Ordering::SeqCst);
        store
    }

    /// Records accepted so far.
    pub fn records(&self) -> Vec<CompletionRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect()
    }

    /// Idempotency keys seen on accepted records.
    pub fn keys(&self) -> Vec<Uuid> {
        self.records.lock().unwrap().iter().map(|(_, k)| *k).collect()
    }

    /// Get the number of calls made, including failed ones.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResultsStore for MockResultsStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn record(&self, record: &CompletionRecord, idempotency_key: Uuid) -> anyhow::Result<()> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ProviderError::ApiError {
                status: 503,
                message: "service unavailable".into(),
            }
            .into());
        }
        self.records
            .lock()
            .unwrap()
            .push((record.clone(), idempotency_key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::model::{Choice, Question, ReviewContent};
    use proctor_core::scoring::{Score, Tally};

    fn exam(id: &str) -> Exam {
        Exam {
            id: id.into(),
            title: id.into(),
            instructions: String::new(),
            description: String::new(),
            review: ReviewContent::default(),
            questions: vec![Question {
                question: "?".into(),
                choices: vec![Choice::from("y"), Choice::from("n")],
                correct_answer: 0,
                explanation: None,
            }],
        }
    }

    #[tokio::test]
    async fn serves_known_exams() {
        let provider = MockContentProvider::new([exam("a"), exam("b")]);
        assert_eq!(provider.fetch_exam("b").await.unwrap().title, "b");
        assert!(provider.fetch_exam("c").await.is_err());
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn fails_then_records() {
        let store = MockResultsStore::failing(1);
        let record = CompletionRecord::completed("a", Score::from_tally(Tally { correct: 1, total: 1 }));
        assert!(store.record(&record, Uuid::nil()).await.is_err());
        store.record(&record, Uuid::nil()).await.unwrap();
        assert_eq!(store.records(), vec![record]);
        assert_eq!(store.call_count(), 2);
    }
}
