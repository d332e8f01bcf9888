//! One-shot delivery of a session's completion record.
//!
//! The reporter holds a latch scoped to one session: the first successful
//! call records the result, later calls return without touching the store.
//! Failures are surfaced, never retried automatically.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use crate::error::ExamError;
use crate::scoring::Score;
use crate::traits::{CompletionRecord, ResultsStore};

/// What a call to [`ResultReporter::report`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The store accepted the record.
    Recorded,
    /// A previous call already recorded this session's result.
    AlreadyRecorded,
    /// Another call is delivering the record right now.
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latch {
    Idle,
    InFlight,
    Recorded,
}

/// Delivers exactly one completion record per session.
pub struct ResultReporter {
    store: Arc<dyn ResultsStore>,
    latch: Arc<Mutex<Latch>>,
    idempotency_key: Uuid,
    timeout: Duration,
}

/// Returns the latch to `Idle` unless the delivery completed.
///
/// Covers transport errors, timeouts, and a caller dropping the future.
struct InFlightGuard {
    latch: Arc<Mutex<Latch>>,
    done: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.done {
            if let Ok(mut latch) = self.latch.lock() {
                *latch = Latch::Idle;
            }
        }
    }
}

impl ResultReporter {
    pub fn new(store: Arc<dyn ResultsStore>, timeout: Duration) -> Self {
        Self {
            store,
            latch: Arc::new(Mutex::new(Latch::Idle)),
            idempotency_key: Uuid::new_v4(),
            timeout,
        }
    }

    /// Key sent with every delivery attempt of this session.
    pub fn idempotency_key(&self) -> Uuid {
        self.idempotency_key
    }

    /// Whether the store has accepted this session's record.
    pub fn is_recorded(&self) -> bool {
        self.latch
            .lock()
            .map(|l| *l == Latch::Recorded)
            .unwrap_or(false)
    }

    /// Send the completion record for `exam_id`.
    pub async fn report(&self, exam_id: &str, score: Score) -> Result<ReportOutcome, ExamError> {
        let mut guard = {
            let mut latch = self
                .latch
                .lock()
                .map_err(|_| ExamError::ReportingFailed("reporter state poisoned".into()))?;
            match *latch {
                Latch::Recorded => return Ok(ReportOutcome::AlreadyRecorded),
                Latch::InFlight => return Ok(ReportOutcome::InFlight),
                Latch::Idle => *latch = Latch::InFlight,
            }
            InFlightGuard {
                latch: Arc::clone(&self.latch),
                done: false,
            }
        };

        let record = CompletionRecord::completed(exam_id, score);
        let delivery = self.store.record(&record, self.idempotency_key);

        match tokio::time::timeout(self.timeout, delivery).await {
            Ok(Ok(())) => {
                if let Ok(mut latch) = self.latch.lock() {
                    *latch = Latch::Recorded;
                }
                guard.done = true;
                tracing::info!(
                    exam_id,
                    score = %score,
                    store = self.store.name(),
                    "completion recorded"
                );
                Ok(ReportOutcome::Recorded)
            }
            Ok(Err(e)) => {
                tracing::warn!(exam_id, "failed to record completion: {e:#}");
                Err(ExamError::ReportingFailed(format!("{e:#}")))
            }
            Err(_) => {
                tracing::warn!(exam_id, "recording completion timed out");
                Err(ExamError::ReportingFailed(format!(
                    "results store did not respond within {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::scoring::Tally;

    /// Store that counts calls and fails the first `failures` of them.
    struct CountingStore {
        calls: AtomicU32,
        failures: u32,
        delay: Duration,
        keys: Mutex<Vec<Uuid>>,
    }

    impl CountingStore {
        fn new(failures: u32, delay: Duration) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                delay,
                keys: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ResultsStore for CountingStore {
        fn name(&self) -> &str {
            "counting"
        }

        async fn record(&self, _record: &CompletionRecord, key: Uuid) -> anyhow::Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.keys.lock().unwrap().push(key);
            tokio::time::sleep(self.delay).await;
            if n < self.failures {
                anyhow::bail!("connection reset");
            }
            Ok(())
        }
    }

    fn score() -> Score {
        Score::from_tally(Tally { correct: 1, total: 2 })
    }

    #[tokio::test]
    async fn second_report_does_not_reach_the_store() {
        let store = Arc::new(CountingStore::new(0, Duration::ZERO));
        let reporter = ResultReporter::new(store.clone(), Duration::from_secs(5));

        assert_eq!(reporter.report("e", score()).await.unwrap(), ReportOutcome::Recorded);
        assert_eq!(
            reporter.report("e", score()).await.unwrap(),
            ReportOutcome::AlreadyRecorded
        );
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert!(reporter.is_recorded());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_reports_produce_one_record() {
        let store = Arc::new(CountingStore::new(0, Duration::from_millis(50)));
        let reporter = ResultReporter::new(store.clone(), Duration::from_secs(5));

        let (a, b) = tokio::join!(reporter.report("e", score()), reporter.report("e", score()));
        let mut outcomes = vec![a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o as u8);
        assert_eq!(outcomes, vec![ReportOutcome::Recorded, ReportOutcome::InFlight]);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_surfaced_and_manual_retry_succeeds() {
        let store = Arc::new(CountingStore::new(1, Duration::ZERO));
        let reporter = ResultReporter::new(store.clone(), Duration::from_secs(5));

        let err = reporter.report("e", score()).await.unwrap_err();
        assert!(matches!(err, ExamError::ReportingFailed(ref m) if m.contains("connection reset")));
        assert!(!reporter.is_recorded());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        assert_eq!(reporter.report("e", score()).await.unwrap(), ReportOutcome::Recorded);
        let keys = store.keys.lock().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], keys[1]);
        assert_eq!(keys[0], reporter.idempotency_key());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_a_reporting_failure() {
        let store = Arc::new(CountingStore::new(0, Duration::from_secs(60)));
        let reporter = ResultReporter::new(store, Duration::from_secs(1));

        let err = reporter.report("e", score()).await.unwrap_err();
        assert!(matches!(err, ExamError::ReportingFailed(_)));
        assert!(!reporter.is_recorded());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_report_releases_the_latch() {
        let store = Arc::new(CountingStore::new(0, Duration::from_secs(10)));
        let reporter = ResultReporter::new(store.clone(), Duration::from_secs(30));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), reporter.report("e", score())).await;
        assert!(abandoned.is_err());

        assert_eq!(reporter.report("e", score()).await.unwrap(), ReportOutcome::Recorded);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
