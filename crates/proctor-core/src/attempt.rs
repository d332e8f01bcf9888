//! Exam attempt orchestrator.
//!
//! Ties one session to its collaborators: loads the exam with a timeout,
//! owns the [`ExamSession`] and its [`ResultReporter`], and hands the score
//! to the reporter on submission.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::{ExamError, TransitionError};
use crate::model::Exam;
use crate::reporter::{ReportOutcome, ResultReporter};
use crate::scoring::{Score, Tally, Verdict, DEFAULT_PASS_MARK};
use crate::session::{ExamSession, SessionPhase};
use crate::traits::{ExamContentProvider, ResultsStore};

/// Configuration for an attempt.
#[derive(Debug, Clone)]
pub struct AttemptConfig {
    /// Upper bound on fetching the exam.
    pub load_timeout: Duration,
    /// Upper bound on posting the completion record.
    pub report_timeout: Duration,
    /// Minimum score (percent, inclusive) for a `PASSED` verdict.
    pub pass_mark: f64,
}

impl Default for AttemptConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(30),
            report_timeout: Duration::from_secs(30),
            pass_mark: DEFAULT_PASS_MARK,
        }
    }
}

/// Final outcome of a submitted attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptOutcome {
    pub exam_id: String,
    pub tally: Tally,
    pub score: Score,
    pub verdict: Verdict,
}

/// One candidate's attempt at one exam.
pub struct ExamAttempt {
    exam_id: String,
    session: ExamSession,
    reporter: ResultReporter,
    pass_mark: f64,
}

impl ExamAttempt {
    /// Fetch and validate the exam, then start a session at question one.
    ///
    /// Any provider error, malformed exam, or timeout becomes
    /// [`ExamError::ContentUnavailable`]. Dropping the returned future
    /// abandons the load without creating a session.
    pub async fn load(
        content: &dyn ExamContentProvider,
        results: Arc<dyn ResultsStore>,
        exam_id: &str,
        config: &AttemptConfig,
    ) -> Result<Self, ExamError> {
        tracing::info!(exam_id, provider = content.name(), "loading exam");

        let mut exam = match tokio::time::timeout(config.load_timeout, content.fetch_exam(exam_id))
            .await
        {
            Ok(Ok(exam)) => exam,
            Ok(Err(e)) => {
                tracing::error!(exam_id, "failed to load exam: {e:#}");
                return Err(ExamError::ContentUnavailable(format!("{e:#}")));
            }
            Err(_) => {
                tracing::error!(exam_id, "loading exam timed out");
                return Err(ExamError::ContentUnavailable(format!(
                    "exam '{exam_id}' did not load within {}s",
                    config.load_timeout.as_secs()
                )));
            }
        };

        // Records are keyed by the requested id, not the backend's document id.
        exam.id = exam_id.to_string();

        Self::from_exam(Arc::new(exam), results, config).inspect_err(|e| {
            tracing::error!(exam_id, "{e}");
        })
    }

    /// Start an attempt from an exam already in hand.
    ///
    /// Fails with [`ExamError::ContentUnavailable`] if the exam has any
    /// [`Exam::defects`].
    pub fn from_exam(
        exam: Arc<Exam>,
        results: Arc<dyn ResultsStore>,
        config: &AttemptConfig,
    ) -> Result<Self, ExamError> {
        Ok(Self {
            exam_id: exam.id.clone(),
            session: ExamSession::new(exam)?,
            reporter: ResultReporter::new(results, config.report_timeout),
            pass_mark: config.pass_mark,
        })
    }

    pub fn exam_id(&self) -> &str {
        &self.exam_id
    }

    pub fn exam(&self) -> &Exam {
        self.session.exam()
    }

    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    /// Mutable access for the answering operations.
    pub fn session_mut(&mut self) -> &mut ExamSession {
        &mut self.session
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn reporter(&self) -> &ResultReporter {
        &self.reporter
    }

    /// The outcome, once the session has been submitted.
    pub fn outcome(&self) -> Option<AttemptOutcome> {
        self.session.submission().map(|s| AttemptOutcome {
            exam_id: self.exam_id.clone(),
            tally: s.tally,
            score: s.score,
            verdict: s.score.verdict(self.pass_mark),
        })
    }

    /// Submit the session and report the result.
    ///
    /// If the session is scored but the report fails, the session stays
    /// submitted and [`ExamAttempt::report_result`] can be called to retry.
    pub async fn submit(&mut self) -> Result<AttemptOutcome, ExamError> {
        self.session.submit()?;
        self.report_result().await?;
        self.outcome()
            .ok_or_else(|| ExamError::ReportingFailed("session has no submission".into()))
    }

    /// Report the submitted score. Safe to call repeatedly.
    pub async fn report_result(&self) -> Result<ReportOutcome, ExamError> {
        let submission = self
            .session
            .submission()
            .ok_or(TransitionError::NotSubmitted)?;
        self.reporter.report(&self.exam_id, submission.score).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    use crate::model::{Choice, Question, ReviewContent};
    use crate::traits::CompletionRecord;

    struct StaticContent(Option<Exam>, Duration);

    #[async_trait]
    impl ExamContentProvider for StaticContent {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch_exam(&self, exam_id: &str) -> anyhow::Result<Exam> {
            tokio::time::sleep(self.1).await;
            self.0
                .clone()
                .ok_or_else(|| anyhow::anyhow!("exam {exam_id} not found"))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        records: Mutex<Vec<CompletionRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl ResultsStore for RecordingStore {
        fn name(&self) -> &str {
            "recording"
        }

        async fn record(&self, record: &CompletionRecord, _key: Uuid) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("HTTP 503");
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn exam(correct: &[usize]) -> Exam {
        Exam {
            id: String::new(),
            title: "Onboarding".into(),
            instructions: String::new(),
            description: String::new(),
            review: ReviewContent::default(),
            questions: correct
                .iter()
                .map(|&c| Question {
                    question: "q".into(),
                    choices: vec![Choice::from("a"), Choice::from("b")],
                    correct_answer: c,
                    explanation: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn full_attempt_records_one_completion() {
        let content = StaticContent(Some(exam(&[0, 1])), Duration::ZERO);
        let store = Arc::new(RecordingStore::default());
        let mut attempt =
            ExamAttempt::load(&content, store.clone(), "onboarding", &AttemptConfig::default())
                .await
                .unwrap();
        assert_eq!(attempt.exam().id, "onboarding");

        let s = attempt.session_mut();
        s.select_answer(0).unwrap();
        s.confirm_answer().unwrap();
        s.advance().unwrap();
        s.select_answer(0).unwrap();
        s.confirm_answer().unwrap();

        let outcome = attempt.submit().await.unwrap();
        assert_eq!(outcome.score.to_string(), "50.00");
        assert_eq!(outcome.verdict, Verdict::Failed);

        assert_eq!(
            attempt.report_result().await.unwrap(),
            ReportOutcome::AlreadyRecorded
        );
        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 1, "failing attempts are recorded too, once");
        assert_eq!(records[0].exam_id, "onboarding");
    }

    #[tokio::test]
    async fn missing_exam_is_content_unavailable() {
        let content = StaticContent(None, Duration::ZERO);
        let err = ExamAttempt::load(
            &content,
            Arc::new(RecordingStore::default()),
            "nope",
            &AttemptConfig::default(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ExamError::ContentUnavailable(ref m) if m.contains("not found")));
    }

    #[tokio::test]
    async fn malformed_exam_is_content_unavailable() {
        let content = StaticContent(Some(exam(&[5])), Duration::ZERO);
        let err = ExamAttempt::load(
            &content,
            Arc::new(RecordingStore::default()),
            "bad",
            &AttemptConfig::default(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ExamError::ContentUnavailable(ref m) if m.contains("malformed")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let content = StaticContent(Some(exam(&[0])), Duration::from_secs(120));
        let config = AttemptConfig {
            load_timeout: Duration::from_secs(5),
            ..AttemptConfig::default()
        };
        let err = ExamAttempt::load(&content, Arc::new(RecordingStore::default()), "slow", &config)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ExamError::ContentUnavailable(ref m) if m.contains("within 5s")));
    }

    #[tokio::test]
    async fn report_failure_keeps_submission_for_retry() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let mut attempt =
            ExamAttempt::from_exam(Arc::new(exam(&[0])), store, &AttemptConfig::default())
                .unwrap();
        let err = attempt.submit().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(attempt.session().is_submitted());
        assert!(attempt.outcome().is_some());
        assert!(!attempt.reporter().is_recorded());
    }

    #[tokio::test]
    async fn submit_before_last_question_is_rejected() {
        let store = Arc::new(RecordingStore::default());
        let mut attempt =
            ExamAttempt::from_exam(Arc::new(exam(&[0, 0])), store.clone(), &AttemptConfig::default())
                .unwrap();
        let err = attempt.submit().await.unwrap_err();
        assert!(matches!(
            err,
            ExamError::InvalidTransition(TransitionError::NotOnLastQuestion)
        ));
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[test]
    fn from_exam_rejects_empty_exam() {
        let result = ExamAttempt::from_exam(
            Arc::new(exam(&[])),
            Arc::new(RecordingStore::default()),
            &AttemptConfig::default(),
        );
        assert!(matches!(result, Err(ExamError::ContentUnavailable(_))));
    }
}
