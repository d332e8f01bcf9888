//! The exam session state machine.
//!
//! An [`ExamSession`] is the single source of truth for one candidate's
//! attempt at one exam. Every operation is synchronous; guard violations are
//! returned as [`TransitionError`] and never modify state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{ExamError, TransitionError};
use crate::model::{choice_letter, Exam, Question};
use crate::scoring::{tally_answers, Score, Tally};

/// Where the session is in its lifecycle.
///
/// There is no loading phase here: a session only exists once its exam has
/// loaded. While [`crate::attempt::ExamAttempt::load`] is pending there is no
/// session to act on, which is the loading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    Answering { index: usize, confirmed: bool },
    Submitted,
}

/// Feedback shown after an answer is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub is_correct: bool,
    pub message: String,
}

impl Feedback {
    fn for_answer(question: &Question, choice: usize) -> Self {
        if question.is_correct(choice) {
            Feedback {
                is_correct: true,
                message: "Correct answer!".to_string(),
            }
        } else {
            let correct = question
                .correct_choice()
                .map(|c| c.text.as_str())
                .unwrap_or_default();
            Feedback {
                is_correct: false,
                message: format!("Incorrect! The correct answer is: {correct}"),
            }
        }
    }
}

/// The outcome of a submitted session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Submission {
    pub tally: Tally,
    pub score: Score,
}

/// State of one in-progress attempt.
#[derive(Debug, Clone)]
pub struct ExamSession {
    exam: Arc<Exam>,
    current: usize,
    answers: BTreeMap<usize, usize>,
    confirmed: BTreeSet<usize>,
    farthest: usize,
    submission: Option<Submission>,
}

impl ExamSession {
    /// Start a session at the first question.
    ///
    /// Rejects exams with [`Exam::defects`] (no questions, too few choices,
    /// correct answer out of range) as [`ExamError::ContentUnavailable`].
    pub fn new(exam: Arc<Exam>) -> Result<Self, ExamError> {
        let defects = exam.defects();
        if !defects.is_empty() {
            let reasons: Vec<String> = defects.iter().map(ToString::to_string).collect();
            return Err(ExamError::ContentUnavailable(format!(
                "exam '{}' is malformed: {}",
                exam.id,
                reasons.join("; ")
            )));
        }
        Ok(Self {
            exam,
            current: 0,
            answers: BTreeMap::new(),
            confirmed: BTreeSet::new(),
            farthest: 0,
            submission: None,
        })
    }

    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Farthest question index reached so far.
    pub fn high_water_mark(&self) -> usize {
        self.farthest
    }

    pub fn question_count(&self) -> usize {
        self.exam.questions.len()
    }

    pub fn current_question(&self) -> &Question {
        &self.exam.questions[self.current]
    }

    /// The recorded choice for a question, if any.
    pub fn answer(&self, index: usize) -> Option<usize> {
        self.answers.get(&index).copied()
    }

    pub fn answers(&self) -> &BTreeMap<usize, usize> {
        &self.answers
    }

    pub fn is_confirmed(&self, index: usize) -> bool {
        self.confirmed.contains(&index)
    }

    pub fn is_submitted(&self) -> bool {
        self.submission.is_some()
    }

    pub fn submission(&self) -> Option<Submission> {
        self.submission
    }

    fn is_last(&self) -> bool {
        self.current + 1 == self.question_count()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_submitted() {
            SessionPhase::Submitted
        } else {
            SessionPhase::Answering {
                index: self.current,
                confirmed: self.is_confirmed(self.current),
            }
        }
    }

    /// Feedback for the current question, present once it is confirmed.
    pub fn feedback(&self) -> Option<Feedback> {
        if !self.is_confirmed(self.current) {
            return None;
        }
        let choice = self.answer(self.current)?;
        Some(Feedback::for_answer(self.current_question(), choice))
    }

    fn ensure_active(&self) -> Result<(), TransitionError> {
        if self.is_submitted() {
            return Err(TransitionError::AlreadySubmitted);
        }
        Ok(())
    }

    /// Record a choice for the current question.
    ///
    /// Returns `Ok(false)` without changing anything when the question is
    /// already confirmed.
    pub fn select_answer(&mut self, choice: usize) -> Result<bool, TransitionError> {
        self.ensure_active()?;
        let count = self.current_question().choices.len();
        if choice >= count {
            return Err(TransitionError::ChoiceOutOfRange {
                index: choice,
                count,
            });
        }
        if self.is_confirmed(self.current) {
            tracing::debug!(question = self.current, "selection ignored, answer confirmed");
            return Ok(false);
        }
        self.answers.insert(self.current, choice);
        Ok(true)
    }

    /// Lock in the current question's answer and produce feedback.
    pub fn confirm_answer(&mut self) -> Result<Feedback, TransitionError> {
        self.ensure_active()?;
        if self.is_confirmed(self.current) {
            return Err(TransitionError::AlreadyConfirmed);
        }
        let choice = self
            .answer(self.current)
            .ok_or(TransitionError::NoSelection)?;
        self.confirmed.insert(self.current);
        Ok(Feedback::for_answer(self.current_question(), choice))
    }

    /// Move to the next question. Requires a confirmed answer.
    pub fn advance(&mut self) -> Result<usize, TransitionError> {
        self.ensure_active()?;
        if !self.is_confirmed(self.current) {
            return Err(TransitionError::NotConfirmed);
        }
        if self.is_last() {
            return Err(TransitionError::LastQuestion);
        }
        self.current += 1;
        self.farthest = self.farthest.max(self.current);
        Ok(self.current)
    }

    /// Move to the previous question.
    pub fn retreat(&mut self) -> Result<usize, TransitionError> {
        self.ensure_active()?;
        if self.current == 0 {
            return Err(TransitionError::FirstQuestion);
        }
        let target = self.current - 1;
        if target > self.farthest {
            return Err(TransitionError::BeyondFarthest {
                target,
                farthest: self.farthest,
            });
        }
        self.current = target;
        Ok(self.current)
    }

    /// Score the attempt. Only possible from the last question.
    pub fn submit(&mut self) -> Result<Submission, TransitionError> {
        self.ensure_active()?;
        if !self.is_last() {
            return Err(TransitionError::NotOnLastQuestion);
        }
        let tally = tally_answers(&self.exam, &self.answers);
        let submission = Submission {
            tally,
            score: Score::from_tally(tally),
        };
        self.submission = Some(submission);
        tracing::info!(
            exam_id = %self.exam.id,
            correct = tally.correct,
            total = tally.total,
            score = %submission.score,
            "exam submitted"
        );
        Ok(submission)
    }

    pub fn can_confirm(&self) -> bool {
        !self.is_submitted()
            && !self.is_confirmed(self.current)
            && self.answer(self.current).is_some()
    }

    pub fn can_advance(&self) -> bool {
        !self.is_submitted() && self.is_confirmed(self.current) && !self.is_last()
    }

    pub fn can_retreat(&self) -> bool {
        !self.is_submitted() && self.current > 0 && self.current - 1 <= self.farthest
    }

    pub fn can_submit(&self) -> bool {
        !self.is_submitted() && self.is_last()
    }

    /// Everything a presentation layer needs to render the current question.
    pub fn snapshot(&self) -> SessionSnapshot {
        let question = self.current_question();
        let selected = self.answer(self.current);
        SessionSnapshot {
            title: self.exam.title.clone(),
            instructions: self.exam.instructions.clone(),
            index: self.current,
            total: self.question_count(),
            high_water_mark: self.farthest,
            question: question.question.clone(),
            choices: question
                .choices
                .iter()
                .enumerate()
                .map(|(i, c)| ChoiceView {
                    letter: choice_letter(i),
                    text: c.text.clone(),
                    selected: selected == Some(i),
                })
                .collect(),
            confirmed: self.is_confirmed(self.current),
            feedback: self.feedback(),
            can_confirm: self.can_confirm(),
            can_advance: self.can_advance(),
            can_retreat: self.can_retreat(),
            can_submit: self.can_submit(),
        }
    }
}

/// Read-only view of the session for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub title: String,
    pub instructions: String,
    pub index: usize,
    pub total: usize,
    pub high_water_mark: usize,
    pub question: String,
    pub choices: Vec<ChoiceView>,
    pub confirmed: bool,
    pub feedback: Option<Feedback>,
    pub can_confirm: bool,
    pub can_advance: bool,
    pub can_retreat: bool,
    pub can_submit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceView {
    pub letter: String,
    pub text: String,
    pub selected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Choice, ReviewContent};

    /// Exam whose question `i` has choices `opt0..opt3` with `correct[i]` right.
    fn exam(correct: &[usize]) -> Arc<Exam> {
        Arc::new(Exam {
            id: "exam-1".into(),
            title: "Fire Safety".into(),
            instructions: "Choose the best answer".into(),
            description: String::new(),
            review: ReviewContent::default(),
            questions: correct
                .iter()
                .enumerate()
                .map(|(i, &c)| Question {
                    question: format!("Question {i}"),
                    choices: (0..4).map(|k| Choice::from(format!("opt{k}").as_str())).collect(),
                    correct_answer: c,
                    explanation: None,
                })
                .collect(),
        })
    }

    fn answer(session: &mut ExamSession, choice: usize) {
        assert!(session.select_answer(choice).unwrap());
        session.confirm_answer().unwrap();
    }

    #[test]
    fn four_questions_three_correct_scores_75() {
        let mut s = ExamSession::new(exam(&[0, 1, 2, 3])).unwrap();
        answer(&mut s, 0);
        s.advance().unwrap();
        answer(&mut s, 1);
        s.advance().unwrap();
        answer(&mut s, 2);
        s.advance().unwrap();
        answer(&mut s, 0);

        let submission = s.submit().unwrap();
        assert_eq!(submission.tally, Tally { correct: 3, total: 4 });
        assert_eq!(submission.score.to_string(), "75.00");
        assert_eq!(s.phase(), SessionPhase::Submitted);
    }

    #[test]
    fn selection_is_frozen_after_confirmation() {
        let mut s = ExamSession::new(exam(&[0, 0])).unwrap();
        assert!(s.select_answer(1).unwrap());
        s.confirm_answer().unwrap();
        assert!(!s.select_answer(2).unwrap());
        assert_eq!(s.answer(0), Some(1));
    }

    #[test]
    fn selection_can_change_before_confirmation() {
        let mut s = ExamSession::new(exam(&[0, 0])).unwrap();
        s.select_answer(1).unwrap();
        s.select_answer(3).unwrap();
        assert_eq!(s.answer(0), Some(3));
    }

    #[test]
    fn out_of_range_choice_is_rejected() {
        let mut s = ExamSession::new(exam(&[0])).unwrap();
        assert_eq!(
            s.select_answer(4),
            Err(TransitionError::ChoiceOutOfRange { index: 4, count: 4 })
        );
        assert_eq!(s.answer(0), None);
    }

    #[test]
    fn confirm_requires_a_selection() {
        let mut s = ExamSession::new(exam(&[0, 0])).unwrap();
        assert_eq!(s.confirm_answer(), Err(TransitionError::NoSelection));
        assert!(!s.is_confirmed(0));
        assert!(s.feedback().is_none());
    }

    #[test]
    fn confirm_twice_is_rejected() {
        let mut s = ExamSession::new(exam(&[0, 0])).unwrap();
        answer(&mut s, 0);
        assert_eq!(s.confirm_answer(), Err(TransitionError::AlreadyConfirmed));
    }

    #[test]
    fn incorrect_feedback_names_the_correct_choice() {
        let mut s = ExamSession::new(exam(&[2])).unwrap();
        s.select_answer(0).unwrap();
        let fb = s.confirm_answer().unwrap();
        assert!(!fb.is_correct);
        assert_eq!(fb.message, "Incorrect! The correct answer is: opt2");
        assert_eq!(s.feedback(), Some(fb));
    }

    #[test]
    fn correct_feedback() {
        let mut s = ExamSession::new(exam(&[2])).unwrap();
        s.select_answer(2).unwrap();
        let fb = s.confirm_answer().unwrap();
        assert!(fb.is_correct);
        assert_eq!(fb.message, "Correct answer!");
    }

    #[test]
    fn advance_requires_confirmation() {
        let mut s = ExamSession::new(exam(&[0, 0, 0])).unwrap();
        assert_eq!(s.advance(), Err(TransitionError::NotConfirmed));
        s.select_answer(0).unwrap();
        assert_eq!(s.advance(), Err(TransitionError::NotConfirmed));
        assert_eq!(s.current_index(), 0);
        s.confirm_answer().unwrap();
        assert_eq!(s.advance(), Ok(1));
        assert_eq!(s.high_water_mark(), 1);
    }

    #[test]
    fn advance_past_last_question_is_rejected() {
        let mut s = ExamSession::new(exam(&[0])).unwrap();
        answer(&mut s, 0);
        assert_eq!(s.advance(), Err(TransitionError::LastQuestion));
        assert_eq!(s.current_index(), 0);
    }

    #[test]
    fn new_question_starts_unconfirmed() {
        let mut s = ExamSession::new(exam(&[0, 0])).unwrap();
        answer(&mut s, 0);
        s.advance().unwrap();
        assert_eq!(
            s.phase(),
            SessionPhase::Answering {
                index: 1,
                confirmed: false
            }
        );
        assert!(s.feedback().is_none());
    }

    #[test]
    fn retreat_at_first_question_is_rejected() {
        let mut s = ExamSession::new(exam(&[0, 0])).unwrap();
        assert_eq!(s.retreat(), Err(TransitionError::FirstQuestion));
        assert_eq!(s.current_index(), 0);
    }

    #[test]
    fn revisited_question_keeps_its_answer_locked() {
        let mut s = ExamSession::new(exam(&[0, 0, 0])).unwrap();
        answer(&mut s, 1);
        s.advance().unwrap();
        answer(&mut s, 0);
        s.advance().unwrap();

        assert_eq!(s.retreat(), Ok(1));
        assert_eq!(s.retreat(), Ok(0));
        assert!(s.is_confirmed(0));
        assert!(!s.select_answer(0).unwrap());
        assert_eq!(s.answer(0), Some(1));
        assert!(s.feedback().is_some());
        assert_eq!(s.high_water_mark(), 2);

        // Forward again over already-confirmed questions.
        assert_eq!(s.advance(), Ok(1));
        assert_eq!(s.advance(), Ok(2));
        assert_eq!(s.high_water_mark(), 2);
    }

    #[test]
    fn submit_only_from_last_question() {
        let mut s = ExamSession::new(exam(&[0, 0])).unwrap();
        assert_eq!(s.submit(), Err(TransitionError::NotOnLastQuestion));
        answer(&mut s, 0);
        s.advance().unwrap();
        let sub = s.submit().unwrap();
        assert_eq!(sub.tally, Tally { correct: 1, total: 2 });
        assert_eq!(sub.score.value(), 50.0);
    }

    #[test]
    fn everything_is_rejected_after_submission() {
        let mut s = ExamSession::new(exam(&[0])).unwrap();
        s.submit().unwrap();
        assert_eq!(s.select_answer(0), Err(TransitionError::AlreadySubmitted));
        assert_eq!(s.confirm_answer(), Err(TransitionError::AlreadySubmitted));
        assert_eq!(s.advance(), Err(TransitionError::AlreadySubmitted));
        assert_eq!(s.retreat(), Err(TransitionError::AlreadySubmitted));
        assert_eq!(s.submit(), Err(TransitionError::AlreadySubmitted));
        assert!(!s.can_submit());
    }

    #[test]
    fn high_water_mark_never_decreases() {
        // Deterministic pseudo-random walk over the operations.
        let mut s = ExamSession::new(exam(&[0, 1, 2, 3, 0, 1])).unwrap();
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut previous = s.high_water_mark();
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let _ = match seed % 4 {
                0 => s.select_answer((seed >> 8) as usize % 4).map(|_| ()),
                1 => s.confirm_answer().map(|_| ()),
                2 => s.advance().map(|_| ()),
                _ => s.retreat().map(|_| ()),
            };
            let hwm = s.high_water_mark();
            assert!(hwm >= previous);
            assert!(s.current_index() <= hwm);
            assert!(hwm < s.question_count());
            previous = hwm;
        }
    }

    #[test]
    fn snapshot_reflects_enablement_flags() {
        let mut s = ExamSession::new(exam(&[1, 0])).unwrap();
        let snap = s.snapshot();
        assert_eq!(snap.total, 2);
        assert_eq!(snap.choices[0].letter, "A");
        assert!(!snap.can_confirm && !snap.can_advance && !snap.can_retreat && !snap.can_submit);

        s.select_answer(1).unwrap();
        let snap = s.snapshot();
        assert!(snap.choices[1].selected);
        assert!(snap.can_confirm);

        s.confirm_answer().unwrap();
        s.advance().unwrap();
        let snap = s.snapshot();
        assert!(snap.can_retreat);
        assert!(snap.can_submit);
        assert!(!snap.can_advance);
        assert_eq!(snap.question, "Question 1");
    }

    #[test]
    fn exam_without_questions_cannot_start_a_session() {
        let err = ExamSession::new(exam(&[])).unwrap_err();
        assert!(matches!(err, ExamError::ContentUnavailable(ref m) if m.contains("no questions")));
    }

    #[test]
    fn out_of_range_correct_answer_cannot_start_a_session() {
        let err = ExamSession::new(exam(&[0, 7])).unwrap_err();
        assert!(matches!(err, ExamError::ContentUnavailable(ref m) if m.contains("question 2")));
    }
}
