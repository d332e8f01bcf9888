//! Scoring and pass/fail verdicts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Exam;

/// Default pass mark, in percent.
pub const DEFAULT_PASS_MARK: f64 = 80.0;

/// A percentage score in `[0, 100]` with two-decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(f64);

impl Score {
    /// `100 * correct / total`, rounded to two decimals.
    ///
    /// An empty exam scores zero.
    pub fn from_tally(tally: Tally) -> Self {
        if tally.total == 0 {
            return Score(0.0);
        }
        let raw = 100.0 * tally.correct as f64 / tally.total as f64;
        Score(round2(raw).clamp(0.0, 100.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Verdict against a pass mark (inclusive).
    pub fn verdict(self, pass_mark: f64) -> Verdict {
        if self.0 >= pass_mark {
            Verdict::Passed
        } else {
            Verdict::Failed
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Correct answers out of the number of questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub correct: usize,
    pub total: usize,
}

/// Count questions whose recorded answer matches the correct index.
///
/// Unanswered questions count as incorrect. Answers keyed past the last
/// question are ignored.
pub fn tally_answers(exam: &Exam, answers: &BTreeMap<usize, usize>) -> Tally {
    let correct = exam
        .questions
        .iter()
        .enumerate()
        .filter(|(i, q)| answers.get(i).is_some_and(|&choice| q.is_correct(choice)))
        .count();
    Tally {
        correct,
        total: exam.questions.len(),
    }
}

/// Pass/fail outcome shown on the result screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Passed,
    #[serde(rename = "FAIL")]
    Failed,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => write!(f, "PASSED"),
            Verdict::Failed => write!(f, "FAIL"),
        }
    }
}
