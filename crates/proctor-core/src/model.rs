//! Core data model types for proctor.
//!
//! These are the fundamental types the whole system uses to represent an
//! exam: its review slides, its questions, and their choices. The serde
//! attributes follow the wire format of the exam content backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single exam, as loaded into a session. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    /// Exam identifier (the key the content provider was asked for).
    #[serde(default, alias = "_id")]
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Instructional text shown above every question.
    #[serde(default)]
    pub instructions: String,
    /// Short description shown in listings.
    #[serde(default)]
    pub description: String,
    /// Review material paged through before the exam.
    #[serde(default, rename = "reviewerContent")]
    pub review: ReviewContent,
    /// The questions, in presentation order.
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// Slideshow-style review material attached to an exam.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewContent {
    #[serde(default)]
    pub slides: Vec<Slide>,
}

/// One review slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub body_text: String,
    /// Image reference (URL or path), if any.
    #[serde(default)]
    pub image: Option<String>,
}

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// The question text.
    pub question: String,
    /// Choices, identified by position.
    pub choices: Vec<Choice>,
    /// 0-based index of the correct choice.
    pub correct_answer: usize,
    /// Optional explanation shown after the exam.
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Question {
    /// Whether `choice` is the correct answer to this question.
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_answer
    }

    /// The correct choice, if the correct-answer index is in range.
    pub fn correct_choice(&self) -> Option<&Choice> {
        self.choices.get(self.correct_answer)
    }
}

/// A choice's display text. Correctness is never stored here.
///
/// Deserializes from either `{"text": "..."}` or a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ChoiceRepr")]
pub struct Choice {
    pub text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChoiceRepr {
    Bare(String),
    Object { text: String },
}

impl From<ChoiceRepr> for Choice {
    fn from(repr: ChoiceRepr) -> Self {
        match repr {
            ChoiceRepr::Bare(text) | ChoiceRepr::Object { text } => Choice { text },
        }
    }
}

impl From<&str> for Choice {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

/// Letter label for a choice position: 0 → `A`, 1 → `B`, ...
///
/// Positions past `Z` continue as `AA`, `AB`, ... so labels stay unique.
pub fn choice_letter(index: usize) -> String {
    let mut n = index;
    let mut label = Vec::new();
    loop {
        label.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

/// Parse a letter label back into a choice position (case-insensitive).
pub fn parse_choice_letter(label: &str) -> Option<usize> {
    let label = label.trim();
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut index = 0usize;
    for c in label.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

/// A structural problem that makes an exam unusable in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExamDefect {
    NoQuestions,
    TooFewChoices { question: usize, count: usize },
    CorrectAnswerOutOfRange { question: usize, index: usize, count: usize },
}

impl fmt::Display for ExamDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamDefect::NoQuestions => write!(f, "exam has no questions"),
            ExamDefect::TooFewChoices { question, count } => write!(
                f,
                "question {} has {count} choice(s), at least 2 required",
                question + 1
            ),
            ExamDefect::CorrectAnswerOutOfRange {
                question,
                index,
                count,
            } => write!(
                f,
                "question {} marks choice {index} as correct but only has {count} choices",
                question + 1
            ),
        }
    }
}

impl Exam {
    /// Check the structural requirements a session relies on.
    ///
    /// Returns every defect found, in question order.
    pub fn defects(&self) -> Vec<ExamDefect> {
        let mut defects = Vec::new();
        if self.questions.is_empty() {
            defects.push(ExamDefect::NoQuestions);
        }
        for (i, q) in self.questions.iter().enumerate() {
            if q.choices.len() < 2 {
                defects.push(ExamDefect::TooFewChoices {
                    question: i,
                    count: q.choices.len(),
                });
            }
            if q.correct_answer >= q.choices.len() {
                defects.push(ExamDefect::CorrectAnswerOutOfRange {
                    question: i,
                    index: q.correct_answer,
                    count: q.choices.len(),
                });
            }
        }
        defects
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}
