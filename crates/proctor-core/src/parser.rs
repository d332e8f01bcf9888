//! TOML exam file parser.
//!
//! Loads exams from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Choice, Exam, ExamDefect, Question, ReviewContent, Slide};

/// Intermediate TOML structure for parsing exam files.
#[derive(Debug, Deserialize)]
struct TomlExamFile {
    exam: TomlExamHeader,
    #[serde(default)]
    slides: Vec<TomlSlide>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlExamHeader {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    instructions: String,
}

#[derive(Debug, Deserialize)]
struct TomlSlide {
    #[serde(default)]
    header: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    question: String,
    choices: Vec<String>,
    correct_answer: usize,
    #[serde(default)]
    explanation: Option<String>,
}

/// Parse a single TOML file into an `Exam`.
pub fn parse_exam_file(path: &Path) -> Result<Exam> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read exam file: {}", path.display()))?;

    parse_exam_str(&content, path)
}

/// Parse a TOML string into an `Exam` (useful for testing).
pub fn parse_exam_str(content: &str, source_path: &Path) -> Result<Exam> {
    let parsed: TomlExamFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let slides = parsed
        .slides
        .into_iter()
        .map(|s| Slide {
            header: s.header,
            body_text: s.body,
            image: s.image,
        })
        .collect();

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| Question {
            question: q.question,
            choices: q.choices.into_iter().map(|text| Choice { text }).collect(),
            correct_answer: q.correct_answer,
            explanation: q.explanation,
        })
        .collect();

    Ok(Exam {
        id: parsed.exam.id,
        title: parsed.exam.title,
        instructions: parsed.exam.instructions,
        description: parsed.exam.description,
        review: ReviewContent { slides },
        questions,
    })
}

/// Recursively load all `.toml` exam files from a directory.
pub fn load_exam_directory(dir: &Path) -> Result<Vec<Exam>> {
    let mut exams = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            exams.extend(load_exam_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_exam_file(&path) {
                Ok(exam) => exams.push(exam),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(exams)
}

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The exam cannot be loaded into a session.
    Error,
    /// The exam works but is probably not what the author meant.
    Warning,
}

/// A finding from exam validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub severity: Severity,
    /// 0-based question index (if applicable).
    pub question: Option<usize>,
    pub message: String,
}

/// Validate an exam for structural defects and common authoring mistakes.
pub fn validate_exam(exam: &Exam) -> Vec<ValidationWarning> {
    let mut warnings: Vec<ValidationWarning> = exam
        .defects()
        .into_iter()
        .map(|d| ValidationWarning {
            severity: Severity::Error,
            question: match d {
                ExamDefect::NoQuestions => None,
                ExamDefect::TooFewChoices { question, .. }
                | ExamDefect::CorrectAnswerOutOfRange { question, .. } => {
                    Some(question)
                }
            },
            message: d.to_string(),
        })
        .collect();

    if exam.title.trim().is_empty() {
        warnings.push(ValidationWarning {
            severity: Severity::Warning,
            question: None,
            message: "title is empty".into(),
        });
    }

    let mut seen_questions = HashSet::new();
    for (i, q) in exam.questions.iter().enumerate() {
        if q.question.trim().is_empty() {
            warnings.push(ValidationWarning {
                severity: Severity::Warning,
                question: Some(i),
                message: "question text is empty".into(),
            });
        } else if !seen_questions.insert(q.question.trim()) {
            warnings.push(ValidationWarning {
                severity: Severity::Warning,
                question: Some(i),
                message: format!("duplicate question: {}", q.question.trim()),
            });
        }

        // Identical choices stay distinguishable by position, but read as a typo.
        let mut seen_choices = HashSet::new();
        for c in &q.choices {
            if !seen_choices.insert(c.text.trim()) {
                warnings.push(ValidationWarning {
                    severity: Severity::Warning,
                    question: Some(i),
                    message: format!("duplicate choice text: {}", c.text.trim()),
                });
            }
        }

        if q.explanation.as_deref().map_or(true, |e| e.trim().is_empty()) {
            warnings.push(ValidationWarning {
                severity: Severity::Warning,
                question: Some(i),
                message: "no explanation provided".into(),
            });
        }
    }

    warnings
}
