//! The `proctor validate` command.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;

use proctor_core::parser::{self, Severity};

pub fn execute(exam_path: PathBuf) -> Result<()> {
    let exams = if exam_path.is_dir() {
        parser::load_exam_directory(&exam_path)?
    } else {
        vec![parser::parse_exam_file(&exam_path)?]
    };

    let mut total_warnings = 0;
    let mut total_errors = 0;

    for exam in &exams {
        println!("Exam: {} [{}] ({} questions)", exam.title, exam.id, exam.questions.len());

        for w in parser::validate_exam(exam) {
            let prefix = w
                .question
                .map(|q| format!("  [Q{}]", q + 1))
                .unwrap_or_else(|| "  ".to_string());
            match w.severity {
                Severity::Error => {
                    println!("{prefix} ERROR: {}", w.message);
                    total_errors += 1;
                }
                Severity::Warning => {
                    println!("{prefix} WARNING: {}", w.message);
                    total_warnings += 1;
                }
            }
        }
    }

    let mut ids: HashMap<&str, usize> = HashMap::new();
    for exam in &exams {
        *ids.entry(exam.id.as_str()).or_default() += 1;
    }
    let mut duplicates: Vec<_> = ids.into_iter().filter(|(_, n)| *n > 1).collect();
    duplicates.sort();
    for (id, n) in duplicates {
        println!("ERROR: exam id '{id}' is used by {n} files");
        total_errors += 1;
    }

    if total_errors == 0 && total_warnings == 0 {
        println!("All exams valid.");
    } else if total_errors == 0 {
        println!("\n{total_warnings} warning(s) found.");
    } else {
        anyhow::bail!("{total_errors} error(s), {total_warnings} warning(s) found");
    }

    Ok(())
}
