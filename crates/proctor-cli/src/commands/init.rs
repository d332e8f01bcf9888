//! The `proctor init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create proctor.toml
    if std::path::Path::new("proctor.toml").exists() {
        println!("proctor.toml already exists, skipping.");
    } else {
        std::fs::write("proctor.toml", SAMPLE_CONFIG)?;
        println!("Created proctor.toml");
    }

    // Create sample exam
    std::fs::create_dir_all("exams")?;
    let sample_path = std::path::Path::new("exams/sample.toml");
    if sample_path.exists() {
        println!("exams/sample.toml already exists, skipping.");
    } else {
        std::fs::write(sample_path, SAMPLE_EXAM)?;
        println!("Created exams/sample.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: proctor validate --exam-file exams/sample.toml");
    println!("  2. Run: proctor take --exam sample");
    println!("  3. Point [content] and [results] in proctor.toml at your exam backend");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# proctor configuration

request_timeout_secs = 30
pass_mark = 80

[content]
type = "directory"
path = "exams"

[results]
type = "jsonl"
path = "results.jsonl"

# To use the exam backend instead:
#
# [content]
# type = "http"
# base_url = "http://localhost:3001"
#
# [results]
# type = "http"
# base_url = "http://localhost:3001"
# token = "${PROCTOR_TOKEN}"
"#;

const SAMPLE_EXAM: &str = r#"[exam]
id = "sample"
title = "Sample Exam"
description = "A short exam to try proctor with"
instructions = "Choose the best answer, then confirm it."

[[slides]]
header = "Welcome"
body = "Page through these slides before the exam starts."

[[slides]]
header = "How answering works"
body = "Select a choice by its letter, then type 'confirm'. Confirmed answers are final."

[[questions]]
question = "Which of these is a primary colour of light?"
choices = ["Green", "Brown", "Pink"]
correct_answer = 0
explanation = "Red, green and blue are the additive primaries."

[[questions]]
question = "How many minutes are in an hour?"
choices = ["30", "60", "100"]
correct_answer = 1
explanation = "An hour has sixty minutes."
"#;
