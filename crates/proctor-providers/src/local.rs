//! Local file collaborators: a directory of TOML exams and a JSON-lines
//! results log.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use proctor_core::model::Exam;
use proctor_core::parser;
use proctor_core::traits::{CompletionRecord, ExamContentProvider, ResultsStore};

use crate::error::ProviderError;

/// Serves exams from `<dir>/<exam-id>.toml`, falling back to a scan of the
/// directory for a file whose `[exam] id` matches.
pub struct DirectoryContentProvider {
    dir: PathBuf,
}

impl DirectoryContentProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ExamContentProvider for DirectoryContentProvider {
    fn name(&self) -> &str {
        "directory"
    }

    async fn fetch_exam(&self, exam_id: &str) -> anyhow::Result<Exam> {
        let dir = self.dir.clone();
        let exam_id = exam_id.to_string();
        tokio::task::spawn_blocking(move || find_exam(&dir, &exam_id))
            .await
            .context("exam loader task failed")?
    }
}

fn find_exam(dir: &Path, exam_id: &str) -> anyhow::Result<Exam> {
    if exam_id.contains(['/', '\\']) || exam_id.starts_with('.') {
        return Err(ProviderError::InvalidExamId(exam_id.to_string()).into());
    }

    let direct = dir.join(format!("{exam_id}.toml"));
    if direct.is_file() {
        return parser::parse_exam_file(&direct);
    }

    parser::load_exam_directory(dir)?
        .into_iter()
        .find(|exam| exam.id == exam_id)
        .ok_or_else(|| ProviderError::ExamNotFound(exam_id.to_string()).into())
}

/// Appends each completion record as one JSON line.
pub struct JsonLinesResultsStore {
    path: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoggedRecord<'a> {
    #[serde(flatten)]
    record: &'a CompletionRecord,
    idempotency_key: Uuid,
    recorded_at: chrono::DateTime<chrono::Utc>,
}

impl JsonLinesResultsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ResultsStore for JsonLinesResultsStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn record(&self, record: &CompletionRecord, idempotency_key: Uuid) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(&LoggedRecord {
            record,
            idempotency_key,
            recorded_at: chrono::Utc::now(),
        })
        .context("failed to serialize completion record")?;
        line.push('\n');

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open results log: {}", path.display()))?;
            file.write_all(line.as_bytes())
                .with_context(|| format!("failed to write results log: {}", path.display()))?;
            Ok(())
        })
        .await
        .context("results writer task failed")?
    }
}
