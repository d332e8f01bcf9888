//! HTTP exam content provider and results store.
//!
//! Both talk to the exam backend's REST API: exams are fetched with
//! `GET {base_url}/exam/{id}/take-exam/{id}` and completions are posted to
//! `POST {base_url}/user/examResult`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

use proctor_core::model::Exam;
use proctor_core::traits::{CompletionRecord, ExamContentProvider, ResultsStore};

use crate::error::ProviderError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";
pub const DEFAULT_CONTENT_ROUTE: &str = "/exam/{exam_id}/take-exam/{exam_id}";
pub const DEFAULT_RESULTS_ROUTE: &str = "/user/examResult";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn build_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))
}

fn normalize_base(base_url: &str) -> String {
    let base = if base_url.is_empty() {
        DEFAULT_BASE_URL
    } else {
        base_url
    };
    base.trim_end_matches('/').to_string()
}

/// Exam ids go straight into the request path.
fn check_exam_id(exam_id: &str) -> Result<(), ProviderError> {
    let valid = !exam_id.is_empty()
        && exam_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ProviderError::InvalidExamId(exam_id.to_string()))
    }
}

async fn error_for_status(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    match status {
        401 | 403 => ProviderError::AuthenticationFailed(body),
        _ => ProviderError::ApiError {
            status,
            message: body,
        },
    }
}

/// Fetches exams from the backend over HTTP.
pub struct HttpContentProvider {
    base_url: String,
    route: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpContentProvider {
    pub fn new(base_url: &str, route: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: normalize_base(base_url),
            route: route.unwrap_or_else(|| DEFAULT_CONTENT_ROUTE.to_string()),
            timeout,
            client: build_client(timeout)?,
        })
    }

    fn exam_url(&self, exam_id: &str) -> String {
        format!("{}{}", self.base_url, self.route.replace("{exam_id}", exam_id))
    }
}

#[async_trait]
impl ExamContentProvider for HttpContentProvider {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_exam(&self, exam_id: &str) -> anyhow::Result<Exam> {
        check_exam_id(exam_id)?;

        let response = self
            .client
            .get(self.exam_url(exam_id))
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, &self.base_url, self.timeout.as_secs()))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(ProviderError::ExamNotFound(exam_id.to_string()).into());
        }
        if status >= 400 {
            return Err(error_for_status(response).await.into());
        }

        let exam: Exam = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedBody(format!("failed to parse exam: {e}")))?;

        tracing::debug!(questions = exam.questions.len(), "exam fetched");
        Ok(exam)
    }
}

/// Posts completion records to the backend over HTTP.
///
/// Note: Custom Debug impl masks the bearer token to prevent accidental exposure in logs.
pub struct HttpResultsStore {
    base_url: String,
    route: String,
    token: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpResultsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResultsStore")
            .field("base_url", &self.base_url)
            .field("route", &self.route)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl HttpResultsStore {
    pub fn new(
        base_url: &str,
        route: Option<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: normalize_base(base_url),
            route: route.unwrap_or_else(|| DEFAULT_RESULTS_ROUTE.to_string()),
            token: token.filter(|t| !t.is_empty()),
            timeout,
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ResultsStore for HttpResultsStore {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, record), fields(exam_id = %record.exam_id))]
    async fn record(&self, record: &CompletionRecord, idempotency_key: Uuid) -> anyhow::Result<()> {
        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, self.route))
            .header("Idempotency-Key", idempotency_key.to_string())
            .json(record);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, &self.base_url, self.timeout.as_secs()))?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await.into());
        }
        Ok(())
    }
}
