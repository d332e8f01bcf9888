//! Configuration and collaborator factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use proctor_core::scoring::DEFAULT_PASS_MARK;
use proctor_core::traits::{ExamContentProvider, ResultsStore};
use proctor_core::AttemptConfig;

use crate::http::{HttpContentProvider, HttpResultsStore, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::local::{DirectoryContentProvider, JsonLinesResultsStore};

/// Where exams come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentConfig {
    Http {
        #[serde(default = "default_base_url")]
        base_url: String,
        /// Path template; `{exam_id}` is substituted.
        #[serde(default)]
        route: Option<String>,
    },
    Directory {
        path: PathBuf,
    },
}

impl Default for ContentConfig {
    fn default() -> Self {
        ContentConfig::Http {
            base_url: default_base_url(),
            route: None,
        }
    }
}

/// Where completion records go.
///
/// Note: Custom Debug impl masks the bearer token to prevent accidental exposure in logs.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResultsConfig {
    Http {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default)]
        route: Option<String>,
        #[serde(default)]
        token: Option<String>,
    },
    Jsonl {
        path: PathBuf,
    },
}

impl std::fmt::Debug for ResultsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultsConfig::Http {
                base_url,
                route,
                token,
            } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("route", route)
                .field("token", &token.as_ref().map(|_| "***"))
                .finish(),
            ResultsConfig::Jsonl { path } => {
                f.debug_struct("Jsonl").field("path", path).finish()
            }
        }
    }
}

impl Default for ResultsConfig {
    fn default() -> Self {
        ResultsConfig::Http {
            base_url: default_base_url(),
            route: None,
            token: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Top-level proctor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProctorConfig {
    /// Timeout for fetching an exam and for posting a result.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Minimum percentage for a PASSED verdict.
    #[serde(default = "default_pass_mark")]
    pub pass_mark: f64,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub results: ResultsConfig,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_pass_mark() -> f64 {
    DEFAULT_PASS_MARK
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
            pass_mark: default_pass_mark(),
            content: ContentConfig::default(),
            results: ResultsConfig::default(),
        }
    }
}

impl ProctorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timeouts and pass mark for an attempt.
    pub fn attempt_config(&self) -> AttemptConfig {
        AttemptConfig {
            load_timeout: self.request_timeout(),
            report_timeout: self.request_timeout(),
            pass_mark: self.pass_mark,
        }
    }

    /// Apply `PROCTOR_BASE_URL` / `PROCTOR_TOKEN` overrides.
    ///
    /// The base URL only replaces HTTP endpoints; local sources are left alone.
    fn apply_overrides(&mut self, base_url: Option<String>, token: Option<String>) {
        if let Some(url) = base_url {
            if let ContentConfig::Http { base_url, .. } = &mut self.content {
                *base_url = url.clone();
            }
            if let ResultsConfig::Http { base_url, .. } = &mut self.results {
                *base_url = url;
            }
        }
        if let Some(value) = token {
            if let ResultsConfig::Http { token, .. } = &mut self.results {
                *token = Some(value);
            }
        }
    }

    fn resolve_env(&mut self) {
        match &mut self.content {
            ContentConfig::Http { base_url, route } => {
                *base_url = resolve_env_vars(base_url);
                if let Some(r) = route {
                    *r = resolve_env_vars(r);
                }
            }
            ContentConfig::Directory { path } => {
                *path = PathBuf::from(resolve_env_vars(&path.to_string_lossy()));
            }
        }
        match &mut self.results {
            ResultsConfig::Http {
                base_url,
                route,
                token,
            } => {
                *base_url = resolve_env_vars(base_url);
                if let Some(r) = route {
                    *r = resolve_env_vars(r);
                }
                if let Some(t) = token {
                    *t = resolve_env_vars(t);
                }
            }
            ResultsConfig::Jsonl { path } => {
                *path = PathBuf::from(resolve_env_vars(&path.to_string_lossy()));
            }
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are copied verbatim and never rescanned. An unterminated
/// `${` is kept as is.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `proctor.toml` in the current directory
/// 2. `~/.config/proctor/config.toml`
///
/// Environment variable overrides: `PROCTOR_BASE_URL`, `PROCTOR_TOKEN`.
pub fn load_config() -> Result<ProctorConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ProctorConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("proctor.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ProctorConfig::default(),
    };

    // Override values are taken literally, so they go in after expansion.
    config.resolve_env();
    config.apply_overrides(
        std::env::var("PROCTOR_BASE_URL").ok(),
        std::env::var("PROCTOR_TOKEN").ok(),
    );

    // Relative local paths are taken relative to the config file.
    if let Some(dir) = config_path.as_deref().and_then(Path::parent) {
        if let ContentConfig::Directory { path } = &mut config.content {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
        if let ResultsConfig::Jsonl { path } = &mut config.results {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
    }

    tracing::debug!(?config, source = ?config_path, "configuration loaded");
    Ok(config)
}

fn parse_config(content: &str) -> Result<ProctorConfig> {
    let config: ProctorConfig = toml::from_str(content)?;
    if !(0.0..=100.0).contains(&config.pass_mark) {
        anyhow::bail!("pass_mark must be between 0 and 100, got {}", config.pass_mark);
    }
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("proctor"))
}

/// Create the exam content provider described by the configuration.
pub fn create_content_provider(config: &ProctorConfig) -> Result<Box<dyn ExamContentProvider>> {
    match &config.content {
        ContentConfig::Http { base_url, route } => Ok(Box::new(HttpContentProvider::new(
            base_url,
            route.clone(),
            config.request_timeout(),
        )?)),
        ContentConfig::Directory { path } => Ok(Box::new(DirectoryContentProvider::new(path))),
    }
}

/// Create the results store described by the configuration.
pub fn create_results_store(config: &ProctorConfig) -> Result<Arc<dyn ResultsStore>> {
    match &config.results {
        ResultsConfig::Http {
            base_url,
            route,
            token,
        } => Ok(Arc::new(HttpResultsStore::new(
            base_url,
            route.clone(),
            token.clone(),
            config.request_timeout(),
        )?)),
        ResultsConfig::Jsonl { path } => Ok(Arc::new(JsonLinesResultsStore::new(path))),
    }
}
