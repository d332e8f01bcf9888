//! proctor-providers — exam content providers and results stores.
//!
//! Implements the collaborator traits from `proctor-core` against the exam
//! backend's HTTP API and against local files, plus in-memory mocks.

pub mod config;
pub mod error;
pub mod http;
pub mod local;
pub mod mock;

pub use config::{
    create_content_provider, create_results_store, load_config, load_config_from, ContentConfig,
    ProctorConfig, ResultsConfig,
};
pub use error::ProviderError;
pub use http::{HttpContentProvider, HttpResultsStore};
pub use local::{DirectoryContentProvider, JsonLinesResultsStore};
