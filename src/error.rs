//! Error types shared across the pipeline.
//!
//! Fetch failures are deliberately *not* errors: the fetch path reports
//! absence (`None`) and logs, per the crawl's degrade-don't-abort policy.
//! The enums here cover the fatal class: unreadable configuration, broken
//! output paths, and invalid CLI input, all of which abort before any
//! crawling starts.

use std::io;

use thiserror::Error;

/// Fatal pipeline errors. Everything here aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid argument: {0}")]
    InvalidArg(String),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors raised while constructing the fetch stack.
///
/// Once a [`crate::fetch::Fetcher`] exists, its fetch path never surfaces
/// an error; these cover construction only.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cache directory {path} is unusable: {source}")]
    CacheDir {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
