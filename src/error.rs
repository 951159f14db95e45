// src/error.rs

//! Unified error handling for the harvester.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Expected markup was not found on a page
    #[error("Extraction error at {url}: expected {expected}")]
    Extraction { url: String, expected: String },

    /// Page cache backing store could not be used
    #[error("Cache unavailable: {0}")]
    Cache(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Run was cancelled while waiting on I/O
    #[error("Operation cancelled")]
    Cancelled,

    /// Failure inside a named crawl stage
    #[error("{stage} failed for {subject}: {source}")]
    Stage {
        stage: &'static str,
        subject: String,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create an extraction error for a page.
    pub fn extraction(url: impl fmt::Display, expected: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.to_string(),
            expected: expected.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wrap an error with the stage and identifier it failed on.
    pub fn in_stage(self, stage: &'static str, subject: impl fmt::Display) -> Self {
        Self::Stage {
            stage,
            subject: subject.to_string(),
            source: Box::new(self),
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Attach crawl stage context to a result.
pub trait StageExt<T> {
    fn stage(self, stage: &'static str, subject: impl fmt::Display) -> Result<T>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: &'static str, subject: impl fmt::Display) -> Result<T> {
        self.map_err(|e| e.in_stage(stage, subject))
    }
}
