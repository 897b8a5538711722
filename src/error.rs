//! Error types shared by the backend pipeline and the endpoint layer.
//!
//! # Design Decisions
//! - A backend status code is data, never an error; only local failures land here
//! - Errors that know their outward status expose it via [`ProxyError::status_code`]
//! - Config errors are raised while building endpoints, never per request

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::config::validation::ValidationError;

/// Boxed source error for transport and I/O failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while executing a backend call or an endpoint pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    /// The outbound request could not be built (bad method, URL or header).
    #[error("failed to build backend request: {0}")]
    RequestBuild(String),

    /// Network or transport failure talking to the backend.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The backend payload did not parse into the expected shape.
    #[error("failed to decode backend response: {0}")]
    Decode(String),

    /// Reading the response body failed.
    #[error("failed to read backend response body: {0}")]
    Body(#[source] BoxError),

    /// The request context was cancelled or its deadline passed.
    #[error("request cancelled")]
    Cancelled,

    /// The endpoint deadline fired before the pipeline finished.
    #[error("endpoint timed out after {0:?}")]
    Timeout(Duration),

    /// An error that carries the outward status code to report.
    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// Unexpected local failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// The status code carried by the error itself, if any.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ProxyError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for cancellation and deadline errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ProxyError::Cancelled | ProxyError::Timeout(_))
    }
}

impl From<hyper_util::client::legacy::Error> for ProxyError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        ProxyError::Transport(Box::new(err))
    }
}

impl From<axum::http::Error> for ProxyError {
    fn from(err: axum::http::Error) -> Self {
        ProxyError::RequestBuild(err.to_string())
    }
}

/// Errors raised while loading configuration or setting up endpoints.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("unknown response combiner '{0}'")]
    UnknownCombiner(String),

    #[error("response combiner '{0}' is already registered")]
    DuplicateCombiner(String),

    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
