//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0) and URLs
//! - Detect duplicate endpoints
//! - Reject no-op backends on merging endpoints (a raw body cannot be merged)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Combiner names are checked against the registry when endpoints are built

use axum::http::Method;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{Encoding, GatewayConfig};

/// A single semantic problem in the configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("endpoint '{endpoint}' must start with '/'")]
    RelativePath { endpoint: String },

    #[error("endpoint '{endpoint}' has invalid method '{method}'")]
    InvalidMethod { endpoint: String, method: String },

    #[error("endpoint '{endpoint}' has no backends")]
    NoBackends { endpoint: String },

    #[error("endpoint '{endpoint}' has a backend without hosts")]
    NoHosts { endpoint: String },

    #[error("endpoint '{endpoint}' has invalid backend host '{host}'")]
    InvalidHost { endpoint: String, host: String },

    #[error("endpoint '{endpoint}' has a zero timeout")]
    ZeroTimeout { endpoint: String },

    #[error("endpoint '{endpoint}' has a backend with a zero max_response_size")]
    ZeroResponseSize { endpoint: String },

    #[error("endpoint '{endpoint}' mixes a no-op backend with other backends")]
    NoOpMerge { endpoint: String },

    #[error("endpoint {method} '{endpoint}' is declared more than once")]
    Duplicate { endpoint: String, method: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for ep in &config.endpoints {
        let endpoint = ep.endpoint.clone();

        if !ep.endpoint.starts_with('/') {
            errors.push(ValidationError::RelativePath { endpoint: endpoint.clone() });
        }

        let method = ep.method.to_uppercase();
        if !is_valid_method(&method) {
            errors.push(ValidationError::InvalidMethod {
                endpoint: endpoint.clone(),
                method: ep.method.clone(),
            });
        }

        if !seen.insert((method.clone(), ep.endpoint.clone())) {
            errors.push(ValidationError::Duplicate {
                endpoint: endpoint.clone(),
                method,
            });
        }

        if config.endpoint_timeout(ep).is_zero() {
            errors.push(ValidationError::ZeroTimeout { endpoint: endpoint.clone() });
        }

        if ep.backends.is_empty() {
            errors.push(ValidationError::NoBackends { endpoint: endpoint.clone() });
        }

        if ep.backends.len() > 1 && ep.backends.iter().any(|b| b.encoding == Encoding::NoOp) {
            errors.push(ValidationError::NoOpMerge { endpoint: endpoint.clone() });
        }

        for backend in &ep.backends {
            if backend.max_response_size == 0 {
                errors.push(ValidationError::ZeroResponseSize { endpoint: endpoint.clone() });
            }
            if backend.host.is_empty() {
                errors.push(ValidationError::NoHosts { endpoint: endpoint.clone() });
            }
            for host in &backend.host {
                if Url::parse(host).is_err() {
                    errors.push(ValidationError::InvalidHost {
                        endpoint: endpoint.clone(),
                        host: host.clone(),
                    });
                }
            }
            if let Some(method) = &backend.method {
                if !is_valid_method(&method.to_uppercase()) {
                    errors.push(ValidationError::InvalidMethod {
                        endpoint: endpoint.clone(),
                        method: method.clone(),
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_valid_method(method: &str) -> bool {
    matches!(
        Method::from_bytes(method.as_bytes()),
        Ok(m) if m == Method::GET
            || m == Method::POST
            || m == Method::PUT
            || m == Method::PATCH
            || m == Method::DELETE
            || m == Method::HEAD
            || m == Method::OPTIONS
    )
}
