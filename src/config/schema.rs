//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Service name, reported in logs.
    pub name: String,

    /// Enables the `/__debug` echo route.
    pub debug: bool,

    /// Default endpoint timeout in milliseconds.
    pub timeout_ms: u64,

    /// Default endpoint cache TTL in seconds (0 = no Cache-Control).
    pub cache_ttl_secs: u64,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Exposed endpoints.
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "gateway".to_string(),
            debug: false,
            timeout_ms: 2000,
            cache_ttl_secs: 0,
            listener: ListenerConfig::default(),
            observability: ObservabilityConfig::default(),
            endpoints: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Timeout for an endpoint, falling back to the service default.
    pub fn endpoint_timeout(&self, endpoint: &EndpointConfig) -> Duration {
        Duration::from_millis(endpoint.timeout_ms.unwrap_or(self.timeout_ms))
    }

    /// Cache TTL for an endpoint, falling back to the service default.
    pub fn endpoint_cache_ttl(&self, endpoint: &EndpointConfig) -> Duration {
        Duration::from_secs(endpoint.cache_ttl_secs.unwrap_or(self.cache_ttl_secs))
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A gateway endpoint backed by one or more backends.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Route path, with `{param}` captures.
    pub endpoint: String,

    /// HTTP method the endpoint answers.
    #[serde(default = "default_method")]
    pub method: String,

    /// Overrides the service timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Overrides the service cache TTL.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    /// Inbound headers forwarded to backends (case-insensitive).
    #[serde(default)]
    pub headers_to_pass: Vec<String>,

    /// Query parameters forwarded to backends.
    #[serde(default)]
    pub query_string: Vec<String>,

    /// Name of the response combiner used for multi-backend endpoints.
    #[serde(default = "default_combiner")]
    pub combiner: String,

    /// Backends, in declaration order.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_combiner() -> String {
    "default".to_string()
}

/// Payload encoding of a backend response.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
pub enum Encoding {
    /// JSON object.
    #[default]
    #[serde(rename = "json")]
    Json,
    /// JSON object, or any other JSON value wrapped under `collection`.
    #[serde(rename = "safejson")]
    SafeJson,
    /// Raw text wrapped under `content`.
    #[serde(rename = "string")]
    String,
    /// Body passed through unparsed.
    #[serde(rename = "no-op")]
    NoOp,
}

/// One backend call contributing to an endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URLs, balanced round-robin (e.g., "http://127.0.0.1:3000").
    pub host: Vec<String>,

    /// Path template, with `{param}` placeholders from the endpoint route.
    pub url_pattern: String,

    /// Method for the backend call; defaults to the endpoint method.
    #[serde(default)]
    pub method: Option<String>,

    /// Payload encoding.
    #[serde(default)]
    pub encoding: Encoding,

    /// Extract this (dotted) field as the response data.
    #[serde(default)]
    pub target: Option<String>,

    /// Keep only these (dotted) fields.
    #[serde(default)]
    pub allow: Vec<String>,

    /// Remove these (dotted) fields. Ignored when `allow` is set.
    #[serde(default)]
    pub deny: Vec<String>,

    /// Rename top-level fields: old name → new name.
    #[serde(default)]
    pub mapping: HashMap<String, String>,

    /// Wrap the response data under this key.
    #[serde(default)]
    pub group: Option<String>,

    /// Maximum response body size in bytes, after decompression.
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,
}

fn default_max_response_size() -> usize {
    16 * 1024 * 1024 // 16MB
}

impl BackendConfig {
    /// A JSON backend with no formatting, for programmatic setups.
    pub fn new(host: impl Into<String>, url_pattern: impl Into<String>) -> Self {
        Self {
            host: vec![host.into()],
            url_pattern: url_pattern.into(),
            method: None,
            encoding: Encoding::Json,
            target: None,
            allow: Vec::new(),
            deny: Vec::new(),
            mapping: HashMap::new(),
            group: None,
            max_response_size: default_max_response_size(),
        }
    }
}
