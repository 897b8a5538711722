//! Normalized request passed through the backend pipeline.

use bytes::Bytes;
use std::collections::HashMap;

/// The gateway's internal view of a request to forward.
///
/// Built once per inbound call; stages that need a different target
/// (method/URL per backend) work on a clone.
#[derive(Debug, Clone, Default)]
pub struct InternalRequest {
    pub method: String,
    pub url: String,
    /// Header name → ordered values.
    pub headers: HashMap<String, Vec<String>>,
    pub body: Option<Bytes>,
    /// Query parameters left after the endpoint allowlist was applied.
    pub query: Vec<(String, String)>,
    /// Path parameters captured by the endpoint route.
    pub params: HashMap<String, String>,
}

impl InternalRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Values of a header, looked up case-insensitively.
    pub fn header_values(&self, name: &str) -> Option<&[String]> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }
}
