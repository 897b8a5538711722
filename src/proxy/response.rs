//! Response object produced by backend calls and combiners.

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Response metadata relayed from the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// The backend's true status code; 0 when unknown.
    pub status_code: u16,
    pub headers: HashMap<String, Vec<String>>,
}

/// A decoded backend response, or the combination of several.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyResponse {
    pub data: Map<String, Value>,
    pub is_complete: bool,
    pub metadata: Metadata,
    /// Unparsed body for backends that skip decoding.
    pub io: Option<Bytes>,
}

impl ProxyResponse {
    /// A complete response with the given status and data.
    pub fn new(status_code: u16, data: Map<String, Value>) -> Self {
        Self {
            data,
            is_complete: true,
            metadata: Metadata {
                status_code,
                headers: HashMap::new(),
            },
            io: None,
        }
    }

    /// Best-effort 500 response describing a local failure.
    pub fn internal_error(message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("error".to_string(), Value::String(message.into()));
        Self {
            data,
            is_complete: false,
            metadata: Metadata {
                status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                headers: HashMap::new(),
            },
            io: None,
        }
    }

    /// True when there is something to render.
    pub fn has_content(&self) -> bool {
        !self.data.is_empty() || self.io.is_some()
    }

    /// True for 200 and 201, the statuses rendered without passthrough.
    pub fn is_success(&self) -> bool {
        self.metadata.status_code == StatusCode::OK.as_u16()
            || self.metadata.status_code == StatusCode::CREATED.as_u16()
    }
}

/// Convert an `http` header map into ordered string lists.
pub fn header_lists(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::with_capacity(headers.keys_len());
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            out.entry(name.as_str().to_string())
                .or_default()
                .push(v.to_string());
        }
    }
    out
}
