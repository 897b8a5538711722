//! Inbound request translation.
//!
//! # Responsibilities
//! - Turn an axum request into the pipeline's [`InternalRequest`]
//! - Forward only allowlisted headers and query parameters
//! - Add `X-Forwarded-For` and the gateway `User-Agent`
//! - Forward the `x-request-id` set by the server
//!
//! # Design Decisions
//! - Header allowlist matching is case-insensitive; query keys are exact
//! - The body is buffered once, up to the listener's size limit

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::ProxyError;
use crate::proxy::InternalRequest;

/// Gateway identification header, set on every response.
pub const X_GATEWAY: &str = "x-gateway";

/// Completeness header, set on every response.
pub const X_GATEWAY_COMPLETED: &str = "x-gateway-completed";

pub const COMPLETE: &str = "complete";
pub const INCOMPLETE: &str = "incomplete";

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Correlation ID, always forwarded to backends.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Value of the `X-Gateway` header and of the outbound `User-Agent`.
pub const GATEWAY_USER_AGENT: &str = concat!("gateway-proxy/", env!("CARGO_PKG_VERSION"));

/// Which parts of an inbound request reach the backends.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    headers_to_pass: Vec<String>,
    query_string: Vec<String>,
}

impl RequestFilter {
    pub fn new(headers_to_pass: &[String], query_string: &[String]) -> Self {
        Self {
            headers_to_pass: headers_to_pass.iter().map(|h| h.to_ascii_lowercase()).collect(),
            query_string: query_string.to_vec(),
        }
    }

    fn passes_header(&self, name: &str) -> bool {
        self.headers_to_pass.iter().any(|h| h.eq_ignore_ascii_case(name))
    }

    fn passes_query(&self, key: &str) -> bool {
        self.query_string.iter().any(|q| q == key)
    }

    /// Build the pipeline request, consuming the inbound body.
    pub async fn translate(
        &self,
        request: Request<Body>,
        params: HashMap<String, String>,
        client: Option<SocketAddr>,
        max_body_size: usize,
    ) -> Result<InternalRequest, ProxyError> {
        let (parts, body) = request.into_parts();

        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in &parts.headers {
            if !self.passes_header(name.as_str()) {
                continue;
            }
            if let Ok(v) = value.to_str() {
                headers.entry(name.as_str().to_string()).or_default().push(v.to_string());
            }
        }
        headers.insert(
            header::USER_AGENT.as_str().to_string(),
            vec![GATEWAY_USER_AGENT.to_string()],
        );
        if let Some(id) = parts.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok()) {
            headers.insert(X_REQUEST_ID.to_string(), vec![id.to_string()]);
        }
        if let Some(addr) = client {
            headers.insert(X_FORWARDED_FOR.to_string(), vec![addr.ip().to_string()]);
        }

        let query: Vec<(String, String)> = parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .filter(|(k, _)| self.passes_query(k))
                    .collect()
            })
            .unwrap_or_default();

        let bytes = axum::body::to_bytes(body, max_body_size)
            .await
            .map_err(|e| ProxyError::Status {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                message: format!("failed to read request body: {}", e),
            })?;

        Ok(InternalRequest {
            method: parts.method.as_str().to_string(),
            url: parts.uri.path().to_string(),
            headers,
            body: (!bytes.is_empty()).then_some(bytes),
            query,
            params,
        })
    }
}
