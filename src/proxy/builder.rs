//! Per-backend request rewriting.
//!
//! # Responsibilities
//! - Set the backend method (default: the endpoint's)
//! - Build the target URL: balanced host + `url_pattern` with `{param}`
//!   placeholders filled from the endpoint route
//! - Append the query parameters the endpoint allowlist kept
//!
//! A parameter value always fills exactly one path segment: `/` and other
//! reserved characters are percent-encoded, and `.` / `..` are rejected.

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::sync::Arc;
use url::Url;

use crate::config::BackendConfig;
use crate::context::RequestContext;
use crate::error::{ConfigError, ProxyError};
use crate::load_balancer::{Balancer, RoundRobin};
use crate::proxy::{InternalRequest, Proxy, ProxyResponse, SharedProxy, Stage};

/// Rewrites the request for one backend.
#[derive(Debug, Clone)]
pub struct RequestBuilderStage {
    hosts: Arc<[Url]>,
    url_pattern: String,
    method: Option<String>,
    balancer: Arc<dyn Balancer>,
}

impl RequestBuilderStage {
    pub fn from_config(endpoint: &str, backend: &BackendConfig) -> Result<Self, ConfigError> {
        let hosts = backend
            .host
            .iter()
            .map(|h| {
                Url::parse(h).map_err(|e| ConfigError::InvalidEndpoint {
                    endpoint: endpoint.to_string(),
                    reason: format!("backend host '{}': {}", h, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if hosts.is_empty() {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "backend has no hosts".to_string(),
            });
        }
        Ok(Self {
            hosts: hosts.into(),
            url_pattern: backend.url_pattern.clone(),
            method: backend.method.clone(),
            balancer: Arc::new(RoundRobin::new()),
        })
    }

    pub fn with_balancer(mut self, balancer: Arc<dyn Balancer>) -> Self {
        self.balancer = balancer;
        self
    }

    /// Target URL for a request.
    pub fn target_url(&self, request: &InternalRequest) -> Result<Url, ProxyError> {
        let host = self
            .balancer
            .next_host(&self.hosts)
            .ok_or_else(|| ProxyError::RequestBuild("backend has no hosts".to_string()))?;

        let path = fill_params(&self.url_pattern, request)?;
        let mut url = host.clone();
        let base = url.path().trim_end_matches('/').to_string();
        if path.starts_with('/') {
            url.set_path(&format!("{}{}", base, path));
        } else {
            url.set_path(&format!("{}/{}", base, path));
        }

        url.set_query(None);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

/// Characters escaped in a parameter value so it stays a single segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Substitute `{name}` placeholders in one pass over the pattern.
fn fill_params(pattern: &str, request: &InternalRequest) -> Result<String, ProxyError> {
    let mut path = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        path.push_str(&rest[..open]);
        let name = &rest[open + 1..close];
        match request.params.get(name) {
            Some(value) => {
                if value == "." || value == ".." {
                    return Err(ProxyError::Status {
                        status: StatusCode::BAD_REQUEST,
                        message: format!("invalid value for path parameter '{}'", name),
                    });
                }
                path.extend(utf8_percent_encode(value, SEGMENT));
            }
            None => path.push_str(&rest[open..=close]),
        }
        rest = &rest[close + 1..];
    }
    path.push_str(rest);
    Ok(path)
}

impl Stage for RequestBuilderStage {
    fn name(&self) -> &str {
        "request-builder"
    }

    fn wrap(&self, next: SharedProxy) -> SharedProxy {
        Arc::new(Built {
            builder: self.clone(),
            next,
        })
    }
}

struct Built {
    builder: RequestBuilderStage,
    next: SharedProxy,
}

impl Proxy for Built {
    fn call<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a InternalRequest,
    ) -> BoxFuture<'a, Result<ProxyResponse, ProxyError>> {
        Box::pin(async move {
            let mut backend_request = request.clone();
            backend_request.url = self.builder.target_url(request)?.to_string();
            if let Some(method) = &self.builder.method {
                backend_request.method = method.clone();
            }
            self.next.call(ctx, &backend_request).await
        })
    }
}
