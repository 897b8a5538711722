//! Backend request executor.
//!
//! # Data Flow
//! ```text
//! InternalRequest
//!     → build_outbound (method check, body suppression, deep header copy,
//!       Content-Length derivation)
//!     → Transport::send, raced against the request context
//!     → context re-check (a late success after the deadline is discarded)
//!     → StatusHandler (failure becomes a 500 response, not an error)
//!     → ResponseParser (decode or pass through)
//! ```
//!
//! # Design Decisions
//! - The backend status code is preserved end to end
//! - The outbound body is moved into the transport call and released with it
//! - Deadline wins over a response that arrives after it

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Method, Request, Uri};
use futures_util::future::BoxFuture;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::ProxyError;
use crate::proxy::decoder::ResponseParser;
use crate::proxy::request::InternalRequest;
use crate::proxy::response::ProxyResponse;
use crate::proxy::status::{PassThroughStatusHandler, StatusHandler};
use crate::proxy::transport::Transport;
use crate::proxy::Proxy;

/// Executes a single backend call.
#[derive(Clone)]
pub struct BackendExecutor {
    transport: Arc<dyn Transport>,
    status_handler: Arc<dyn StatusHandler>,
    parser: ResponseParser,
}

impl BackendExecutor {
    /// Executor with the pass-through status handler.
    pub fn new(transport: Arc<dyn Transport>, parser: ResponseParser) -> Self {
        Self {
            transport,
            status_handler: Arc::new(PassThroughStatusHandler),
            parser,
        }
    }

    pub fn with_status_handler(mut self, status_handler: Arc<dyn StatusHandler>) -> Self {
        self.status_handler = status_handler;
        self
    }

    pub async fn execute(
        &self,
        ctx: &RequestContext,
        request: &InternalRequest,
    ) -> Result<ProxyResponse, ProxyError> {
        let outbound = build_outbound(request)?;

        let result = tokio::select! {
            biased;
            _ = ctx.done() => Err(ProxyError::Cancelled),
            res = self.transport.send(ctx, outbound) => res,
        };

        if ctx.is_done() {
            tracing::debug!(url = %request.url, "Discarding backend response after cancellation");
            return Err(ProxyError::Cancelled);
        }
        let response = result?;

        let response = match self.status_handler.handle(ctx, response) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "Status handler failed");
                return Ok(ProxyResponse::internal_error(e.to_string()));
            }
        };

        self.parser.parse(response).await
    }
}

impl Proxy for BackendExecutor {
    fn call<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a InternalRequest,
    ) -> BoxFuture<'a, Result<ProxyResponse, ProxyError>> {
        Box::pin(self.execute(ctx, request))
    }
}

/// Build the wire request for a backend call.
pub fn build_outbound(request: &InternalRequest) -> Result<Request<Body>, ProxyError> {
    let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
        .map_err(|e| ProxyError::RequestBuild(format!("method '{}': {}", request.method, e)))?;
    let uri: Uri = request
        .url
        .parse()
        .map_err(|e| ProxyError::RequestBuild(format!("url '{}': {}", request.url, e)))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(ProxyError::RequestBuild(format!(
            "url '{}' is not absolute",
            request.url
        )));
    }

    let body = if method == Method::GET || method == Method::HEAD {
        None
    } else {
        request.body.clone()
    };

    let mut outbound = Request::builder().method(method).uri(uri);
    if let Some(headers) = outbound.headers_mut() {
        headers.reserve(request.headers.len());
        for (name, values) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProxyError::RequestBuild(format!("header '{}': {}", name, e)))?;
            for value in values {
                let value = HeaderValue::from_str(value)
                    .map_err(|e| ProxyError::RequestBuild(format!("header '{}': {}", name, e)))?;
                headers.append(name.clone(), value);
            }
        }

        headers.remove(header::CONTENT_LENGTH);
        if body.is_some() {
            if let Some(length) = declared_content_length(request) {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
            }
        }
    }

    let body = match body {
        Some(bytes) => Body::from(bytes),
        None => Body::empty(),
    };
    Ok(outbound.body(body)?)
}

/// The inbound Content-Length when it is single-valued, numeric and not chunked.
fn declared_content_length(request: &InternalRequest) -> Option<u64> {
    match request.header_values(header::CONTENT_LENGTH.as_str()) {
        Some([value]) if value != "chunked" => value.trim().parse().ok(),
        _ => None,
    }
}
