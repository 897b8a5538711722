//! Endpoint handler: one per configured endpoint.
//!
//! # Data Flow
//! ```text
//! axum request
//!     → RequestFilter::translate (allowlists, path params, forwarding headers)
//!     → child RequestContext (endpoint timeout, released on drop)
//!     → backend pipeline (single backend, or MergeProxy over several)
//!     → deadline check → header + completeness projection
//!     → status projection → render
//! ```
//!
//! # Design Decisions
//! - A response that arrives after the deadline is still rendered, flagged
//!   incomplete
//! - An error with no response writes only a status code
//! - Backend statuses other than 200/201 reach the client verbatim

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::Response;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{EndpointConfig, GatewayConfig};
use crate::context::RequestContext;
use crate::error::{ConfigError, ProxyError};
use crate::http::request::{
    RequestFilter, COMPLETE, GATEWAY_USER_AGENT, INCOMPLETE, X_GATEWAY, X_GATEWAY_COMPLETED,
};
use crate::http::response::{copy_metadata_headers, default_error_status, render, ErrorMapper};
use crate::observability::metrics;
use crate::proxy::builder::RequestBuilderStage;
use crate::proxy::decoder::{decoder_for, ResponseParser};
use crate::proxy::formatter::BackendFormatter;
use crate::proxy::merge::MergeProxy;
use crate::proxy::stage::{LoggingStage, MetricsStage};
use crate::proxy::transport::Transport;
use crate::proxy::{
    BackendExecutor, CombinerRegistry, InternalRequest, Proxy, ProxyResponse, ProxyStack,
    SharedProxy,
};

/// Per-endpoint settings resolved from config.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    pub endpoint: String,
    pub method: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    pub filter: RequestFilter,
    pub max_body_size: usize,
}

impl EndpointSettings {
    pub fn from_config(config: &GatewayConfig, endpoint: &EndpointConfig) -> Self {
        Self {
            endpoint: endpoint.endpoint.clone(),
            method: endpoint.method.to_uppercase(),
            timeout: config.endpoint_timeout(endpoint),
            cache_ttl: config.endpoint_cache_ttl(endpoint),
            filter: RequestFilter::new(&endpoint.headers_to_pass, &endpoint.query_string),
            max_body_size: config.listener.max_body_size,
        }
    }
}

/// Finalizes pipeline results into HTTP responses.
#[derive(Clone)]
pub struct EndpointHandler {
    settings: Arc<EndpointSettings>,
    proxy: SharedProxy,
    error_mapper: ErrorMapper,
    cache_control: Option<HeaderValue>,
}

impl EndpointHandler {
    pub fn new(settings: EndpointSettings, proxy: SharedProxy) -> Self {
        let cache_control = (!settings.cache_ttl.is_zero()).then(|| {
            HeaderValue::from_str(&format!("public, max-age={}", settings.cache_ttl.as_secs()))
                .unwrap_or_else(|_| HeaderValue::from_static("public"))
        });
        Self {
            settings: Arc::new(settings),
            proxy,
            error_mapper: default_error_status,
            cache_control,
        }
    }

    /// Build the handler and its backend pipeline from config.
    pub fn from_config(
        config: &GatewayConfig,
        endpoint: &EndpointConfig,
        registry: &CombinerRegistry,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let proxy = build_pipeline(endpoint, registry, transport)?;
        Ok(Self::new(EndpointSettings::from_config(config, endpoint), proxy))
    }

    /// Replace the mapper used for errors that carry no status.
    pub fn with_error_mapper(mut self, mapper: ErrorMapper) -> Self {
        self.error_mapper = mapper;
        self
    }

    pub fn settings(&self) -> &EndpointSettings {
        &self.settings
    }

    /// Serve one inbound request.
    pub async fn handle(
        &self,
        request: Request<Body>,
        params: HashMap<String, String>,
        client: Option<SocketAddr>,
    ) -> Response {
        let start = Instant::now();
        let (ctx, _guard) = RequestContext::background().with_timeout(self.settings.timeout);

        let translated = self
            .settings
            .filter
            .translate(request, params, client, self.settings.max_body_size)
            .await;
        let result = match translated {
            Ok(internal) => self.dispatch(&ctx, &internal).await,
            Err(e) => Err(e),
        };

        let out = self.finalize(&ctx, result);
        metrics::record_endpoint(
            &self.settings.method,
            &self.settings.endpoint,
            out.status().as_u16(),
            start,
        );
        out
    }

    async fn dispatch(
        &self,
        ctx: &RequestContext,
        request: &InternalRequest,
    ) -> Result<ProxyResponse, ProxyError> {
        tracing::debug!(
            endpoint = %self.settings.endpoint,
            method = %request.method,
            path = %request.url,
            "Dispatching endpoint"
        );
        self.proxy.call(ctx, request).await
    }

    /// Project a pipeline result onto the outward response.
    pub fn finalize(
        &self,
        ctx: &RequestContext,
        result: Result<ProxyResponse, ProxyError>,
    ) -> Response {
        let (mut response, mut error) = match result {
            Ok(resp) => (Some(resp), None),
            Err(e) => (None, Some(e)),
        };

        if ctx.is_done() {
            error.get_or_insert(ProxyError::Timeout(self.settings.timeout));
            if let Some(resp) = response.as_mut() {
                resp.is_complete = false;
            }
        }

        let mut headers = HeaderMap::new();
        let mut completed = INCOMPLETE;
        if let Some(resp) = response.as_ref().filter(|r| r.has_content()) {
            copy_metadata_headers(&mut headers, resp);
            if resp.is_complete {
                completed = COMPLETE;
                if let Some(cache_control) = &self.cache_control {
                    headers.insert(header::CACHE_CONTROL, cache_control.clone());
                }
            }
        }
        headers.insert(X_GATEWAY, HeaderValue::from_static(GATEWAY_USER_AGENT));
        headers.insert(X_GATEWAY_COMPLETED, HeaderValue::from_static(completed));

        if let Some(err) = &error {
            tracing::warn!(endpoint = %self.settings.endpoint, error = %err, "Endpoint error");
            if response.is_none() {
                let status = err.status_code().unwrap_or_else(|| (self.error_mapper)(err));
                let mut out = Response::new(Body::empty());
                *out.status_mut() = status;
                out.headers_mut().extend(headers);
                return out;
            }
        }

        let status = match &response {
            Some(resp) if !resp.is_success() => {
                StatusCode::from_u16(resp.metadata.status_code).unwrap_or(StatusCode::OK)
            }
            _ => StatusCode::OK,
        };
        let mut out = render(status, response.as_ref());
        out.headers_mut().extend(headers);
        out
    }
}

/// Assemble the backend pipeline of an endpoint.
///
/// Each backend gets `request-builder → logging → metrics → executor`;
/// several backends are fanned out through a [`MergeProxy`].
pub fn build_pipeline(
    endpoint: &EndpointConfig,
    registry: &CombinerRegistry,
    transport: Arc<dyn Transport>,
) -> Result<SharedProxy, ConfigError> {
    let combiner = registry.get(&endpoint.combiner)?;

    let mut backends = Vec::with_capacity(endpoint.backends.len());
    for backend in &endpoint.backends {
        let label = format!(
            "{}{}",
            backend.host.first().map(String::as_str).unwrap_or_default(),
            backend.url_pattern
        );
        let parser = match decoder_for(backend.encoding) {
            Some(decoder) => {
                ResponseParser::decoded(decoder, Arc::new(BackendFormatter::from_config(backend)))
            }
            None => ResponseParser::no_op(),
        }
        .with_max_size(backend.max_response_size);
        let executor: SharedProxy = Arc::new(BackendExecutor::new(transport.clone(), parser));
        let stack = ProxyStack::new()
            .stage(RequestBuilderStage::from_config(&endpoint.endpoint, backend)?)
            .stage(LoggingStage::new(label.clone()))
            .stage(MetricsStage::new(label));
        backends.push(stack.build(executor));
    }

    match backends.len() {
        0 => Err(ConfigError::InvalidEndpoint {
            endpoint: endpoint.endpoint.clone(),
            reason: "no backends".to_string(),
        }),
        1 => Ok(backends.remove(0)),
        _ => Ok(Arc::new(MergeProxy::new(backends, combiner))),
    }
}
