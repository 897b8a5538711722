//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router with one route per configured endpoint
//! - Answer unknown routes with 404 and the `incomplete` marker
//! - Wire up middleware (tracing, request ID, body limit)
//! - Serve with graceful shutdown

use axum::{
    body::Body,
    extract::{ConnectInfo, Path},
    extract::rejection::PathRejection,
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Json},
    routing::{any, on, MethodFilter},
    Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::error::ConfigError;
use crate::http::endpoint::EndpointHandler;
use crate::http::request::{GATEWAY_USER_AGENT, INCOMPLETE, X_GATEWAY, X_GATEWAY_COMPLETED};
use crate::lifecycle::Shutdown;
use crate::proxy::transport::{HttpTransport, Transport};
use crate::proxy::CombinerRegistry;

/// HTTP server exposing the configured endpoints.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Build the server with the built-in combiners and the hyper transport.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        Self::with_parts(config, &CombinerRegistry::default(), Arc::new(HttpTransport::new()))
    }

    /// Build the server with an explicit combiner registry and transport.
    ///
    /// Fails before serving if any endpoint cannot be set up.
    pub fn with_parts(
        config: GatewayConfig,
        registry: &CombinerRegistry,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let mut router = Router::new();

        for endpoint in &config.endpoints {
            let filter = method_filter(&endpoint.method).ok_or_else(|| {
                ConfigError::InvalidEndpoint {
                    endpoint: endpoint.endpoint.clone(),
                    reason: format!("unsupported method '{}'", endpoint.method),
                }
            })?;
            let handler = EndpointHandler::from_config(&config, endpoint, registry, transport.clone())?;
            tracing::info!(
                method = %endpoint.method.to_uppercase(),
                endpoint = %endpoint.endpoint,
                backends = endpoint.backends.len(),
                combiner = %endpoint.combiner,
                "Registering endpoint"
            );

            router = router.route(
                &endpoint.endpoint,
                on(
                    filter,
                    move |params: Result<Path<HashMap<String, String>>, PathRejection>,
                          request: Request<Body>| {
                        let handler = handler.clone();
                        async move {
                            let params = params.map(|Path(p)| p).unwrap_or_default();
                            let client = request
                                .extensions()
                                .get::<ConnectInfo<SocketAddr>>()
                                .map(|ConnectInfo(addr)| *addr);
                            handler.handle(request, params, client).await
                        }
                    },
                ),
            );
        }

        if config.debug {
            tracing::debug!("Debug endpoint enabled");
            router = router.route("/__debug/{*param}", any(debug_handler));
        }

        let router = router.fallback(not_found).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(config.listener.max_body_size)),
        );

        Ok(Self { router, config })
    }

    /// The assembled router, for in-process serving.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` triggers.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.name,
            endpoints = self.config.endpoints.len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn method_filter(method: &str) -> Option<MethodFilter> {
    let method = Method::from_bytes(method.to_uppercase().as_bytes()).ok()?;
    match method {
        Method::GET => Some(MethodFilter::GET),
        Method::POST => Some(MethodFilter::POST),
        Method::PUT => Some(MethodFilter::PUT),
        Method::PATCH => Some(MethodFilter::PATCH),
        Method::DELETE => Some(MethodFilter::DELETE),
        Method::HEAD => Some(MethodFilter::HEAD),
        Method::OPTIONS => Some(MethodFilter::OPTIONS),
        _ => None,
    }
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        [(X_GATEWAY, GATEWAY_USER_AGENT), (X_GATEWAY_COMPLETED, INCOMPLETE)],
    )
}

/// Echo handler for wiring checks.
async fn debug_handler(request: Request<Body>) -> impl IntoResponse {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    tracing::debug!(
        method = %parts.method,
        uri = %parts.uri,
        headers = ?parts.headers,
        body = %String::from_utf8_lossy(&body),
        "Debug request"
    );
    Json(json!({ "message": "pong" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, EndpointConfig};
    use crate::error::ProxyError;
    use crate::proxy::transport::transport_fn;
    use axum::http::Response;
    use tower::ServiceExt;

    fn config(debug: bool) -> GatewayConfig {
        let mut config = GatewayConfig {
            debug,
            ..Default::default()
        };
        config.endpoints.push(EndpointConfig {
            endpoint: "/items/{id}".into(),
            method: "get".into(),
            timeout_ms: None,
            cache_ttl_secs: None,
            headers_to_pass: Vec::new(),
            query_string: Vec::new(),
            combiner: "default".into(),
            backends: vec![BackendConfig::new("http://items:1", "/items/{id}")],
        });
        config
    }

    fn server(debug: bool) -> GatewayServer {
        let transport = transport_fn(|req: Request<Body>| async move {
            let body = format!(r#"{{"path":"{}"}}"#, req.uri().path());
            Ok::<_, ProxyError>(Response::new(Body::from(body)))
        });
        GatewayServer::with_parts(config(debug), &CombinerRegistry::default(), Arc::new(transport))
            .unwrap()
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_routes_endpoint_with_params() {
        let resp = server(false).router().oneshot(request("GET", "/items/9")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"path":"/items/9"}"#);
    }

    #[tokio::test]
    async fn test_unknown_route_is_incomplete_404() {
        let resp = server(false).router().oneshot(request("GET", "/nope")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[X_GATEWAY_COMPLETED], INCOMPLETE);
    }

    #[tokio::test]
    async fn test_wrong_method_is_rejected() {
        let resp = server(false).router().oneshot(request("POST", "/items/9")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_debug_route_only_when_enabled() {
        let resp = server(true).router().oneshot(request("GET", "/__debug/x")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = server(false).router().oneshot(request("GET", "/__debug/x")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unsupported_method_fails_setup() {
        let mut config = config(false);
        config.endpoints[0].method = "TRACE".into();
        let result = GatewayServer::with_parts(
            config,
            &CombinerRegistry::default(),
            Arc::new(HttpTransport::new()),
        );
        assert!(matches!(result, Err(ConfigError::InvalidEndpoint { .. })));
    }
}
