//! Transport seam between the executor and the network.
//!
//! # Responsibilities
//! - Send a built outbound request and return the raw backend response
//! - Own connection handling (pooling, HTTP/1.1 and HTTP/2)
//!
//! # Design Decisions
//! - The executor races the transport against the request context, so
//!   implementations need not poll the context themselves
//! - Non-2xx responses are returned as `Ok`; only network failures are errors

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::future::Future;
use std::time::Duration;

use crate::context::RequestContext;
use crate::error::ProxyError;

/// Sends outbound requests to backends.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: Request<Body>,
    ) -> BoxFuture<'a, Result<Response<Body>, ProxyError>>;
}

/// Hyper-based HTTP transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
}

impl HttpTransport {
    pub fn new() -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(5)));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        request: Request<Body>,
    ) -> BoxFuture<'a, Result<Response<Body>, ProxyError>> {
        Box::pin(async move {
            let response = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            Ok(Response::from_parts(parts, Body::new(body)))
        })
    }
}

/// Transport backed by a closure.
pub struct TransportFn<F>(F);

/// Adapt an async closure into a [`Transport`].
pub fn transport_fn<F, Fut>(f: F) -> TransportFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Body>, ProxyError>> + Send + 'static,
{
    TransportFn(f)
}

impl<F, Fut> Transport for TransportFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Body>, ProxyError>> + Send + 'static,
{
    fn send<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        request: Request<Body>,
    ) -> BoxFuture<'a, Result<Response<Body>, ProxyError>> {
        Box::pin((self.0)(request))
    }
}
