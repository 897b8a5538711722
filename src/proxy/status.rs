//! Status handling applied to raw backend responses.
//!
//! Every status code is data: the default handler returns the response
//! untouched so 4xx/5xx bodies reach the combiner and the endpoint caller.

use axum::body::Body;
use axum::http::Response;

use crate::context::RequestContext;
use crate::error::ProxyError;

/// Inspects or rewrites a raw backend response before it is decoded.
///
/// An `Err` is a local processing failure, not a backend status.
pub trait StatusHandler: Send + Sync {
    fn handle(
        &self,
        ctx: &RequestContext,
        response: Response<Body>,
    ) -> Result<Response<Body>, ProxyError>;
}

/// Accepts every status code unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughStatusHandler;

impl StatusHandler for PassThroughStatusHandler {
    fn handle(
        &self,
        _ctx: &RequestContext,
        response: Response<Body>,
    ) -> Result<Response<Body>, ProxyError> {
        Ok(response)
    }
}
