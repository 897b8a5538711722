//! Backend call pipeline.
//!
//! # Data Flow
//! ```text
//! InternalRequest (from the endpoint handler)
//!     → stage.rs (ordered middleware: merge, request builder, logging, metrics)
//!     → executor.rs (build outbound request, transport, status handler)
//!     → decoder.rs (gzip, structured decode) → formatter.rs (entity shaping)
//!     → combiner.rs (reduce parts when several backends feed one endpoint)
//!     → ProxyResponse (back to the endpoint handler)
//! ```
//!
//! # Design Decisions
//! - Every stage shares one signature: `(ctx, &InternalRequest) -> ProxyResponse`
//! - Backend status codes are data; only local failures are errors
//! - Cancellation flows through an explicit `RequestContext`

pub mod builder;
pub mod combiner;
pub mod decoder;
pub mod executor;
pub mod formatter;
pub mod merge;
pub mod request;
pub mod response;
pub mod stage;
pub mod status;
pub mod transport;

use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::ProxyError;

pub use combiner::{Combiner, CombinerRegistry};
pub use executor::BackendExecutor;
pub use request::InternalRequest;
pub use response::{Metadata, ProxyResponse};
pub use stage::{ProxyStack, Stage};

/// One step of the backend pipeline.
pub trait Proxy: Send + Sync {
    fn call<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a InternalRequest,
    ) -> BoxFuture<'a, Result<ProxyResponse, ProxyError>>;
}

/// Shared handle to a pipeline.
pub type SharedProxy = Arc<dyn Proxy>;

impl<P: Proxy + ?Sized> Proxy for Arc<P> {
    fn call<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a InternalRequest,
    ) -> BoxFuture<'a, Result<ProxyResponse, ProxyError>> {
        (**self).call(ctx, request)
    }
}

/// Proxy backed by a closure over an owned request.
pub struct ProxyFn<F>(F);

/// Adapt an async closure into a [`Proxy`].
pub fn proxy_fn<F, Fut>(f: F) -> ProxyFn<F>
where
    F: Fn(InternalRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProxyResponse, ProxyError>> + Send + 'static,
{
    ProxyFn(f)
}

impl<F, Fut> Proxy for ProxyFn<F>
where
    F: Fn(InternalRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProxyResponse, ProxyError>> + Send + 'static,
{
    fn call<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        request: &'a InternalRequest,
    ) -> BoxFuture<'a, Result<ProxyResponse, ProxyError>> {
        Box::pin((self.0)(request.clone()))
    }
}
