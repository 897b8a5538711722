//! Ordered middleware stages around a backend call.
//!
//! A [`ProxyStack`] is an explicit list of named stages. The first stage
//! added is the outermost: it sees the request first and the response last.
//!
//! ```text
//! ProxyStack::new().stage(A).stage(B).build(base)
//!     → A(B(base))
//! ```

use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;

use crate::context::RequestContext;
use crate::error::ProxyError;
use crate::observability::metrics;
use crate::proxy::{InternalRequest, Proxy, ProxyResponse, SharedProxy};

/// Wraps the next step of the pipeline.
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;
    fn wrap(&self, next: SharedProxy) -> SharedProxy;
}

/// Builder composing stages in a fixed, visible order.
#[derive(Default, Clone)]
pub struct ProxyStack {
    stages: Vec<Arc<dyn Stage>>,
}

impl ProxyStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage inside the ones already added.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Stage names, outermost first.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn build(&self, base: SharedProxy) -> SharedProxy {
        self.stages
            .iter()
            .rev()
            .fold(base, |next, stage| stage.wrap(next))
    }
}

/// Logs each backend call with its status and latency.
#[derive(Debug, Clone)]
pub struct LoggingStage {
    backend: String,
}

impl LoggingStage {
    pub fn new(backend: impl Into<String>) -> Self {
        Self { backend: backend.into() }
    }
}

impl Stage for LoggingStage {
    fn name(&self) -> &str {
        "logging"
    }

    fn wrap(&self, next: SharedProxy) -> SharedProxy {
        Arc::new(Logged {
            backend: self.backend.clone(),
            next,
        })
    }
}

struct Logged {
    backend: String,
    next: SharedProxy,
}

impl Proxy for Logged {
    fn call<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a InternalRequest,
    ) -> BoxFuture<'a, Result<ProxyResponse, ProxyError>> {
        Box::pin(async move {
            let start = Instant::now();
            let result = self.next.call(ctx, request).await;
            match &result {
                Ok(resp) => tracing::debug!(
                    backend = %self.backend,
                    url = %request.url,
                    status = resp.metadata.status_code,
                    elapsed = ?start.elapsed(),
                    "Backend call finished"
                ),
                Err(e) => tracing::warn!(
                    backend = %self.backend,
                    url = %request.url,
                    error = %e,
                    elapsed = ?start.elapsed(),
                    "Backend call failed"
                ),
            }
            result
        })
    }
}

/// Records backend call counters and latency histograms.
#[derive(Debug, Clone)]
pub struct MetricsStage {
    backend: String,
}

impl MetricsStage {
    pub fn new(backend: impl Into<String>) -> Self {
        Self { backend: backend.into() }
    }
}

impl Stage for MetricsStage {
    fn name(&self) -> &str {
        "metrics"
    }

    fn wrap(&self, next: SharedProxy) -> SharedProxy {
        Arc::new(Measured {
            backend: self.backend.clone(),
            next,
        })
    }
}

struct Measured {
    backend: String,
    next: SharedProxy,
}

impl Proxy for Measured {
    fn call<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a InternalRequest,
    ) -> BoxFuture<'a, Result<ProxyResponse, ProxyError>> {
        Box::pin(async move {
            let start = Instant::now();
            let result = self.next.call(ctx, request).await;
            let status = match &result {
                Ok(resp) => resp.metadata.status_code.to_string(),
                Err(e) if e.is_cancellation() => "cancelled".to_string(),
                Err(_) => "error".to_string(),
            };
            metrics::record_backend_call(&self.backend, &status, start);
            result
        })
    }
}
