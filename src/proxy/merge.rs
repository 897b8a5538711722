//! Concurrent fan-out to every backend of an endpoint.
//!
//! # Data Flow
//! ```text
//! InternalRequest
//!     → one call per backend pipeline, all concurrent, same RequestContext
//!     → settled results kept in declaration order (failures dropped)
//!     → combiner(total, parts)
//! ```
//!
//! # Design Decisions
//! - Parts are positional: completion order never reorders them
//! - Partial failure still produces a response, flagged incomplete
//! - Total failure surfaces the first backend's error

use futures_util::future::{join_all, BoxFuture};

use crate::context::RequestContext;
use crate::error::ProxyError;
use crate::proxy::{Combiner, InternalRequest, Proxy, ProxyResponse, SharedProxy};

/// Calls several backend pipelines and combines their responses.
pub struct MergeProxy {
    backends: Vec<SharedProxy>,
    combiner: Combiner,
}

impl MergeProxy {
    pub fn new(backends: Vec<SharedProxy>, combiner: Combiner) -> Self {
        Self { backends, combiner }
    }
}

impl Proxy for MergeProxy {
    fn call<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a InternalRequest,
    ) -> BoxFuture<'a, Result<ProxyResponse, ProxyError>> {
        Box::pin(async move {
            let total = self.backends.len();
            let results = join_all(self.backends.iter().map(|b| b.call(ctx, request))).await;

            let mut parts = Vec::with_capacity(total);
            let mut first_error = None;
            for (index, result) in results.into_iter().enumerate() {
                match result {
                    Ok(part) => parts.push(part),
                    Err(e) => {
                        tracing::warn!(backend = index, error = %e, "Backend call contributed no part");
                        first_error.get_or_insert(e);
                    }
                }
            }

            if parts.is_empty() {
                if let Some(e) = first_error {
                    return Err(e);
                }
            }
            Ok((self.combiner)(total, parts))
        })
    }
}
