//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint handlers and backend stages produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID (`x-request-id`) is set by the server and forwarded to backends
//! - Metrics are cheap to record and free when no exporter is installed

pub mod logging;
pub mod metrics;
