//! API gateway: fans endpoint requests out to backends and aggregates the
//! responses.

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;

pub use config::GatewayConfig;
pub use context::RequestContext;
pub use error::{ConfigError, ProxyError};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
