//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, one route per endpoint, middleware)
//!     → endpoint.rs (timeout, dispatch, finalize)
//!         → request.rs (allowlists, forwarding headers, body buffering)
//!         → [backend pipeline]
//!         → response.rs (error mapping, header copy, render)
//!     → Send to client
//! ```

pub mod endpoint;
pub mod request;
pub mod response;
pub mod server;

pub use endpoint::{build_pipeline, EndpointHandler, EndpointSettings};
pub use request::{COMPLETE, INCOMPLETE, X_GATEWAY, X_GATEWAY_COMPLETED};
pub use response::default_error_status;
pub use server::GatewayServer;
